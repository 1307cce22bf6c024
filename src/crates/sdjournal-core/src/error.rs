use crate::file::Compression;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("file too small to hold a journal header ({len} bytes)")]
    TooSmall { len: u64 },

    #[error("invalid journal signature")]
    BadSignature,

    #[error("unsupported header layout (header_size={header_size})")]
    UnsupportedLayout { header_size: u64 },

    #[error("unknown incompatible header flags {flags:#010x}")]
    UnknownIncompatibleFlags { flags: u32 },

    #[error("operation not valid in the current journal state")]
    InvalidState,

    #[error("unaligned object offset {offset}")]
    UnalignedOffset { offset: u64 },

    #[error("truncated object at offset {offset}")]
    Truncated { offset: u64 },

    #[error("read of {len} bytes at offset {offset} is out of bounds")]
    OutOfBounds { offset: u64, len: u64 },

    #[error("unexpected object type {found} at offset {offset}")]
    UnexpectedObjectType { found: u8, offset: u64 },

    #[error("entry array chain does not advance at offset {offset}")]
    EntryArrayChainLoop { offset: u64 },

    #[error("unsupported compression algorithm: {0}")]
    UnsupportedCompression(Compression),

    #[error("corrupt compressed payload in data object at offset {offset}")]
    CorruptCompressedData { offset: u64 },

    #[error("field at offset {offset} exceeds the {limit} byte limit")]
    FieldTooLarge { offset: u64, limit: usize },

    #[error("malformed field in data object at offset {offset}")]
    MalformedField { offset: u64 },
}

static_assertions::const_assert!(std::mem::size_of::<JournalError>() <= 24);

pub type Result<T> = std::result::Result<T, JournalError>;
