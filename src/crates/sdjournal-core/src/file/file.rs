use super::mmap::{MemoryMap, Mmap};
use crate::error::{JournalError, Result};
use crate::file::object::*;
use std::fs::{File, OpenOptions};
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use tracing::debug;
use zerocopy::FromBytes;

///
/// A read-only view of a single systemd journal file.
///
/// # Lifecycle
///
/// A `JournalFile` only exists in the open state: [`JournalFile::open`] is
/// the sole constructor and [`JournalFile::close`] consumes the value. Every
/// object view handed out borrows from the file, so the borrow checker
/// rejects any use of a view after the file has been closed or dropped.
///
/// # Validation
///
/// The header is validated once, at open time, and copied out of the
/// mapping. Objects are validated on every access by
/// [`JournalFile::decode_object`], which is the only path from an offset to
/// typed data.
pub struct JournalFile<M: MemoryMap = Mmap> {
    path: PathBuf,
    header: JournalHeader,
    map: M,
    // Held so that the descriptor is released together with the mapping.
    _fd: File,
}

impl<M: MemoryMap> std::fmt::Debug for JournalFile<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalFile")
            .field("path", &self.path)
            .field("len", &self.map.len())
            .field("compact", &self.is_compact())
            .finish()
    }
}

impl<M: MemoryMap> JournalFile<M> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let fd = OpenOptions::new().read(true).write(false).open(path)?;
        let map = M::create(&fd)?;

        let len = map.len() as u64;
        if len < HEADER_SIZE {
            return Err(JournalError::TooSmall { len });
        }

        let (header, _) =
            JournalHeader::read_from_prefix(&map).map_err(|_| JournalError::TooSmall { len })?;

        if header.signature != SIGNATURE {
            return Err(JournalError::BadSignature);
        }

        let header_size = header.header_size.get();
        if header_size < HEADER_SIZE {
            return Err(JournalError::UnsupportedLayout { header_size });
        }

        let flags = header.unknown_incompatible_flags();
        if flags != 0 {
            return Err(JournalError::UnknownIncompatibleFlags { flags });
        }

        debug!(
            path = %path.display(),
            len,
            compact = header.is_compact(),
            n_entries = header.n_entries.get(),
            "opened journal file"
        );

        Ok(JournalFile {
            path: path.to_path_buf(),
            header,
            map,
            _fd: fd,
        })
    }

    /// Releases the mapping and the file descriptor.
    pub fn close(self) -> Result<()> {
        debug!(path = %self.path.display(), "closing journal file");

        let JournalFile { map, _fd, .. } = self;
        drop(map);
        drop(_fd);

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &JournalHeader {
        &self.header
    }

    pub fn is_compact(&self) -> bool {
        self.header.is_compact()
    }

    pub fn seqnum_id(&self) -> [u8; 16] {
        self.header.seqnum_id
    }

    pub fn head_entry_seqnum(&self) -> u64 {
        self.header.head_entry_seqnum.get()
    }

    pub fn n_entries(&self) -> u64 {
        self.header.n_entries.get()
    }

    /// Offset of the first entry array, or `None` for a journal that has
    /// never had an entry appended.
    pub fn entry_array_offset(&self) -> Option<NonZeroU64> {
        NonZeroU64::new(self.header.entry_array_offset.get())
    }

    /// Length of the mapped region in bytes.
    pub fn len(&self) -> u64 {
        self.map.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn byte_slice(&self, offset: u64, len: u64) -> Result<&[u8]> {
        let end = offset
            .checked_add(len)
            .filter(|&end| end <= self.len())
            .ok_or(JournalError::OutOfBounds { offset, len })?;

        Ok(&self.map[offset as usize..end as usize])
    }

    /// Validates the object at `offset` and returns a view over it.
    ///
    /// The checks run in a fixed order: alignment, room for the fixed
    /// prefix of `expected`, the type tag, then the declared size against
    /// both the fixed prefix and the end of the mapping.
    pub fn decode_object(&self, offset: u64, expected: ObjectType) -> Result<ObjectView<'_>> {
        if offset % OBJECT_ALIGNMENT != 0 {
            return Err(JournalError::UnalignedOffset { offset });
        }

        let fixed_size = expected.fixed_size(self.is_compact());
        if self.len().saturating_sub(offset) < fixed_size {
            return Err(JournalError::Truncated { offset });
        }

        let header_bytes = self.byte_slice(offset, OBJECT_HEADER_SIZE)?;
        let header = ObjectHeader::read_from_bytes(header_bytes)
            .map_err(|_| JournalError::Truncated { offset })?;

        if header.type_ != expected as u8 {
            return Err(JournalError::UnexpectedObjectType {
                found: header.type_,
                offset,
            });
        }

        let size = header.size.get();
        if size < fixed_size {
            return Err(JournalError::Truncated { offset });
        }

        let bytes = self.byte_slice(offset, size)?;
        Ok(ObjectView::new(offset, header, bytes, fixed_size as usize))
    }

    fn journal_object_ref<'a, T>(&'a self, offset: u64) -> Result<T>
    where
        T: JournalObject<'a>,
    {
        let view = self.decode_object(offset, T::OBJECT_TYPE)?;
        T::from_view(view, self.is_compact()).ok_or(JournalError::Truncated { offset })
    }

    pub fn entry_array_ref(&self, offset: u64) -> Result<EntryArrayObject<'_>> {
        self.journal_object_ref(offset)
    }

    pub fn entry_ref(&self, offset: u64) -> Result<EntryObject<'_>> {
        self.journal_object_ref(offset)
    }

    pub fn data_ref(&self, offset: u64) -> Result<DataObject<'_>> {
        self.journal_object_ref(offset)
    }
}
