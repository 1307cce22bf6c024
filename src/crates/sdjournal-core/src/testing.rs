//! Synthetic journal files for tests.
//!
//! The builder lays objects out the way journald does: the header, then for
//! each entry its data objects followed by the entry object, and finally the
//! chain of entry arrays. The last array keeps unused zeroed slots, as a
//! live journal's tail array does.

use crate::file::object::*;
use std::path::PathBuf;
use tempfile::TempDir;
use zerocopy::byteorder::little_endian::{U32, U64};
use zerocopy::{FromZeros, IntoBytes};

pub(crate) const BOOT_ID: [u8; 16] = [0x11; 16];
pub(crate) const REALTIME_BASE: u64 = 1_700_000_000_000_000;

#[derive(Debug, Clone)]
pub(crate) enum TestField {
    Plain(Vec<u8>),
    Zstd(Vec<u8>),
    /// Stored as-is with the given object flags.
    Raw { flags: u8, payload: Vec<u8> },
}

impl TestField {
    pub(crate) fn plain(payload: &str) -> Self {
        TestField::Plain(payload.as_bytes().to_vec())
    }

    pub(crate) fn zstd(payload: &str) -> Self {
        TestField::Zstd(payload.as_bytes().to_vec())
    }

    fn encode(&self) -> (u8, Vec<u8>) {
        match self {
            TestField::Plain(payload) => (0, payload.clone()),
            TestField::Zstd(payload) => {
                use ruzstd::encoding::{CompressionLevel, compress_to_vec};

                let compressed = compress_to_vec(payload.as_slice(), CompressionLevel::Fastest);
                (ObjectFlags::CompressedZstd as u8, compressed)
            }
            TestField::Raw { flags, payload } => (*flags, payload.clone()),
        }
    }
}

/// A built journal and where the builder placed its objects.
#[derive(Debug, Clone)]
pub(crate) struct BuiltJournal {
    pub(crate) bytes: Vec<u8>,
    /// Entry offsets in the order they appear in the entry arrays.
    pub(crate) entry_offsets: Vec<u64>,
    /// Offsets of the entry arrays, head first.
    pub(crate) array_offsets: Vec<u64>,
}

#[derive(Debug, Clone)]
pub(crate) struct JournalBuilder {
    compact: bool,
    seqnum_id: [u8; 16],
    head_entry_seqnum: u64,
    array_capacity: usize,
    entries: Vec<Vec<TestField>>,
}

impl JournalBuilder {
    pub(crate) fn new() -> Self {
        Self {
            compact: false,
            seqnum_id: [0xAA; 16],
            head_entry_seqnum: 1,
            array_capacity: 4,
            entries: Vec::new(),
        }
    }

    pub(crate) fn compact(mut self, compact: bool) -> Self {
        self.compact = compact;
        self
    }

    pub(crate) fn seqnum_id(mut self, seqnum_id: [u8; 16]) -> Self {
        self.seqnum_id = seqnum_id;
        self
    }

    pub(crate) fn head_entry_seqnum(mut self, seqnum: u64) -> Self {
        self.head_entry_seqnum = seqnum;
        self
    }

    pub(crate) fn array_capacity(mut self, capacity: usize) -> Self {
        assert!(capacity > 0);
        self.array_capacity = capacity;
        self
    }

    pub(crate) fn entry(&mut self, fields: &[&str]) -> &mut Self {
        self.entries
            .push(fields.iter().map(|f| TestField::plain(f)).collect());
        self
    }

    pub(crate) fn entry_with(&mut self, fields: Vec<TestField>) -> &mut Self {
        self.entries.push(fields);
        self
    }

    pub(crate) fn build(&self) -> Vec<u8> {
        self.build_layout().bytes
    }

    pub(crate) fn build_layout(&self) -> BuiltJournal {
        let mut buf = vec![0u8; HEADER_SIZE as usize];
        let mut n_objects = 0u64;
        let mut uses_zstd = false;

        let mut entry_offsets = Vec::with_capacity(self.entries.len());
        for (index, fields) in self.entries.iter().enumerate() {
            let mut data_offsets = Vec::with_capacity(fields.len());
            for field in fields {
                let (flags, payload) = field.encode();
                uses_zstd |= flags & ObjectFlags::CompressedZstd as u8 != 0;
                data_offsets.push(self.push_data(&mut buf, flags, &payload));
                n_objects += 1;
            }

            entry_offsets.push(self.push_entry(&mut buf, index as u64, &data_offsets));
            n_objects += 1;
        }

        let array_offsets = self.push_entry_arrays(&mut buf, &entry_offsets, &mut n_objects);
        let head_array_offset = array_offsets.first().copied().unwrap_or(0);

        let mut header = JournalHeader::new_zeroed();
        header.signature = SIGNATURE;
        let mut incompatible = 0u32;
        if self.compact {
            incompatible |= HeaderIncompatibleFlags::Compact as u32;
        }
        if uses_zstd {
            incompatible |= HeaderIncompatibleFlags::CompressedZstd as u32;
        }
        header.incompatible_flags = U32::new(incompatible);
        header.state = JournalState::Archived as u8;
        header.seqnum_id = self.seqnum_id;
        header.tail_entry_boot_id = BOOT_ID;
        header.header_size = U64::new(HEADER_SIZE);
        header.arena_size = U64::new(buf.len() as u64 - HEADER_SIZE);
        header.n_objects = U64::new(n_objects);
        header.n_entries = U64::new(self.entries.len() as u64);
        header.head_entry_seqnum = U64::new(self.head_entry_seqnum);
        header.tail_entry_seqnum =
            U64::new(self.head_entry_seqnum + self.entries.len().saturating_sub(1) as u64);
        header.entry_array_offset = U64::new(head_array_offset);
        header.head_entry_realtime = U64::new(REALTIME_BASE);

        buf[..HEADER_SIZE as usize].copy_from_slice(header.as_bytes());

        BuiltJournal {
            bytes: buf,
            entry_offsets,
            array_offsets,
        }
    }

    fn push_data(&self, buf: &mut Vec<u8>, flags: u8, payload: &[u8]) -> u64 {
        let fixed = ObjectType::Data.fixed_size(self.compact);

        let mut header = DataObjectHeader::new_zeroed();
        header.object_header = object_header(ObjectType::Data, flags, fixed + payload.len() as u64);
        header.n_entries = U64::new(1);

        let mut bytes = header.as_bytes().to_vec();
        if self.compact {
            bytes.extend_from_slice(CompactDataFields::new_zeroed().as_bytes());
        }
        bytes.extend_from_slice(payload);

        push_object(buf, &bytes)
    }

    fn push_entry(&self, buf: &mut Vec<u8>, index: u64, data_offsets: &[u64]) -> u64 {
        let item_size = if self.compact { 4 } else { 16 };
        let size = ENTRY_OBJECT_HEADER_SIZE + item_size * data_offsets.len() as u64;

        let mut header = EntryObjectHeader::new_zeroed();
        header.object_header = object_header(ObjectType::Entry, 0, size);
        header.seqnum = U64::new(self.head_entry_seqnum + index);
        header.realtime = U64::new(REALTIME_BASE + index);
        header.monotonic = U64::new(index);
        header.boot_id = BOOT_ID;

        let mut bytes = header.as_bytes().to_vec();
        for &offset in data_offsets {
            if self.compact {
                let item = CompactEntryItem {
                    object_offset: U32::new(offset as u32),
                };
                bytes.extend_from_slice(item.as_bytes());
            } else {
                let item = RegularEntryItem {
                    object_offset: U64::new(offset),
                    hash: U64::new(0xDEAD_BEEF),
                };
                bytes.extend_from_slice(item.as_bytes());
            }
        }

        push_object(buf, &bytes)
    }

    /// Writes the entry-array chain and returns the offsets of its arrays,
    /// which is empty when there are no entries.
    fn push_entry_arrays(
        &self,
        buf: &mut Vec<u8>,
        entries: &[u64],
        n_objects: &mut u64,
    ) -> Vec<u64> {
        let mut array_offsets = Vec::new();
        if entries.is_empty() {
            return array_offsets;
        }

        let item_size = if self.compact { 4 } else { 8 };
        let size = ENTRY_ARRAY_OBJECT_HEADER_SIZE + item_size * self.array_capacity as u64;
        let aligned_size = size.next_multiple_of(OBJECT_ALIGNMENT);

        let chunks: Vec<&[u64]> = entries.chunks(self.array_capacity).collect();
        let first_offset = (buf.len() as u64).next_multiple_of(OBJECT_ALIGNMENT);

        for (index, chunk) in chunks.iter().enumerate() {
            let next = if index + 1 < chunks.len() {
                first_offset + aligned_size * (index as u64 + 1)
            } else {
                0
            };

            let mut header = EntryArrayObjectHeader::new_zeroed();
            header.object_header = object_header(ObjectType::EntryArray, 0, size);
            header.next_entry_array_offset = U64::new(next);

            let mut bytes = header.as_bytes().to_vec();
            for slot in 0..self.array_capacity {
                let offset = chunk.get(slot).copied().unwrap_or(0);
                if self.compact {
                    bytes.extend_from_slice(U32::new(offset as u32).as_bytes());
                } else {
                    bytes.extend_from_slice(U64::new(offset).as_bytes());
                }
            }

            let at = push_object(buf, &bytes);
            debug_assert_eq!(at, first_offset + aligned_size * index as u64);
            array_offsets.push(at);
            *n_objects += 1;
        }

        array_offsets
    }
}

fn object_header(type_: ObjectType, flags: u8, size: u64) -> ObjectHeader {
    ObjectHeader {
        type_: type_ as u8,
        flags,
        reserved: [0; 6],
        size: U64::new(size),
    }
}

/// Appends an object at the next aligned position and pads the buffer to
/// the following boundary.
fn push_object(buf: &mut Vec<u8>, bytes: &[u8]) -> u64 {
    let offset = (buf.len() as u64).next_multiple_of(OBJECT_ALIGNMENT);
    buf.resize(offset as usize, 0);
    buf.extend_from_slice(bytes);

    let end = (buf.len() as u64).next_multiple_of(OBJECT_ALIGNMENT);
    buf.resize(end as usize, 0);

    offset
}

/// Writes `bytes` to a fresh temporary directory. The directory is removed
/// when the returned guard is dropped.
pub(crate) fn write_journal(bytes: &[u8]) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("system.journal");
    std::fs::write(&path, bytes).unwrap();
    (dir, path)
}
