use super::mmap::MemoryMap;
use crate::error::{JournalError, Result};
use crate::file::JournalFile;
use std::num::NonZeroU64;
use tracing::debug;

/// A single entry-array object in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Node {
    offset: u64,
    next_offset: u64,
    // Number of slots, including the unused tail of the last array
    capacity: usize,
}

impl Node {
    fn new<M: MemoryMap>(journal_file: &JournalFile<M>, offset: u64) -> Result<Self> {
        let array = journal_file.entry_array_ref(offset)?;

        Ok(Self {
            offset,
            next_offset: array.next_entry_array_offset(),
            capacity: array.capacity(),
        })
    }

    fn get<M: MemoryMap>(&self, journal_file: &JournalFile<M>, index: usize) -> Result<u64> {
        let array = journal_file.entry_array_ref(self.offset)?;
        array.items.get(index).ok_or(JournalError::Truncated {
            offset: self.offset,
        })
    }
}

/// Forward-only cursor over the linked list of entry arrays.
///
/// Yields entry offsets in the order they were appended. A zero slot marks
/// the unused capacity of the tail array and ends the list, as does a zero
/// `next_entry_array_offset`. Once the end has been reported, `next` keeps
/// returning `Ok(None)`.
#[derive(Debug, Default, Clone)]
pub struct EntryArrayCursor {
    node: Option<Node>,
    position: usize,
    exhausted: bool,
}

impl EntryArrayCursor {
    /// A cursor positioned before the first entry of `journal_file`.
    pub fn at_head<M: MemoryMap>(journal_file: &JournalFile<M>) -> Result<Self> {
        let mut cursor = Self::default();

        match journal_file.entry_array_offset() {
            Some(offset) => cursor.seek(journal_file, offset.get())?,
            None => cursor.exhausted = true,
        }

        Ok(cursor)
    }

    /// Makes the entry array at `offset` current, positioned at its first slot.
    pub fn seek<M: MemoryMap>(&mut self, journal_file: &JournalFile<M>, offset: u64) -> Result<()> {
        let node = Node::new(journal_file, offset)?;
        debug!(offset, capacity = node.capacity, next = node.next_offset, "entry array");

        self.node = Some(node);
        self.position = 0;
        self.exhausted = false;

        Ok(())
    }

    /// Returns the next entry offset, following the chain as needed.
    pub fn next<M: MemoryMap>(&mut self, journal_file: &JournalFile<M>) -> Result<Option<NonZeroU64>> {
        loop {
            if self.exhausted {
                return Ok(None);
            }

            let Some(node) = self.node else {
                self.exhausted = true;
                return Ok(None);
            };

            if self.position < node.capacity {
                let item = node.get(journal_file, self.position)?;
                self.position += 1;

                let entry_offset = NonZeroU64::new(item);
                self.exhausted = entry_offset.is_none();
                return Ok(entry_offset);
            }

            if node.next_offset == 0 {
                self.exhausted = true;
                return Ok(None);
            }

            // Arrays are only ever appended, so the chain must move forward.
            if node.next_offset <= node.offset {
                return Err(JournalError::EntryArrayChainLoop {
                    offset: node.offset,
                });
            }

            self.seek(journal_file, node.next_offset)?;
        }
    }

    /// Offset of the entry array currently being read.
    pub fn current_array_offset(&self) -> Option<u64> {
        self.node.map(|node| node.offset)
    }
}
