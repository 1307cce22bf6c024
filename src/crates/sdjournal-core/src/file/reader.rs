use super::mmap::{MemoryMap, Mmap};
use super::offset_array::EntryArrayCursor;
use super::sigbus;
use crate::error::{JournalError, Result};
use crate::file::JournalFile;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::trace;

/// Largest field journald itself will store (`DATA_SIZE_MAX`).
pub const DEFAULT_MAX_FIELD_SIZE: usize = 768 * 1024 * 1024;

/// A decoded entry: field names mapped to their values.
pub type Record = BTreeMap<String, String>;

/// Tuning knobs for [`JournalReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderOptions {
    pub max_field_size: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            max_field_size: DEFAULT_MAX_FIELD_SIZE,
        }
    }
}

impl ReaderOptions {
    /// Caps the decompressed size of a single field.
    pub fn with_max_field_size(mut self, bytes: usize) -> Self {
        self.max_field_size = bytes;
        self
    }
}

/// A record together with the metadata stored in its entry object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub seqnum: u64,
    pub realtime_usec: u64,
    pub monotonic_usec: u64,
    pub boot_id: [u8; 16],
    pub fields: Record,
}

/// Reads the entries of one journal file in the order they were written.
///
/// The reader owns its [`JournalFile`]. Once any call fails the reader is
/// done: every later call returns [`JournalError::InvalidState`].
pub struct JournalReader<M: MemoryMap = Mmap> {
    file: JournalFile<M>,
    cursor: EntryArrayCursor,
    options: ReaderOptions,
    failed: bool,
    // SIGBUS fault count when the reader was created
    sigbus_baseline: u64,
}

impl<M: MemoryMap> std::fmt::Debug for JournalReader<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalReader")
            .field("file", &self.file)
            .field("cursor", &self.cursor)
            .field("failed", &self.failed)
            .finish()
    }
}

impl<M: MemoryMap> JournalReader<M> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_options(path, ReaderOptions::default())
    }

    pub fn open_with_options(path: impl AsRef<Path>, options: ReaderOptions) -> Result<Self> {
        let file = JournalFile::open(path)?;
        Self::new(file, options)
    }

    /// Positions a reader before the first entry of an already opened file.
    pub fn new(file: JournalFile<M>, options: ReaderOptions) -> Result<Self> {
        let sigbus_baseline = sigbus::fault_count();
        let cursor = EntryArrayCursor::at_head(&file)?;

        Ok(Self {
            file,
            cursor,
            options,
            failed: false,
            sigbus_baseline,
        })
    }

    pub fn file(&self) -> &JournalFile<M> {
        &self.file
    }

    pub fn options(&self) -> ReaderOptions {
        self.options
    }

    pub fn close(self) -> Result<()> {
        self.file.close()
    }

    /// Offsets of the data objects referenced by the entry at `offset`.
    pub fn data_offsets_for_entry(&self, offset: u64) -> Result<Vec<u64>> {
        let entry = self.file.entry_ref(offset)?;

        let mut offsets = Vec::new();
        entry.collect_offsets(&mut offsets);
        Ok(offsets)
    }

    /// The payload of the data object at `offset`, decompressed if needed.
    ///
    /// Uncompressed payloads are borrowed straight from the mapping.
    pub fn load_field(&self, offset: u64) -> Result<Cow<'_, [u8]>> {
        let data = self.file.data_ref(offset)?;

        if !data.is_compressed() {
            return Ok(Cow::Borrowed(data.raw_payload()));
        }

        let mut buf = Vec::new();
        data.decompress(&mut buf, self.options.max_field_size)?;
        Ok(Cow::Owned(buf))
    }

    /// Decodes every field of the entry at `offset` into a [`Record`].
    pub fn read_entry(&self, offset: u64) -> Result<Record> {
        let mut record = Record::new();

        for data_offset in self.data_offsets_for_entry(offset)? {
            let payload = self.load_field(data_offset)?;

            let eq = payload
                .iter()
                .position(|&b| b == b'=')
                .ok_or(JournalError::MalformedField {
                    offset: data_offset,
                })?;

            let name = String::from_utf8_lossy(&payload[..eq]).into_owned();
            let value = String::from_utf8_lossy(&payload[eq + 1..]).into_owned();
            record.insert(name, value);
        }

        trace!(offset, fields = record.len(), "read entry");
        Ok(record)
    }

    fn read_entry_with_metadata(&self, offset: u64) -> Result<Entry> {
        let fields = self.read_entry(offset)?;
        let entry = self.file.entry_ref(offset)?;

        Ok(Entry {
            seqnum: entry.header.seqnum.get(),
            realtime_usec: entry.header.realtime.get(),
            monotonic_usec: entry.header.monotonic.get(),
            boot_id: entry.header.boot_id,
            fields,
        })
    }

    fn decode_next(&mut self) -> Result<Option<Entry>> {
        let Some(offset) = self.cursor.next(&self.file)? else {
            return Ok(None);
        };

        self.read_entry_with_metadata(offset.get()).map(Some)
    }

    fn step(&mut self) -> Result<Option<Entry>> {
        let result = self.decode_next();

        // Zeroed pages may decode into anything, including an error.
        sigbus::check(self.sigbus_baseline)?;
        result
    }

    /// Returns the next entry with its metadata, or `None` at the end.
    pub fn next_entry(&mut self) -> Result<Option<Entry>> {
        if self.failed {
            return Err(JournalError::InvalidState);
        }

        self.step().inspect_err(|_| self.failed = true)
    }

    /// Returns the fields of the next entry, or `None` at the end.
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        Ok(self.next_entry()?.map(|entry| entry.fields))
    }
}
