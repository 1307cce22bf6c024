use crate::error::{JournalError, Result};
use crate::file::{Entry, JournalReader, MemoryMap, Mmap, ReaderOptions, Record};
use std::path::Path;

/// A journal handle whose lifecycle is checked at run time.
///
/// [`JournalReader`] can only be obtained already open, so misuse is a
/// compile error. `Journal` is for callers that need to hold a handle
/// before it has been opened, or keep it around after closing it:
///
/// ```text
/// Unopened --open--> Open --close--> Closed
///     \______failed open______________/
/// ```
///
/// Every transition not drawn above returns [`JournalError::InvalidState`].
pub enum Journal<M: MemoryMap = Mmap> {
    Unopened,
    Open(JournalReader<M>),
    Closed,
}

impl<M: MemoryMap> Default for Journal<M> {
    fn default() -> Self {
        Journal::Unopened
    }
}

impl<M: MemoryMap> std::fmt::Debug for Journal<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Journal::Unopened => write!(f, "Unopened"),
            Journal::Open(reader) => f.debug_tuple("Open").field(reader).finish(),
            Journal::Closed => write!(f, "Closed"),
        }
    }
}

impl<M: MemoryMap> Journal<M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.open_with_options(path, ReaderOptions::default())
    }

    pub fn open_with_options(&mut self, path: impl AsRef<Path>, options: ReaderOptions) -> Result<()> {
        if !matches!(self, Journal::Unopened) {
            return Err(JournalError::InvalidState);
        }

        match JournalReader::open_with_options(path, options) {
            Ok(reader) => {
                *self = Journal::Open(reader);
                Ok(())
            }
            Err(err) => {
                *self = Journal::Closed;
                Err(err)
            }
        }
    }

    pub fn close(&mut self) -> Result<()> {
        match std::mem::replace(self, Journal::Closed) {
            Journal::Open(reader) => reader.close(),
            previous => {
                *self = previous;
                Err(JournalError::InvalidState)
            }
        }
    }

    pub fn next_record(&mut self) -> Result<Option<Record>> {
        self.reader_mut()?.next_record()
    }

    pub fn next_entry(&mut self) -> Result<Option<Entry>> {
        self.reader_mut()?.next_entry()
    }

    pub fn reader(&self) -> Option<&JournalReader<M>> {
        match self {
            Journal::Open(reader) => Some(reader),
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Journal::Open(_))
    }

    fn reader_mut(&mut self) -> Result<&mut JournalReader<M>> {
        match self {
            Journal::Open(reader) => Ok(reader),
            _ => Err(JournalError::InvalidState),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{JournalBuilder, write_journal};

    #[test]
    fn test_open_read_close() {
        let mut builder = JournalBuilder::new();
        builder.entry(&["A=1"]);
        let (_dir, path) = write_journal(&builder.build());

        let mut journal = Journal::<Mmap>::new();
        assert!(!journal.is_open());

        journal.open(&path).unwrap();
        assert!(journal.is_open());
        assert_eq!(journal.reader().map(|r| r.file().n_entries()), Some(1));

        let record = journal.next_record().unwrap().unwrap();
        assert_eq!(record["A"], "1");
        assert_eq!(journal.next_record().unwrap(), None);

        journal.close().unwrap();
        assert!(matches!(journal, Journal::Closed));
    }

    #[test]
    fn test_next_record_before_open() {
        let mut journal = Journal::<Mmap>::new();

        assert!(matches!(journal.next_record(), Err(JournalError::InvalidState)));
        assert!(matches!(journal.next_entry(), Err(JournalError::InvalidState)));
        assert!(matches!(journal, Journal::Unopened));
    }

    #[test]
    fn test_double_open_and_double_close() {
        let (_dir, path) = write_journal(&JournalBuilder::new().build());

        let mut journal = Journal::<Mmap>::new();
        assert!(matches!(journal.close(), Err(JournalError::InvalidState)));
        assert!(matches!(journal, Journal::Unopened));

        journal.open(&path).unwrap();
        assert!(matches!(journal.open(&path), Err(JournalError::InvalidState)));
        assert!(journal.is_open());

        journal.close().unwrap();
        assert!(matches!(journal.close(), Err(JournalError::InvalidState)));
        assert!(matches!(journal.open(&path), Err(JournalError::InvalidState)));
        assert!(matches!(journal.next_record(), Err(JournalError::InvalidState)));
    }

    #[test]
    fn test_failed_open_closes_the_journal() {
        let (_dir, path) = write_journal(b"short");

        let mut journal = Journal::<Mmap>::new();
        let err = journal.open(&path).unwrap_err();
        assert!(matches!(err, JournalError::TooSmall { len: 5 }));
        assert!(matches!(journal, Journal::Closed));

        let (_dir, good) = write_journal(&JournalBuilder::new().build());
        assert!(matches!(journal.open(&good), Err(JournalError::InvalidState)));
    }
}
