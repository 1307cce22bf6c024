//! Chronological ordering of journal files.
//!
//! Files written by the same journald instance share a sequence-number id,
//! and their head sequence numbers grow monotonically across rotations.
//! Sorting on `(seqnum_id, head_entry_seqnum)` therefore puts the files of
//! one lineage in the order they were written, without reading any entry.
//! A file is kept only if a reader could be opened on it: its first entry
//! array must decode, unless the journal is empty.
//!
//! Files from different lineages are grouped by id. Their relative order
//! follows the id bytes and carries no notion of wall-clock time.

use crate::error::JournalError;
use crate::file::{EntryArrayCursor, JournalFile, Mmap};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Header fields that decide where a file goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SortKey {
    seqnum_id: [u8; 16],
    head_entry_seqnum: u64,
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.seqnum_id
            .cmp(&other.seqnum_id)
            .then_with(|| self.head_entry_seqnum.cmp(&other.head_entry_seqnum))
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Outcome of [`sort_files`].
#[derive(Debug, Default)]
pub struct SortedFiles {
    /// Files that could be opened, oldest first.
    pub ordered: Vec<PathBuf>,
    /// Files that could not be opened, in input order, with the reason.
    pub skipped: Vec<(PathBuf, JournalError)>,
}

fn sort_key(path: &Path) -> Result<SortKey, JournalError> {
    let file = JournalFile::<Mmap>::open(path)?;
    EntryArrayCursor::at_head(&file)?;

    let key = SortKey {
        seqnum_id: file.seqnum_id(),
        head_entry_seqnum: file.head_entry_seqnum(),
    };

    file.close()?;
    Ok(key)
}

/// Orders `paths` chronologically from their headers and head entry arrays.
///
/// A file that fails to open does not fail the batch; it is reported in
/// [`SortedFiles::skipped`]. Files with equal keys keep their input order.
pub fn sort_files<I, P>(paths: I) -> SortedFiles
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut keyed = Vec::new();
    let mut skipped = Vec::new();

    for path in paths {
        let path = path.as_ref();

        match sort_key(path) {
            Ok(key) => {
                debug!(
                    path = %path.display(),
                    head_entry_seqnum = key.head_entry_seqnum,
                    "sort key"
                );
                keyed.push((key, path.to_path_buf()));
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping journal file");
                skipped.push((path.to_path_buf(), err));
            }
        }
    }

    keyed.sort_by(|(lhs, _), (rhs, _)| lhs.cmp(rhs));

    SortedFiles {
        ordered: keyed.into_iter().map(|(_, path)| path).collect(),
        skipped,
    }
}

/// Like [`sort_files`], discarding the list of skipped files.
pub fn sort_file_paths<I, P>(paths: I) -> Vec<PathBuf>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    sort_files(paths).ordered
}
