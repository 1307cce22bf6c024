//! Read-only decoding of systemd journal files.
//!
//! This crate maps a journal file, validates its header and walks the
//! entry-array chain to hand back each entry as a map of field names to
//! values. It never writes to a journal and never copies the whole file.
//!
//! - [`JournalReader`]: iterate the entries of one file.
//! - [`sort_files`]: put a batch of files in chronological order.
//! - [`Journal`]: the same reader behind a run-time checked lifecycle.

// Core error types used throughout the crate
pub mod error;

// Low-level journal file format I/O
pub mod file;

// Chronological ordering of many files
pub mod sort;

// Run-time checked open/close lifecycle
pub mod session;

#[cfg(test)]
mod testing;

// Re-export commonly used types for convenience
pub use error::{JournalError, Result};

pub use file::{Compression, Entry, JournalFile, JournalReader, ReaderOptions, Record};
pub use session::Journal;
pub use sort::{SortedFiles, sort_file_paths, sort_files};

/// Installs the process-wide SIGBUS handler that turns faults on truncated
/// mappings into I/O errors. Binaries should call this once at start-up.
pub fn install_sigbus_handler() -> Result<()> {
    file::sigbus::install_handler()
}
