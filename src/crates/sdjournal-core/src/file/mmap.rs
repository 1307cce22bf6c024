use crate::error::Result;
use std::fs::File;
use std::io::Read;
use std::ops::Deref;

// Re-export memmap2 types for other crates and import for internal use
pub use memmap2::{Mmap, MmapOptions};

/// Read-only byte storage backing an open journal file.
pub trait MemoryMap: Deref<Target = [u8]> {
    /// Makes the whole contents of `file` available as a byte slice.
    fn create(file: &File) -> Result<Self>
    where
        Self: Sized;
}

impl MemoryMap for Mmap {
    fn create(file: &File) -> Result<Self> {
        // SAFETY: the mapping is read-only. A concurrent truncation of the
        // file surfaces as SIGBUS, which `sigbus::install_handler` turns
        // into a readable zero page plus a fault count checked by the reader.
        let mmap = unsafe { MmapOptions::new().map(file)? };
        Ok(mmap)
    }
}

/// Heap-backed storage for filesystems that cannot be memory-mapped.
impl MemoryMap for Vec<u8> {
    fn create(file: &File) -> Result<Self> {
        let mut buf = Vec::with_capacity(file.metadata()?.len() as usize);
        let mut reader = file;
        reader.read_to_end(&mut buf)?;
        Ok(buf)
    }
}
