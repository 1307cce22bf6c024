// Modules - keep some public for advanced usage
pub mod file;
pub mod mmap;
pub mod object;
pub mod offset_array;
pub mod reader;
pub mod sigbus;

// Core functionality
pub use file::JournalFile;
pub use reader::{DEFAULT_MAX_FIELD_SIZE, Entry, JournalReader, ReaderOptions, Record};

// Essential types for walking a file by hand
pub use offset_array::EntryArrayCursor;

// For advanced object manipulation
pub use object::{
    Compression, DataObject, EntryArrayObject, EntryItemsType, EntryObject, HeaderCompatibleFlags,
    HeaderIncompatibleFlags, JournalHeader, JournalState, ObjectFlags, ObjectHeader, ObjectType,
    ObjectView, OffsetsType,
};

// Re-export commonly needed external types
pub use mmap::{MemoryMap, Mmap};
