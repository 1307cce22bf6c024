use crate::error::{JournalError, Result};
use zerocopy::byteorder::little_endian::{U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

pub const SIGNATURE: [u8; 8] = *b"LPKSHHRH";

pub const HEADER_SIZE: u64 = 208;
pub const OBJECT_HEADER_SIZE: u64 = 16;
pub const ENTRY_ARRAY_OBJECT_HEADER_SIZE: u64 = 24;
pub const ENTRY_OBJECT_HEADER_SIZE: u64 = 64;
pub const DATA_OBJECT_HEADER_SIZE: u64 = 64;
pub const COMPACT_DATA_FIELDS_SIZE: u64 = 8;

// Every object starts on an 8-byte boundary
pub const OBJECT_ALIGNMENT: u64 = 8;

pub enum HeaderIncompatibleFlags {
    CompressedXz = 1 << 0,
    CompressedLz4 = 1 << 1,
    KeyedHash = 1 << 2,
    CompressedZstd = 1 << 3,
    Compact = 1 << 4,
}

impl HeaderIncompatibleFlags {
    pub const SUPPORTED: u32 = HeaderIncompatibleFlags::CompressedXz as u32
        | HeaderIncompatibleFlags::CompressedLz4 as u32
        | HeaderIncompatibleFlags::KeyedHash as u32
        | HeaderIncompatibleFlags::CompressedZstd as u32
        | HeaderIncompatibleFlags::Compact as u32;
}

pub enum HeaderCompatibleFlags {
    Sealed = 1 << 0,
    TailEntryBootId = 1 << 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalState {
    Offline = 0,
    Online = 1,
    Archived = 2,
}

impl TryFrom<u8> for JournalState {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, u8> {
        match value {
            0 => Ok(JournalState::Offline),
            1 => Ok(JournalState::Online),
            2 => Ok(JournalState::Archived),
            other => Err(other),
        }
    }
}

impl std::fmt::Display for JournalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JournalState::Offline => write!(f, "OFFLINE"),
            JournalState::Online => write!(f, "ONLINE"),
            JournalState::Archived => write!(f, "ARCHIVED"),
        }
    }
}

/// The fixed 208-byte prefix of every journal file.
///
/// Newer systemd versions append more fields after `tail_entry_monotonic`
/// and record the larger size in `header_size`. None of them are needed to
/// walk the entry list, so only the base prefix is modelled here.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct JournalHeader {
    pub signature: [u8; 8],
    pub compatible_flags: U32,
    pub incompatible_flags: U32,
    pub state: u8,
    pub reserved: [u8; 7],
    pub file_id: [u8; 16],
    pub machine_id: [u8; 16],
    pub tail_entry_boot_id: [u8; 16],
    pub seqnum_id: [u8; 16],
    pub header_size: U64,
    pub arena_size: U64,
    pub data_hash_table_offset: U64,
    pub data_hash_table_size: U64,
    pub field_hash_table_offset: U64,
    pub field_hash_table_size: U64,
    pub tail_object_offset: U64,
    pub n_objects: U64,
    pub n_entries: U64,
    pub tail_entry_seqnum: U64,
    pub head_entry_seqnum: U64,
    pub entry_array_offset: U64,
    pub head_entry_realtime: U64,
    pub tail_entry_realtime: U64,
    pub tail_entry_monotonic: U64,
}

impl JournalHeader {
    pub fn has_incompatible_flag(&self, flag: HeaderIncompatibleFlags) -> bool {
        (self.incompatible_flags.get() & flag as u32) != 0
    }

    pub fn has_compatible_flag(&self, flag: HeaderCompatibleFlags) -> bool {
        (self.compatible_flags.get() & flag as u32) != 0
    }

    pub fn is_compact(&self) -> bool {
        self.has_incompatible_flag(HeaderIncompatibleFlags::Compact)
    }

    /// Incompatible bits this reader does not know how to interpret.
    pub fn unknown_incompatible_flags(&self) -> u32 {
        self.incompatible_flags.get() & !HeaderIncompatibleFlags::SUPPORTED
    }

    pub fn state(&self) -> std::result::Result<JournalState, u8> {
        JournalState::try_from(self.state)
    }
}

pub enum ObjectFlags {
    CompressedXz = 1 << 0,
    CompressedLz4 = 1 << 1,
    CompressedZstd = 1 << 2,
}

/// Compression algorithm of a data object payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Xz,
    Lz4,
    Zstd,
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Compression::Xz => write!(f, "XZ"),
            Compression::Lz4 => write!(f, "LZ4"),
            Compression::Zstd => write!(f, "ZSTD"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ObjectType {
    Unused = 0,
    Data = 1,
    Field = 2,
    Entry = 3,
    DataHashTable = 4,
    FieldHashTable = 5,
    EntryArray = 6,
    Tag = 7,
}

impl ObjectType {
    /// Size of the part of an object of this type that precedes its
    /// variable-length payload.
    pub fn fixed_size(self, is_compact: bool) -> u64 {
        match self {
            ObjectType::Data if is_compact => DATA_OBJECT_HEADER_SIZE + COMPACT_DATA_FIELDS_SIZE,
            ObjectType::Data => DATA_OBJECT_HEADER_SIZE,
            ObjectType::Field => OBJECT_HEADER_SIZE + 24,
            ObjectType::Entry => ENTRY_OBJECT_HEADER_SIZE,
            ObjectType::EntryArray => ENTRY_ARRAY_OBJECT_HEADER_SIZE,
            ObjectType::Tag => OBJECT_HEADER_SIZE + 48,
            ObjectType::Unused | ObjectType::DataHashTable | ObjectType::FieldHashTable => {
                OBJECT_HEADER_SIZE
            }
        }
    }
}

impl TryFrom<u8> for ObjectType {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, u8> {
        match value {
            0 => Ok(ObjectType::Unused),
            1 => Ok(ObjectType::Data),
            2 => Ok(ObjectType::Field),
            3 => Ok(ObjectType::Entry),
            4 => Ok(ObjectType::DataHashTable),
            5 => Ok(ObjectType::FieldHashTable),
            6 => Ok(ObjectType::EntryArray),
            7 => Ok(ObjectType::Tag),
            other => Err(other),
        }
    }
}

#[derive(Debug, Copy, Clone, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct ObjectHeader {
    pub type_: u8,
    pub flags: u8,
    pub reserved: [u8; 6],
    pub size: U64,
}

impl ObjectHeader {
    pub fn xz_compressed(&self) -> bool {
        (self.flags & ObjectFlags::CompressedXz as u8) != 0
    }

    pub fn lz4_compressed(&self) -> bool {
        (self.flags & ObjectFlags::CompressedLz4 as u8) != 0
    }

    pub fn zstd_compressed(&self) -> bool {
        (self.flags & ObjectFlags::CompressedZstd as u8) != 0
    }

    /// The compression bits are exclusive on disk. If more than one is set
    /// anyway, XZ takes precedence over LZ4, and LZ4 over ZSTD.
    pub fn compression(&self) -> Option<Compression> {
        if self.xz_compressed() {
            Some(Compression::Xz)
        } else if self.lz4_compressed() {
            Some(Compression::Lz4)
        } else if self.zstd_compressed() {
            Some(Compression::Zstd)
        } else {
            None
        }
    }
}

#[derive(Debug, Copy, Clone, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct EntryArrayObjectHeader {
    pub object_header: ObjectHeader,
    pub next_entry_array_offset: U64,
}

#[derive(Debug, Copy, Clone, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct EntryObjectHeader {
    pub object_header: ObjectHeader,
    pub seqnum: U64,
    pub realtime: U64,
    pub monotonic: U64,
    pub boot_id: [u8; 16],
    pub xor_hash: U64,
}

// Regular layout: the data object offset followed by that object's hash.
// Only the offset is consumed.
#[derive(Debug, Copy, Clone, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct RegularEntryItem {
    pub object_offset: U64,
    pub hash: U64,
}

#[derive(Debug, Copy, Clone, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct CompactEntryItem {
    pub object_offset: U32,
}

#[derive(Debug, Copy, Clone, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct DataObjectHeader {
    pub object_header: ObjectHeader,
    pub hash: U64,
    pub next_hash_offset: U64,
    pub next_field_offset: U64,
    pub entry_offset: U64,
    pub entry_array_offset: U64,
    pub n_entries: U64,
}

// Skipped, never interpreted.
#[derive(Debug, Copy, Clone, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct CompactDataFields {
    pub tail_entry_array_offset: U32,
    pub tail_entry_array_n_entries: U32,
}

static_assertions::const_assert_eq!(std::mem::size_of::<JournalHeader>() as u64, HEADER_SIZE);
static_assertions::const_assert_eq!(
    std::mem::size_of::<ObjectHeader>() as u64,
    OBJECT_HEADER_SIZE
);
static_assertions::const_assert_eq!(
    std::mem::size_of::<EntryArrayObjectHeader>() as u64,
    ENTRY_ARRAY_OBJECT_HEADER_SIZE
);
static_assertions::const_assert_eq!(
    std::mem::size_of::<EntryObjectHeader>() as u64,
    ENTRY_OBJECT_HEADER_SIZE
);
static_assertions::const_assert_eq!(
    std::mem::size_of::<DataObjectHeader>() as u64,
    DATA_OBJECT_HEADER_SIZE
);
static_assertions::const_assert_eq!(
    std::mem::size_of::<CompactDataFields>() as u64,
    COMPACT_DATA_FIELDS_SIZE
);

/// An object whose bounds, alignment and type tag have been validated.
///
/// `bytes` covers the whole object as declared by its header, and the
/// first `fixed_size` bytes of it are the type-specific prefix.
#[derive(Debug, Clone, Copy)]
pub struct ObjectView<'a> {
    offset: u64,
    header: ObjectHeader,
    bytes: &'a [u8],
    fixed_size: usize,
}

impl<'a> ObjectView<'a> {
    pub(crate) fn new(
        offset: u64,
        header: ObjectHeader,
        bytes: &'a [u8],
        fixed_size: usize,
    ) -> Self {
        debug_assert!(fixed_size <= bytes.len());

        Self {
            offset,
            header,
            bytes,
            fixed_size,
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn header(&self) -> &ObjectHeader {
        &self.header
    }

    pub fn size(&self) -> u64 {
        self.header.size.get()
    }

    pub fn fixed(&self) -> &'a [u8] {
        &self.bytes[..self.fixed_size]
    }

    pub fn payload(&self) -> &'a [u8] {
        &self.bytes[self.fixed_size..]
    }
}

/// Typed access to an object, built from an already validated view.
pub trait JournalObject<'a>: Sized {
    const OBJECT_TYPE: ObjectType;

    fn from_view(view: ObjectView<'a>, is_compact: bool) -> Option<Self>;
}

/// Reinterprets `payload` as packed items of `T`, ignoring a trailing
/// partial item.
fn packed_items<T>(payload: &[u8]) -> Option<&[T]>
where
    T: FromBytes + KnownLayout + Immutable + Unaligned,
{
    let item_size = std::mem::size_of::<T>();
    let usable = payload.len() - payload.len() % item_size;
    <[T]>::ref_from_bytes(&payload[..usable]).ok()
}

pub enum OffsetsType<'a> {
    Regular(&'a [U64]),
    Compact(&'a [U32]),
}

impl OffsetsType<'_> {
    pub fn len(&self) -> usize {
        match self {
            OffsetsType::Regular(offsets) => offsets.len(),
            OffsetsType::Compact(offsets) => offsets.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<u64> {
        match self {
            OffsetsType::Regular(offsets) => offsets.get(index).map(|o| o.get()),
            OffsetsType::Compact(offsets) => offsets.get(index).map(|o| u64::from(o.get())),
        }
    }
}

impl std::fmt::Debug for OffsetsType<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OffsetsType::Regular(items) => write!(f, "Regular({} items)", items.len()),
            OffsetsType::Compact(items) => write!(f, "Compact({} items)", items.len()),
        }
    }
}

#[derive(Debug)]
pub struct EntryArrayObject<'a> {
    pub offset: u64,
    pub header: &'a EntryArrayObjectHeader,
    pub items: OffsetsType<'a>,
}

impl EntryArrayObject<'_> {
    pub fn next_entry_array_offset(&self) -> u64 {
        self.header.next_entry_array_offset.get()
    }

    /// Number of slots in this node, including unused trailing ones.
    pub fn capacity(&self) -> usize {
        self.items.len()
    }
}

impl<'a> JournalObject<'a> for EntryArrayObject<'a> {
    const OBJECT_TYPE: ObjectType = ObjectType::EntryArray;

    fn from_view(view: ObjectView<'a>, is_compact: bool) -> Option<Self> {
        let header = EntryArrayObjectHeader::ref_from_bytes(view.fixed()).ok()?;

        let items = if is_compact {
            OffsetsType::Compact(packed_items(view.payload())?)
        } else {
            OffsetsType::Regular(packed_items(view.payload())?)
        };

        Some(EntryArrayObject {
            offset: view.offset(),
            header,
            items,
        })
    }
}

pub enum EntryItemsType<'a> {
    Regular(&'a [RegularEntryItem]),
    Compact(&'a [CompactEntryItem]),
}

impl EntryItemsType<'_> {
    pub fn get(&self, index: usize) -> Option<u64> {
        match self {
            EntryItemsType::Regular(items) => items.get(index).map(|i| i.object_offset.get()),
            EntryItemsType::Compact(items) => {
                items.get(index).map(|i| u64::from(i.object_offset.get()))
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            EntryItemsType::Regular(items) => items.len(),
            EntryItemsType::Compact(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for EntryItemsType<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryItemsType::Regular(items) => write!(f, "Regular({} items)", items.len()),
            EntryItemsType::Compact(items) => write!(f, "Compact({} items)", items.len()),
        }
    }
}

#[derive(Debug)]
pub struct EntryObject<'a> {
    pub offset: u64,
    pub header: &'a EntryObjectHeader,
    pub items: EntryItemsType<'a>,
}

impl EntryObject<'_> {
    pub fn collect_offsets(&self, offsets: &mut Vec<u64>) {
        offsets.reserve(self.items.len());

        match &self.items {
            EntryItemsType::Regular(items) => {
                offsets.extend(items.iter().map(|item| item.object_offset.get()));
            }
            EntryItemsType::Compact(items) => {
                offsets.extend(items.iter().map(|item| u64::from(item.object_offset.get())));
            }
        }
    }
}

impl<'a> JournalObject<'a> for EntryObject<'a> {
    const OBJECT_TYPE: ObjectType = ObjectType::Entry;

    fn from_view(view: ObjectView<'a>, is_compact: bool) -> Option<Self> {
        let header = EntryObjectHeader::ref_from_bytes(view.fixed()).ok()?;

        let items = if is_compact {
            EntryItemsType::Compact(packed_items(view.payload())?)
        } else {
            EntryItemsType::Regular(packed_items(view.payload())?)
        };

        Some(EntryObject {
            offset: view.offset(),
            header,
            items,
        })
    }
}

pub enum DataPayloadType<'a> {
    Regular(&'a [u8]),
    Compact {
        compact_fields: &'a CompactDataFields,
        payload: &'a [u8],
    },
}

impl std::fmt::Debug for DataPayloadType<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataPayloadType::Regular(payload) => write!(f, "Regular({} bytes)", payload.len()),
            DataPayloadType::Compact {
                compact_fields,
                payload,
            } => write!(
                f,
                "Compact(fields: {:?}, payload: {} bytes)",
                compact_fields,
                payload.len()
            ),
        }
    }
}

#[derive(Debug)]
pub struct DataObject<'a> {
    pub offset: u64,
    pub header: &'a DataObjectHeader,
    pub payload: DataPayloadType<'a>,
}

impl<'a> DataObject<'a> {
    /// The payload exactly as stored, possibly compressed.
    pub fn raw_payload(&self) -> &'a [u8] {
        match self.payload {
            DataPayloadType::Regular(payload) => payload,
            DataPayloadType::Compact { payload, .. } => payload,
        }
    }

    pub fn compression(&self) -> Option<Compression> {
        self.header.object_header.compression()
    }

    pub fn is_compressed(&self) -> bool {
        self.compression().is_some()
    }

    /// Decompresses a ZSTD payload into `buf`, refusing to produce more
    /// than `limit` bytes. Returns the number of decompressed bytes.
    pub fn decompress(&self, buf: &mut Vec<u8>, limit: usize) -> Result<usize> {
        match self.compression() {
            Some(Compression::Zstd) => {
                use ruzstd::decoding::StreamingDecoder;
                use ruzstd::io::Read;

                let corrupt = || JournalError::CorruptCompressedData {
                    offset: self.offset,
                };

                let decoder = StreamingDecoder::new(self.raw_payload()).map_err(|_| corrupt())?;

                buf.clear();
                // One byte past the limit tells an exact fit apart from an overflow.
                let mut bounded = decoder.take((limit as u64).saturating_add(1));
                bounded.read_to_end(buf).map_err(|_| corrupt())?;

                if buf.len() > limit {
                    return Err(JournalError::FieldTooLarge {
                        offset: self.offset,
                        limit,
                    });
                }

                Ok(buf.len())
            }
            Some(other) => Err(JournalError::UnsupportedCompression(other)),
            None => {
                buf.clear();
                buf.extend_from_slice(self.raw_payload());
                Ok(buf.len())
            }
        }
    }
}

impl<'a> JournalObject<'a> for DataObject<'a> {
    const OBJECT_TYPE: ObjectType = ObjectType::Data;

    fn from_view(view: ObjectView<'a>, is_compact: bool) -> Option<Self> {
        let (header, rest) = DataObjectHeader::ref_from_prefix(view.fixed()).ok()?;

        let payload = if is_compact {
            let compact_fields = CompactDataFields::ref_from_bytes(rest).ok()?;
            DataPayloadType::Compact {
                compact_fields,
                payload: view.payload(),
            }
        } else {
            DataPayloadType::Regular(view.payload())
        };

        Some(DataObject {
            offset: view.offset(),
            header,
            payload,
        })
    }
}
