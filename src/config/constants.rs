//! # Data Store Layout Constants
//!
//! This module centralizes every numeric constant that shapes the in-memory
//! heap, the packed node encoding, and the on-disk format. Constants that
//! depend on each other are co-located and cross-checked at compile time so a
//! change to one bit width cannot silently desynchronize another.
//!
//! ## Dependency Graph
//!
//! ```text
//! NODE_TYPE_BITS (5)
//!       │
//!       ├─> NODE_VALUE_BITS (derived: 32 - NODE_TYPE_BITS = 27)
//!       │     │
//!       │     ├─> INT32_SMALL_MIN / INT32_SMALL_MAX (27-bit signed range)
//!       │     │
//!       │     ├─> HANDLE_GENERATION_BITS (3) + HANDLE_INDEX_BITS (24) == 27
//!       │     │     │
//!       │     │     └─> MAX_HANDLE_COUNT (1 << HANDLE_INDEX_BITS)
//!       │     │
//!       │     └─> FILE_PATH_DIRECTORY_BITS (3) + FILE_PATH_TYPE_BITS (5)
//!       │           + FILE_PATH_NAME_BITS (19) == 27
//!       │
//!       └─> LAST_NODE_TAG (24) must fit in NODE_TYPE_BITS
//!
//! HANDLE_OFFSET_BITS (29) + HANDLE_GENERATION_BITS (3) == 32
//!       │
//!       └─> INVALID_HEAP_OFFSET ((1 << 29) - 1)
//!
//! GC_MARKER_BYTES (512 KiB)
//!       │
//!       └─> size_after_last_gc never drops below this value
//! ```
//!
//! ## Critical Invariants
//!
//! 1. Handle, FilePath and Int32Small payloads all fit in `NODE_VALUE_BITS`.
//! 2. The handle table ceiling matches the handle index width.
//! 3. The big-array ceiling is below the container capacity field width.
//! 4. The canonical NaN pattern has bit 0 cleared (it is stored as Float31).

// ============================================================================
// NODE ENCODING
// Every DataNode is one 32-bit word: a 5-bit tag and a 27-bit payload, or a
// Float31 when bit 0 is set
// ============================================================================

/// Number of low bits reserved for the node type tag.
pub const NODE_TYPE_BITS: u32 = 5;

/// Mask selecting the node type tag.
pub const NODE_TYPE_MASK: u32 = (1 << NODE_TYPE_BITS) - 1;

/// Number of payload bits above the type tag.
pub const NODE_VALUE_BITS: u32 = 32 - NODE_TYPE_BITS;

/// Largest valid node tag. Tags above this are corrupt data.
pub const LAST_NODE_TAG: u32 = 24;

/// Smallest integer stored inline as Int32Small.
pub const INT32_SMALL_MIN: i32 = !((1 << (NODE_VALUE_BITS - 1)) - 1);

/// Largest integer stored inline as Int32Small.
pub const INT32_SMALL_MAX: i32 = (1 << (NODE_VALUE_BITS - 1)) - 1;

/// The single NaN bit pattern every stored NaN is canonicalized to.
pub const CANONICAL_NAN_BITS: u32 = 0xFFFF_FFFE;

const _: () = assert!(LAST_NODE_TAG <= NODE_TYPE_MASK, "node tags must fit in NODE_TYPE_BITS");

const _: () = assert!(
    CANONICAL_NAN_BITS & 1 == 0,
    "canonical NaN must be representable as an inline Float31"
);

// ============================================================================
// HANDLES
// A handle is (index, generation) packed into a node payload
// ============================================================================

/// Bits of generation carried in handles and handle table entries.
pub const HANDLE_GENERATION_BITS: u32 = 3;

/// Bits of handle table index carried in a handle.
pub const HANDLE_INDEX_BITS: u32 = 24;

/// Hard ceiling on the number of handle table entries.
pub const MAX_HANDLE_COUNT: u32 = 1 << HANDLE_INDEX_BITS;

/// Generation assigned to every entry by handle table compaction and to
/// `Handle::DEFAULT`.
pub const DEFAULT_HANDLE_GENERATION: u32 = (1 << HANDLE_GENERATION_BITS) - 1;

/// Bits of heap slot offset in a handle table entry.
pub const HANDLE_OFFSET_BITS: u32 = 32 - HANDLE_GENERATION_BITS;

/// Offset value marking a free handle table entry.
pub const INVALID_HEAP_OFFSET: u32 = (1 << HANDLE_OFFSET_BITS) - 1;

const _: () = assert!(
    HANDLE_GENERATION_BITS + HANDLE_INDEX_BITS == NODE_VALUE_BITS,
    "handle payload must exactly fill the node value bits"
);

// ============================================================================
// FILE PATHS
// Inline FilePath payload: directory | file type | relative name id
// ============================================================================

/// Bits for the game directory enum.
pub const FILE_PATH_DIRECTORY_BITS: u32 = 3;

/// Bits for the file type enum.
pub const FILE_PATH_TYPE_BITS: u32 = 5;

/// Bits for the interned relative filename id.
pub const FILE_PATH_NAME_BITS: u32 = 19;

/// Largest relative filename id that fits in a FilePath node.
pub const MAX_FILE_PATH_NAME_ID: u32 = (1 << FILE_PATH_NAME_BITS) - 1;

const _: () = assert!(
    FILE_PATH_DIRECTORY_BITS + FILE_PATH_TYPE_BITS + FILE_PATH_NAME_BITS == NODE_VALUE_BITS,
    "FilePath payload must exactly fill the node value bits"
);

// ============================================================================
// CONTAINERS
// ============================================================================

/// Heap slots occupied by a container header (capacity word + count word).
pub const CONTAINER_HEADER_SLOTS: u32 = 2;

/// Mask for the 31-bit capacity and count fields of a container header.
pub const CONTAINER_FIELD_MASK: u32 = 0x7FFF_FFFF;

/// Arrays may not be resized to this many elements or more.
pub const BIG_ARRAY_LIMIT: u32 = 1 << 20;

/// Table growth threshold as a fraction of capacity.
pub const TABLE_LOAD_FACTOR: f32 = 0.75;

/// Bytes per heap slot.
pub const SLOT_BYTES: u32 = 4;

const _: () = assert!(BIG_ARRAY_LIMIT < CONTAINER_FIELD_MASK, "array ceiling must fit in header");

// ============================================================================
// GARBAGE COLLECTION
// ============================================================================

/// Minimum heap size (bytes) considered the post-GC baseline.
pub const GC_MARKER_BYTES: u32 = 512 * 1024;

/// Automatic GC runs once the heap reaches this multiple of its post-GC size.
pub const GC_GROWTH_FACTOR: u32 = 2;

const _: () = assert!(GC_GROWTH_FACTOR >= 1, "GC growth factor must be at least 1");

// ============================================================================
// FILE FORMAT
// ============================================================================

/// Signature at the start of every versioned save file.
pub const FILE_SIGNATURE: [u8; 8] = [0xEB, 0x4E, 0x6D, 0xBA, 0xBD, 0x66, 0xD1, 0xEC];

/// Signature of the legacy format that carries no version field.
pub const LEGACY_FILE_SIGNATURE: [u8; 8] = [0xFF, 0xFF, 0x00, 0xDE, 0xA7, 0x7F, 0x00, 0xDD];

/// Version written by `save`.
pub const FORMAT_VERSION: u32 = 2;

/// Oldest version whose string table references are ordinal positions.
/// Earlier versions reference strings by byte offset.
pub const FIRST_ORDINAL_STRING_VERSION: u32 = 2;

const _: () = assert!(
    FIRST_ORDINAL_STRING_VERSION <= FORMAT_VERSION,
    "current format must use ordinal string references"
);
