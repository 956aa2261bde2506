//! # Value Nodes
//!
//! Every value in a data store is a [`DataNode`]: a single 32-bit word that
//! either carries its value inline or refers to heap data through a
//! generational [`Handle`].
//!
//! ## Type Tags
//!
//! ```text
//! tag  type           storage
//! ---  -------------  ----------------------------------------
//!   0  Null           inline
//!   1  Float31        inline, any word with bit 0 set
//!   2  Boolean        inline
//!   4  Int32Small     inline, 27-bit signed
//!   6  FilePath       inline, packed (directory, type, name)
//!   8  Table          by reference, container
//!  10  Array          by reference, container
//!  12  String         by reference, container
//!  14  Int32Big       by reference, 1 slot
//!  16  UInt32         by reference, 1 slot
//!  18  Int64          by reference, 2 slots (low, high)
//!  20  UInt64         by reference, 2 slots (low, high)
//!  22  SpecialErase   inline, diff tombstone
//!  24  Float32        by reference, 1 slot
//! ```
//!
//! Tags 26, 28 and 30 are never written. A node carrying one decodes as
//! [`NodeType::Invalid`] and is only produced by corrupted input.
//!
//! ## NaN Boxing
//!
//! Floats whose lowest mantissa bit is already 0 are stored inline with that
//! bit set to 1 as the Float31 marker. Since every other tag is even, bit 0
//! alone distinguishes floats from tagged values. NaNs are canonicalized to
//! [`crate::config::CANONICAL_NAN_BITS`] (bit 0 clear) so they always fit
//! inline. Floats with bit 0 set go to the heap as Float32.
//!
//! ## Borrowed View
//!
//! [`Value`] is a typed, borrowed view of a node resolved against its store,
//! for callers that would rather `match` than query types one by one.

mod data_node;
mod handle;

pub use data_node::DataNode;
pub use handle::Handle;

use crate::path::FilePath;

/// Decoded node type. Discriminants equal the stored tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NodeType {
    Null = 0,
    Float31 = 1,
    Boolean = 2,
    Int32Small = 4,
    FilePath = 6,
    Table = 8,
    Array = 10,
    String = 12,
    Int32Big = 14,
    UInt32 = 16,
    Int64 = 18,
    UInt64 = 20,
    SpecialErase = 22,
    Float32 = 24,
    /// Unknown tag read from corrupted data.
    Invalid = 0xFF,
}

impl NodeType {
    /// Decodes an even tag. Odd tags are handled by the caller as Float31.
    pub fn from_tag(tag: u32) -> NodeType {
        match tag {
            0 => NodeType::Null,
            2 => NodeType::Boolean,
            4 => NodeType::Int32Small,
            6 => NodeType::FilePath,
            8 => NodeType::Table,
            10 => NodeType::Array,
            12 => NodeType::String,
            14 => NodeType::Int32Big,
            16 => NodeType::UInt32,
            18 => NodeType::Int64,
            20 => NodeType::UInt64,
            22 => NodeType::SpecialErase,
            24 => NodeType::Float32,
            t if t & 1 != 0 => NodeType::Float31,
            _ => NodeType::Invalid,
        }
    }

    /// Types whose payload is a handle into the heap.
    pub fn is_by_reference(self) -> bool {
        matches!(
            self,
            NodeType::Table
                | NodeType::Array
                | NodeType::String
                | NodeType::Int32Big
                | NodeType::UInt32
                | NodeType::Int64
                | NodeType::UInt64
                | NodeType::Float32
        )
    }

    /// Types whose heap data starts with a container header.
    pub fn is_container(self) -> bool {
        matches!(self, NodeType::Table | NodeType::Array | NodeType::String)
    }

    pub fn is_number(self) -> bool {
        matches!(
            self,
            NodeType::Float31
                | NodeType::Float32
                | NodeType::Int32Small
                | NodeType::Int32Big
                | NodeType::UInt32
                | NodeType::Int64
                | NodeType::UInt64
        )
    }

    /// Heap slots used by a by-reference scalar.
    pub(crate) fn scalar_slots(self) -> Option<u32> {
        match self {
            NodeType::Int32Big | NodeType::UInt32 | NodeType::Float32 => Some(1),
            NodeType::Int64 | NodeType::UInt64 => Some(2),
            _ => None,
        }
    }
}

/// Typed view of a node resolved against its store.
///
/// Inline and by-reference scalars are decoded to Rust values; strings borrow
/// the store's heap; arrays and tables are returned as nodes for further
/// traversal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    Null,
    SpecialErase,
    Boolean(bool),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float32(f32),
    FilePath(FilePath),
    String(&'a str),
    Array(DataNode),
    Table(DataNode),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        for t in [
            NodeType::Null,
            NodeType::Boolean,
            NodeType::Int32Small,
            NodeType::FilePath,
            NodeType::Table,
            NodeType::Array,
            NodeType::String,
            NodeType::Int32Big,
            NodeType::UInt32,
            NodeType::Int64,
            NodeType::UInt64,
            NodeType::SpecialErase,
            NodeType::Float32,
        ] {
            assert_eq!(NodeType::from_tag(t as u32), t);
        }
        assert_eq!(NodeType::from_tag(3), NodeType::Float31);
    }

    #[test]
    fn classification() {
        assert!(NodeType::Table.is_container());
        assert!(NodeType::Table.is_by_reference());
        assert!(!NodeType::FilePath.is_by_reference());
        assert!(NodeType::Float32.is_by_reference());
        assert!(!NodeType::Float32.is_container());
        assert_eq!(NodeType::Int64.scalar_slots(), Some(2));
        assert_eq!(NodeType::Array.scalar_slots(), None);
    }
}
