//! Packed 32-bit tagged value.

use std::fmt;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::{Handle, NodeType};
use crate::config::{INT32_SMALL_MAX, INT32_SMALL_MIN, NODE_TYPE_BITS, NODE_TYPE_MASK};
use crate::path::FilePath;

/// One value slot: either an inline value or a handle to heap data.
///
/// ```text
/// bit 0 == 1   Float31: the f32 bit pattern with its lowest bit forced to 1
/// bit 0 == 0   bits 0..5 type tag, bits 5..32 payload
/// ```
///
/// A `DataNode` is only meaningful together with the store that produced it.
/// By-reference nodes hold a [`Handle`]; everything else is self-contained.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(transparent)]
pub struct DataNode(u32);

impl DataNode {
    pub const NULL: DataNode = DataNode(NodeType::Null as u32);
    pub const SPECIAL_ERASE: DataNode = DataNode(NodeType::SpecialErase as u32);

    #[inline]
    pub const fn from_raw(raw: u32) -> DataNode {
        DataNode(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    fn with_tag(tag: NodeType, value: u32) -> DataNode {
        DataNode((value << NODE_TYPE_BITS) | tag as u32)
    }

    #[inline]
    fn payload(self) -> u32 {
        self.0 >> NODE_TYPE_BITS
    }

    /// The node's type, or [`NodeType::Invalid`] for an unknown tag.
    #[inline]
    pub fn node_type(self) -> NodeType {
        if self.0 & 1 != 0 {
            NodeType::Float31
        } else {
            NodeType::from_tag(self.0 & NODE_TYPE_MASK)
        }
    }

    // ========================================================================
    // CONSTRUCTORS
    // ========================================================================

    #[inline]
    pub fn boolean(b: bool) -> DataNode {
        DataNode::with_tag(NodeType::Boolean, b as u32)
    }

    /// Inline integer. `v` must be in the Int32Small range.
    #[inline]
    pub fn int32_small(v: i32) -> DataNode {
        debug_assert!((INT32_SMALL_MIN..=INT32_SMALL_MAX).contains(&v));
        DataNode::with_tag(NodeType::Int32Small, v as u32)
    }

    /// Inline float. `v` must have its lowest mantissa bit clear.
    #[inline]
    pub fn float31(v: f32) -> DataNode {
        debug_assert!(v.to_bits() & 1 == 0);
        DataNode(v.to_bits() | 1)
    }

    #[inline]
    pub fn file_path(path: FilePath) -> DataNode {
        DataNode::with_tag(NodeType::FilePath, path.to_raw())
    }

    #[inline]
    pub fn by_reference(node_type: NodeType, handle: Handle) -> DataNode {
        debug_assert!(node_type.is_by_reference());
        DataNode::with_tag(node_type, handle.to_raw())
    }

    // ========================================================================
    // INLINE PAYLOADS
    // ========================================================================

    #[inline]
    pub fn boolean_value(self) -> bool {
        self.payload() != 0
    }

    #[inline]
    pub fn int32_small_value(self) -> i32 {
        (self.0 as i32) >> NODE_TYPE_BITS
    }

    #[inline]
    pub fn float31_value(self) -> f32 {
        f32::from_bits(self.0 & !1)
    }

    #[inline]
    pub fn file_path_value(self) -> FilePath {
        FilePath::from_raw(self.payload())
    }

    #[inline]
    pub fn handle(self) -> Handle {
        Handle::from_raw(self.payload())
    }

    /// Same type with a different handle.
    #[inline]
    pub(crate) fn with_handle(self, handle: Handle) -> DataNode {
        DataNode((handle.to_raw() << NODE_TYPE_BITS) | (self.0 & NODE_TYPE_MASK))
    }

    // ========================================================================
    // PREDICATES
    // ========================================================================

    #[inline]
    pub fn is_null(self) -> bool {
        self.0 & NODE_TYPE_MASK == NodeType::Null as u32
    }

    #[inline]
    pub fn is_special_erase(self) -> bool {
        self.node_type() == NodeType::SpecialErase
    }

    #[inline]
    pub fn is_boolean(self) -> bool {
        self.node_type() == NodeType::Boolean
    }

    #[inline]
    pub fn is_array(self) -> bool {
        self.node_type() == NodeType::Array
    }

    #[inline]
    pub fn is_table(self) -> bool {
        self.node_type() == NodeType::Table
    }

    #[inline]
    pub fn is_string(self) -> bool {
        self.node_type() == NodeType::String
    }

    #[inline]
    pub fn is_file_path(self) -> bool {
        self.node_type() == NodeType::FilePath
    }

    #[inline]
    pub fn is_float31(self) -> bool {
        self.0 & 1 != 0
    }

    #[inline]
    pub fn is_float32(self) -> bool {
        self.node_type() == NodeType::Float32
    }

    #[inline]
    pub fn is_int32_small(self) -> bool {
        self.node_type() == NodeType::Int32Small
    }

    #[inline]
    pub fn is_int32_big(self) -> bool {
        self.node_type() == NodeType::Int32Big
    }

    #[inline]
    pub fn is_int32(self) -> bool {
        matches!(self.node_type(), NodeType::Int32Small | NodeType::Int32Big)
    }

    #[inline]
    pub fn is_uint32(self) -> bool {
        self.node_type() == NodeType::UInt32
    }

    #[inline]
    pub fn is_int64(self) -> bool {
        self.node_type() == NodeType::Int64
    }

    #[inline]
    pub fn is_uint64(self) -> bool {
        self.node_type() == NodeType::UInt64
    }

    /// Any integer or float type.
    #[inline]
    pub fn is_number(self) -> bool {
        self.node_type().is_number()
    }

    #[inline]
    pub fn is_by_reference(self) -> bool {
        self.node_type().is_by_reference()
    }

    /// Array, String or Table.
    #[inline]
    pub fn is_container(self) -> bool {
        self.node_type().is_container()
    }
}

impl fmt::Debug for DataNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node_type() {
            NodeType::Float31 => write!(f, "Float31({})", self.float31_value()),
            NodeType::Boolean => write!(f, "Boolean({})", self.boolean_value()),
            NodeType::Int32Small => write!(f, "Int32Small({})", self.int32_small_value()),
            NodeType::FilePath => write!(f, "FilePath({})", self.file_path_value()),
            t if t.is_by_reference() => write!(f, "{:?}({:?})", t, self.handle()),
            t => write!(f, "{:?}", t),
        }
    }
}
