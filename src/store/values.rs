//! # Typed Values
//!
//! Setters create a node of the right representation and store it in an
//! array slot or under a table key; readers decode a node back into a Rust
//! value.
//!
//! ## Number Representation
//!
//! Every numeric setter picks the smallest representation that holds the
//! value exactly:
//!
//! ```text
//! int32    Int32Small if it fits 27 bits, else Int32Big
//! uint32   int32 path if < 2^31, else UInt32
//! int64    int32 path if in i32 range, UInt32 if in (i32::MAX, u32::MAX], else Int64
//! uint64   int64 path if <= i64::MAX, else UInt64
//! float32  integer path if integral and exact, else Float31 if bit 0 is clear,
//!          else Float32; NaN is canonicalized first
//! ```
//!
//! Readers accept every representation whose value fits the requested type,
//! so `as_int64` reads a value stored through `set_uint32` and so on.
//!
//! ## Setter Naming
//!
//! Each value kind gets a `set_<kind>_to_array(array, index, ...)` and a
//! `set_<kind>_to_table(table, key, ...)` pair. Array setters grow the
//! array when `index >= count`; table setters insert or overwrite.

use eyre::Result;

use super::DataStore;
use crate::config::{CANONICAL_NAN_BITS, INT32_SMALL_MAX, INT32_SMALL_MIN};
use crate::node::{DataNode, NodeType, Value};
use crate::path::FilePath;
use crate::strings::HString;

/// 2^64 as f32, the first float that no longer fits a u64.
const U64_LIMIT_F32: f32 = 18_446_744_073_709_551_616.0;

macro_rules! value_setters {
    ($(
        $(#[$doc:meta])*
        [$to_array:ident, $to_table:ident]($($arg:ident: $ty:ty),*) => |$store:ident| $make:expr;
    )*) => {
        impl DataStore {
            $(
                $(#[$doc])*
                pub fn $to_array(&mut self, array: DataNode, index: u32 $(, $arg: $ty)*) -> Result<()> {
                    Self::ensure_kind(array, NodeType::Array, stringify!($to_array))?;
                    let made: Result<DataNode> = {
                        let $store = &mut *self;
                        $make
                    };
                    let node = made?;
                    self.set_array_value(array, index, node)
                }

                $(#[$doc])*
                pub fn $to_table(&mut self, table: DataNode, key: impl Into<HString> $(, $arg: $ty)*) -> Result<()> {
                    Self::ensure_kind(table, NodeType::Table, stringify!($to_table))?;
                    let key = key.into();
                    let made: Result<DataNode> = {
                        let $store = &mut *self;
                        $make
                    };
                    let node = made?;
                    self.set_table_value(table, key, node)
                }
            )*
        }
    };
}

value_setters! {
    /// Stores Null.
    [set_null_to_array, set_null_to_table]() => |_s| Ok(DataNode::NULL);

    /// Stores the diff tombstone.
    [set_special_erase_to_array, set_special_erase_to_table]() => |_s| Ok(DataNode::SPECIAL_ERASE);

    [set_boolean_to_array, set_boolean_to_table](value: bool) => |_s| Ok(DataNode::boolean(value));

    [set_int32_to_array, set_int32_to_table](value: i32) => |s| s.make_int32_node(value);

    [set_uint32_to_array, set_uint32_to_table](value: u32) => |s| s.make_uint32_node(value);

    [set_int64_to_array, set_int64_to_table](value: i64) => |s| s.make_int64_node(value);

    [set_uint64_to_array, set_uint64_to_table](value: u64) => |s| s.make_uint64_node(value);

    [set_float32_to_array, set_float32_to_table](value: f32) => |s| s.make_float32_node(value);

    [set_file_path_to_array, set_file_path_to_table](value: FilePath) => |_s| Ok(DataNode::file_path(value));

    /// Stores a copy of `value`.
    [set_string_to_array, set_string_to_table](value: &str) => |s| s.make_string_node(value);

    /// Decodes JSON-style escape sequences in `value` and stores the result.
    [unescape_and_set_string_to_array, unescape_and_set_string_to_table](value: &str) => |s| s.make_unescaped_string_node(value);

    /// Stores a new empty array.
    [set_array_to_array, set_array_to_table](initial_capacity: u32) => |s| s.make_array_node(initial_capacity);

    /// Stores a new empty table. The capacity rounds up to a power of two.
    [set_table_to_array, set_table_to_table](initial_capacity: u32) => |s| s.make_table_node(initial_capacity);
}

impl DataStore {
    // ========================================================================
    // NUMBER CONSTRUCTION
    // ========================================================================

    pub(crate) fn make_int32_node(&mut self, v: i32) -> Result<DataNode> {
        if (INT32_SMALL_MIN..=INT32_SMALL_MAX).contains(&v) {
            Ok(DataNode::int32_small(v))
        } else {
            self.make_scalar_node(NodeType::Int32Big, &[v as u32])
        }
    }

    pub(crate) fn make_uint32_node(&mut self, v: u32) -> Result<DataNode> {
        match i32::try_from(v) {
            Ok(i) => self.make_int32_node(i),
            Err(_) => self.make_scalar_node(NodeType::UInt32, &[v]),
        }
    }

    pub(crate) fn make_int64_node(&mut self, v: i64) -> Result<DataNode> {
        if let Ok(i) = i32::try_from(v) {
            return self.make_int32_node(i);
        }
        if let Ok(u) = u32::try_from(v) {
            return self.make_scalar_node(NodeType::UInt32, &[u]);
        }
        let bits = v as u64;
        self.make_scalar_node(NodeType::Int64, &[bits as u32, (bits >> 32) as u32])
    }

    pub(crate) fn make_uint64_node(&mut self, v: u64) -> Result<DataNode> {
        match i64::try_from(v) {
            Ok(i) => self.make_int64_node(i),
            Err(_) => self.make_scalar_node(NodeType::UInt64, &[v as u32, (v >> 32) as u32]),
        }
    }

    pub(crate) fn make_float32_node(&mut self, v: f32) -> Result<DataNode> {
        if !v.is_nan() {
            if v < 0.0 {
                let i = v as i64;
                if i as f32 == v {
                    return self.make_int64_node(i);
                }
            } else if v < U64_LIMIT_F32 {
                let u = v as u64;
                if u as f32 == v {
                    return self.make_uint64_node(u);
                }
            }
        }

        let bits = if v.is_nan() { CANONICAL_NAN_BITS } else { v.to_bits() };
        if bits & 1 == 0 {
            Ok(DataNode::float31(f32::from_bits(bits)))
        } else {
            self.make_scalar_node(NodeType::Float32, &[bits])
        }
    }

    // ========================================================================
    // READERS
    // ========================================================================

    #[inline]
    fn word(&self, node: DataNode) -> Option<u32> {
        let offset = self.data_offset(node, 1)?;
        self.heap.slot(offset)
    }

    #[inline]
    fn dword(&self, node: DataNode) -> Option<u64> {
        let offset = self.data_offset(node, 2)?;
        let lo = self.heap.slot(offset)? as u64;
        let hi = self.heap.slot(offset + 1)? as u64;
        Some(lo | (hi << 32))
    }

    /// Boolean, or an Int32Small read as `!= 0`.
    pub fn as_boolean(&self, node: DataNode) -> Option<bool> {
        match node.node_type() {
            NodeType::Boolean => Some(node.boolean_value()),
            NodeType::Int32Small => Some(node.int32_small_value() != 0),
            _ => None,
        }
    }

    pub fn as_int32(&self, node: DataNode) -> Option<i32> {
        match node.node_type() {
            NodeType::Int32Small => Some(node.int32_small_value()),
            NodeType::Int32Big => self.word(node).map(|w| w as i32),
            _ => None,
        }
    }

    pub fn as_uint32(&self, node: DataNode) -> Option<u32> {
        match node.node_type() {
            NodeType::UInt32 => self.word(node),
            NodeType::Int32Small | NodeType::Int32Big => {
                self.as_int32(node).and_then(|i| u32::try_from(i).ok())
            }
            _ => None,
        }
    }

    pub fn as_int64(&self, node: DataNode) -> Option<i64> {
        match node.node_type() {
            NodeType::Int64 => self.dword(node).map(|d| d as i64),
            NodeType::Int32Small | NodeType::Int32Big => self.as_int32(node).map(i64::from),
            NodeType::UInt32 => self.word(node).map(i64::from),
            _ => None,
        }
    }

    pub fn as_uint64(&self, node: DataNode) -> Option<u64> {
        match node.node_type() {
            NodeType::UInt64 => self.dword(node),
            NodeType::Int64 | NodeType::Int32Small | NodeType::Int32Big => {
                self.as_int64(node).and_then(|i| u64::try_from(i).ok())
            }
            NodeType::UInt32 => self.word(node).map(u64::from),
            _ => None,
        }
    }

    /// Any numeric value, converted to `f32`.
    pub fn as_float32(&self, node: DataNode) -> Option<f32> {
        match node.node_type() {
            NodeType::Float31 => Some(node.float31_value()),
            NodeType::Float32 => self.word(node).map(f32::from_bits),
            NodeType::Int32Small | NodeType::Int32Big => self.as_int32(node).map(|i| i as f32),
            NodeType::UInt32 => self.word(node).map(|u| u as f32),
            NodeType::Int64 => self.dword(node).map(|d| d as i64 as f32),
            NodeType::UInt64 => self.dword(node).map(|d| d as f32),
            _ => None,
        }
    }

    /// String text, or `""` for Null.
    pub fn as_string(&self, node: DataNode) -> Option<&str> {
        match node.node_type() {
            NodeType::Null => Some(""),
            NodeType::String => std::str::from_utf8(self.string_bytes(node)?).ok(),
            _ => None,
        }
    }

    /// FilePath, an invalid path for Null, or a String holding a serialized
    /// file URL.
    pub fn as_file_path(&self, node: DataNode) -> Option<FilePath> {
        match node.node_type() {
            NodeType::FilePath => Some(node.file_path_value()),
            NodeType::Null => Some(FilePath::default()),
            NodeType::String => FilePath::from_serialized_url(self.as_string(node)?),
            _ => None,
        }
    }

    // ========================================================================
    // UNCHECKED READERS
    // ========================================================================
    //
    // For callers that already dispatched on the node type. A node of the
    // wrong type or one that no longer resolves reads as zero.

    pub fn assume_boolean(&self, node: DataNode) -> bool {
        debug_assert!(node.is_boolean());
        node.boolean_value()
    }

    pub fn assume_int32_small(&self, node: DataNode) -> i32 {
        debug_assert!(node.is_int32_small());
        node.int32_small_value()
    }

    pub fn assume_int32_big(&self, node: DataNode) -> i32 {
        debug_assert!(node.is_int32_big());
        self.word(node).unwrap_or(0) as i32
    }

    pub fn assume_uint32(&self, node: DataNode) -> u32 {
        debug_assert!(node.is_uint32());
        self.word(node).unwrap_or(0)
    }

    pub fn assume_int64(&self, node: DataNode) -> i64 {
        debug_assert!(node.is_int64());
        self.dword(node).unwrap_or(0) as i64
    }

    pub fn assume_uint64(&self, node: DataNode) -> u64 {
        debug_assert!(node.is_uint64());
        self.dword(node).unwrap_or(0)
    }

    pub fn assume_float31(&self, node: DataNode) -> f32 {
        debug_assert!(node.is_float31());
        node.float31_value()
    }

    pub fn assume_float32(&self, node: DataNode) -> f32 {
        debug_assert!(node.is_float32());
        f32::from_bits(self.word(node).unwrap_or(0))
    }

    pub fn assume_file_path(&self, node: DataNode) -> FilePath {
        debug_assert!(node.is_file_path());
        node.file_path_value()
    }

    /// Typed view of `node`. `None` for invalid tags and for by-reference
    /// nodes that do not resolve.
    pub fn value(&self, node: DataNode) -> Option<Value<'_>> {
        Some(match node.node_type() {
            NodeType::Null => Value::Null,
            NodeType::SpecialErase => Value::SpecialErase,
            NodeType::Boolean => Value::Boolean(node.boolean_value()),
            NodeType::Int32Small | NodeType::Int32Big => Value::Int32(self.as_int32(node)?),
            NodeType::UInt32 => Value::UInt32(self.word(node)?),
            NodeType::Int64 => Value::Int64(self.dword(node)? as i64),
            NodeType::UInt64 => Value::UInt64(self.dword(node)?),
            NodeType::Float31 | NodeType::Float32 => Value::Float32(self.as_float32(node)?),
            NodeType::FilePath => Value::FilePath(node.file_path_value()),
            NodeType::String => Value::String(self.as_string(node)?),
            NodeType::Array => {
                self.array_header(node)?;
                Value::Array(node)
            }
            NodeType::Table => {
                self.table_buckets(node)?;
                Value::Table(node)
            }
            NodeType::Invalid => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::GameDirectory;

    fn array_store() -> (DataStore, DataNode) {
        let mut store = DataStore::new();
        store.make_array(0).unwrap();
        let root = store.root_node();
        (store, root)
    }

    #[test]
    fn integers_pick_smallest_representation() {
        let (mut store, root) = array_store();
        store.set_int32_to_array(root, 0, 5).unwrap();
        store.set_int32_to_array(root, 1, i32::MAX).unwrap();
        store.set_int64_to_array(root, 2, 3_000_000_000).unwrap();
        store.set_int64_to_array(root, 3, -5_000_000_000).unwrap();
        store.set_uint64_to_array(root, 4, u64::MAX).unwrap();
        store.set_uint32_to_array(root, 5, 7).unwrap();

        let types: Vec<_> = (0..6).map(|i| store.array_value(root, i).unwrap().node_type()).collect();
        assert_eq!(
            types,
            vec![
                NodeType::Int32Small,
                NodeType::Int32Big,
                NodeType::UInt32,
                NodeType::Int64,
                NodeType::UInt64,
                NodeType::Int32Small,
            ]
        );

        let at = |i| store.array_value(root, i).unwrap();
        assert_eq!(store.as_int32(at(1)), Some(i32::MAX));
        assert_eq!(store.as_int64(at(2)), Some(3_000_000_000));
        assert_eq!(store.as_uint32(at(2)), Some(3_000_000_000));
        assert_eq!(store.as_int64(at(3)), Some(-5_000_000_000));
        assert_eq!(store.as_uint64(at(4)), Some(u64::MAX));
        assert_eq!(store.as_int64(at(4)), None);
        assert_eq!(store.as_uint64(at(3)), None);
    }

    #[test]
    fn integral_floats_become_integers() {
        let (mut store, root) = array_store();
        store.set_float32_to_array(root, 0, 3.0).unwrap();
        store.set_float32_to_array(root, 1, -0.0).unwrap();
        store.set_float32_to_array(root, 2, -2.0).unwrap();
        store.set_float32_to_array(root, 3, 1.5).unwrap();

        let at = |i| store.array_value(root, i).unwrap();
        assert!(at(0).is_int32_small());
        assert_eq!(store.as_int32(at(1)), Some(0));
        assert_eq!(store.as_int32(at(2)), Some(-2));
        assert!(at(3).is_float31());
        assert_eq!(store.as_float32(at(3)), Some(1.5));
    }

    #[test]
    fn odd_mantissa_floats_go_by_reference() {
        let (mut store, root) = array_store();
        let v = f32::from_bits(0x3F80_0001);
        store.set_float32_to_array(root, 0, v).unwrap();
        let node = store.array_value(root, 0).unwrap();
        assert!(node.is_float32());
        assert_eq!(store.as_float32(node).map(f32::to_bits), Some(0x3F80_0001));
    }

    #[test]
    fn nan_is_canonical_and_inline() {
        let (mut store, root) = array_store();
        store.set_float32_to_array(root, 0, f32::from_bits(0x7FC0_0001)).unwrap();
        let node = store.array_value(root, 0).unwrap();
        assert!(node.is_float31());
        assert_eq!(node.raw(), CANONICAL_NAN_BITS | 1);
        assert!(store.as_float32(node).unwrap().is_nan());
    }

    #[test]
    fn infinities_stay_floats() {
        let (mut store, root) = array_store();
        store.set_float32_to_array(root, 0, f32::INFINITY).unwrap();
        store.set_float32_to_array(root, 1, f32::NEG_INFINITY).unwrap();
        assert_eq!(store.as_float32(store.array_value(root, 0).unwrap()), Some(f32::INFINITY));
        assert_eq!(
            store.as_float32(store.array_value(root, 1).unwrap()),
            Some(f32::NEG_INFINITY)
        );
    }

    #[test]
    fn string_and_file_path_readers() {
        let (mut store, root) = array_store();
        store.set_string_to_array(root, 0, "content://ui/menu.png").unwrap();
        let path = FilePath::create(GameDirectory::Config, "game.json");
        store.set_file_path_to_array(root, 1, path).unwrap();

        let s = store.array_value(root, 0).unwrap();
        assert_eq!(store.as_string(s), Some("content://ui/menu.png"));
        assert!(store.as_file_path(s).is_some_and(|p| p.is_valid()));
        assert_eq!(store.as_file_path(store.array_value(root, 1).unwrap()), Some(path));
        assert_eq!(store.as_string(DataNode::NULL), Some(""));
        assert_eq!(store.as_file_path(DataNode::NULL), Some(FilePath::default()));
    }

    #[test]
    fn value_view_matches_readers() {
        let mut store = DataStore::new();
        store.make_table(0).unwrap();
        let root = store.root_node();
        store.set_string_to_table(root, "s", "text").unwrap();
        store.set_uint64_to_table(root, "u", u64::MAX).unwrap();
        store.set_array_to_table(root, "a", 2).unwrap();

        assert_eq!(
            store.value(store.table_value(root, "s").unwrap()),
            Some(Value::String("text"))
        );
        assert_eq!(
            store.value(store.table_value(root, "u").unwrap()),
            Some(Value::UInt64(u64::MAX))
        );
        assert!(matches!(
            store.value(store.table_value(root, "a").unwrap()),
            Some(Value::Array(_))
        ));
        assert_eq!(store.value(DataNode::from_raw(26)), None);
    }

    #[test]
    fn setters_check_container_kind() {
        let (mut store, root) = array_store();
        assert!(store.set_int32_to_table(root, "k", 1).is_err());
        assert!(store.set_boolean_to_array(DataNode::NULL, 0, true).is_err());
    }
}
