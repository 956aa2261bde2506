//! # Content Checksum
//!
//! MD5 over a canonical byte feed of a tree. The feed depends only on the
//! values, never on layout:
//!
//! | Node            | Bytes fed after the `i32` type tag             |
//! |-----------------|------------------------------------------------|
//! | Array           | `u32` count, then each element in order        |
//! | Table           | `u32` count, then per key in byte order: key   |
//! |                 | bytes, then the value                          |
//! | String          | UTF-8 bytes                                    |
//! | FilePath        | lower-cased serialized URL                     |
//! | Boolean         | `u32` 0 or 1                                   |
//! | Float31/Float32 | `f32`, with -0 fed as +0                       |
//! | Int32*          | `i32`                                          |
//! | UInt32          | `u32`                                          |
//! | Int64 / UInt64  | `i64` / `u64`                                  |
//! | Null            | `i32` 0                                        |
//! | SpecialErase    | `i32` 22                                       |
//!
//! All integers are little-endian. Table capacity and insertion order never
//! change the checksum.

use data_encoding::HEXLOWER;
use md5::{Digest, Md5};
use smallvec::SmallVec;

use crate::node::{DataNode, NodeType};
use crate::store::DataStore;
use crate::strings::HString;

impl DataStore {
    /// Lowercase hex MD5 of the whole tree.
    pub fn compute_md5(&self) -> String {
        self.node_md5(self.root_node())
    }

    /// Lowercase hex MD5 of the subtree at `node`.
    pub fn node_md5(&self, node: DataNode) -> String {
        let mut hasher = Md5::new();
        self.feed_md5(node, &mut hasher);
        HEXLOWER.encode(&hasher.finalize())
    }

    fn feed_md5(&self, node: DataNode, hasher: &mut Md5) {
        let kind = node.node_type();
        hasher.update((kind as u8 as i32).to_le_bytes());

        match kind {
            NodeType::Array => {
                let count = self.array_count(node).unwrap_or(0);
                hasher.update(count.to_le_bytes());
                for i in 0..count {
                    if let Some(child) = self.array_value(node, i) {
                        self.feed_md5(child, hasher);
                    }
                }
            }
            NodeType::Table => {
                let mut pairs: SmallVec<[(HString, DataNode); 16]> = self.table_iter(node).collect();
                pairs.sort_unstable_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
                hasher.update((pairs.len() as u32).to_le_bytes());
                for (key, child) in pairs {
                    hasher.update(key.as_str().as_bytes());
                    self.feed_md5(child, hasher);
                }
            }
            NodeType::String => {
                if let Some(bytes) = self.string_bytes(node) {
                    hasher.update(bytes);
                }
            }
            NodeType::FilePath => {
                let url = node.file_path_value().to_serialized_url().to_lowercase();
                hasher.update(url.as_bytes());
            }
            NodeType::Boolean => hasher.update((node.boolean_value() as u32).to_le_bytes()),
            NodeType::Float31 | NodeType::Float32 => {
                let v = self.as_float32(node).unwrap_or(0.0);
                let v = if v == 0.0 { 0.0f32 } else { v };
                hasher.update(v.to_le_bytes());
            }
            NodeType::Int32Small | NodeType::Int32Big => {
                hasher.update(self.as_int32(node).unwrap_or(0).to_le_bytes());
            }
            NodeType::UInt32 => hasher.update(self.assume_uint32(node).to_le_bytes()),
            NodeType::Int64 => hasher.update(self.assume_int64(node).to_le_bytes()),
            NodeType::UInt64 => hasher.update(self.assume_uint64(node).to_le_bytes()),
            NodeType::Null => hasher.update(0i32.to_le_bytes()),
            NodeType::SpecialErase => hasher.update((NodeType::SpecialErase as u8 as i32).to_le_bytes()),
            NodeType::Invalid => {}
        }
    }
}
