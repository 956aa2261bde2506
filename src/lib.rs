//! # datastore - Dynamically Typed Value Trees
//!
//! A [`DataStore`] holds one tree of dynamically typed values (null,
//! booleans, integers, floats, strings, file paths, arrays and tables) in a
//! single growable heap of 32-bit slots. Values are addressed through
//! generational handles, reclaimed by a copying garbage collector, and saved
//! and loaded through a versioned binary format.
//!
//! ## Quick Start
//!
//! ```ignore
//! use datastore::DataStore;
//!
//! let mut store = DataStore::new();
//! store.make_table(0)?;
//! let root = store.root_node();
//!
//! store.set_string_to_table(root, "name", "Alice")?;
//! store.set_array_to_table(root, "tags", 0)?;
//! let tags = store.table_value(root, "tags").unwrap();
//! store.set_string_to_array(tags, 0, "a")?;
//! store.set_string_to_array(tags, 1, "b")?;
//!
//! assert_eq!(store.to_string(), r#"{"name":"Alice","tags":["a","b"]}"#);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │  ops: equals, md5, integrity, text, diff │
//! ├────────────────────┬─────────────────────┤
//! │ codec: save / load │ store: typed values,│
//! │ string remapping   │ tables, GC, copy    │
//! ├────────────────────┴─────────────────────┤
//! │ heap: slot arena, handle table, headers  │
//! ├──────────────────────────────────────────┤
//! │ node: 32-bit tagged DataNode, Handle     │
//! ├──────────────────────────────────────────┤
//! │ strings: HString   path: FilePath        │
//! └──────────────────────────────────────────┘
//! ```
//!
//! ## Memory Layout
//!
//! ```text
//! heap:    [root][hdr|elements..][hdr|values..|keys..][lo|hi]...
//!            ^        ^ array          ^ table          ^ Int64
//! handles: [gen|offset][gen|offset]...
//! ```
//!
//! A by-reference node carries a handle (index, generation). The handle
//! table maps the index to the current slot offset, so the collector can
//! move data without touching any node held outside the store.
//!
//! ## Module Overview
//!
//! - [`config`]: layout and policy constants
//! - [`strings`]: `HString` interning, JSON escaping
//! - [`path`]: `FilePath`, `GameDirectory`, `FileType`, `Platform`
//! - [`node`]: `DataNode`, `NodeType`, `Handle`, `Value`
//! - `heap`: slot arena and handle table
//! - [`store`]: `DataStore` and its builder, containers, GC, deep copy
//! - [`codec`]: `SyncStream`, save and load
//! - `ops`: equality, checksums, integrity checks, text, diff and patch

#[macro_use]
mod macros;

pub mod codec;
pub mod config;
pub(crate) mod heap;
pub mod node;
mod ops;
pub mod path;
pub mod store;
pub mod strings;

pub use codec::SyncStream;
pub use node::{DataNode, Handle, NodeType, Value};
pub use path::{FilePath, FileType, GameDirectory, Platform};
pub use store::{ConflictPolicy, DataStore, DataStoreBuilder, SuppressGc, TableIter};
pub use strings::HString;
