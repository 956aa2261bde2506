//! # Binary Codec
//!
//! `DataStore::save` and `DataStore::load` move a whole store through a
//! [`SyncStream`]. The heap and handle table are written as raw
//! little-endian words, so loading is a bulk read plus one pass that turns
//! file string references back into runtime ids.
//!
//! ## File Layout
//!
//! ```text
//! +------------------------------+
//! | signature        8 bytes     |  legacy files stop here
//! | format version   u32         |
//! +------------------------------+
//! | file name table  u32 + bytes |  NUL-separated, entry 0 = ""
//! | key table        u32 + bytes |  NUL-separated, entry 0 = ""
//! | handle table     u32 + u32[] |  (generation | offset) entries
//! | heap             u32 + u32[] |  slot 0 = root node
//! +------------------------------+
//! | size after last gc   u32     |
//! | next handle          u32     |
//! | allocated handles    u32     |
//! | gc suppression count u32     |
//! +------------------------------+
//! ```
//!
//! Only little-endian hosts are supported.
//!
//! ## Save
//!
//! 1. Clone the store. With compaction, collect garbage on the clone,
//!    shrink its containers and densify its handle table
//! 2. Walk the clone's graph and replace every key and FilePath name id with
//!    a reference into the matching string table
//! 3. Write the header, both tables, the raw buffers and the scalars
//!
//! ## Load
//!
//! 1. Check the signature and version
//! 2. Read everything into a scratch store
//! 3. Intern the table strings and remap references back to runtime ids
//! 4. Densify the handle table if it is much larger than the live count
//! 5. Replace the destination with the scratch store
//!
//! The live allocated-handle count is recomputed from the handle table and
//! the suppression count is reset on load rather than trusted from the file.

mod header;
mod load;
mod remap;
mod save;
mod stream;

pub use stream::SyncStream;

pub(crate) use header::FileFormat;
