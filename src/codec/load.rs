//! Reading a store from a stream.

use eyre::Result;

use super::header::FileFormat;
use super::remap::{remap_graph, LoadRemap};
use super::stream::{read_buffer, read_u32, SyncStream};
use crate::config::{INVALID_HEAP_OFFSET, MAX_HANDLE_COUNT};
use crate::heap::{next_pow2, HandleDataOffset};
use crate::store::DataStore;

/// Upper bound on a string table read from a file.
const MAX_STRING_TABLE_BYTES: usize = u32::MAX as usize;

impl DataStore {
    /// Replaces this store with one read from `stream`.
    ///
    /// Accepts the current format, version 1, and the legacy unversioned
    /// format. The file is read into a scratch store which replaces this
    /// one only once everything has been read, so on error this store is
    /// unchanged.
    ///
    /// String references that cannot be resolved, and containers whose
    /// handles or extents are out of bounds, stop remapping of that subtree
    /// and are logged; the load still succeeds. Call
    /// [`verify_integrity`](Self::verify_integrity) before trusting data
    /// from an untrusted source.
    ///
    /// Every node obtained from this store before the call is invalid
    /// afterwards.
    pub fn load<S: SyncStream + ?Sized>(&mut self, stream: &mut S) -> Result<()> {
        let start = stream.position();
        let format = FileFormat::read(stream)?;

        let file_names: Vec<u8> = read_buffer(stream, MAX_STRING_TABLE_BYTES, "file name table")?;
        let keys: Vec<u8> = read_buffer(stream, MAX_STRING_TABLE_BYTES, "key table")?;
        let handles: Vec<HandleDataOffset> = read_buffer(stream, MAX_HANDLE_COUNT as usize, "handle table")?;
        let data: Vec<u32> = read_buffer(stream, INVALID_HEAP_OFFSET as usize, "heap")?;

        let size_after_last_gc = read_u32(stream, "size after last gc")?;
        let next_handle = read_u32(stream, "next handle")?;
        let _allocated_handles = read_u32(stream, "allocated handles")?;
        let _suppress_gc = read_u32(stream, "gc suppression count")?;

        let mut loaded = DataStore::with_policy(self.policy);
        loaded.heap.data = data;
        loaded.heap.handles = handles;
        loaded.heap.next_handle = next_handle;
        loaded.heap.size_after_last_gc = size_after_last_gc.max(self.policy.gc_marker_bytes);
        loaded.heap.recount_allocated_handles();

        let mut remap = LoadRemap::new(file_names, &keys, format.ordinal_strings())?;
        let stopped = remap_graph(&mut loaded.heap, &mut remap);
        if stopped > 0 {
            tracing::warn!(stopped, "load: stopped remapping corrupted subtrees");
        }

        let handle_count = loaded.heap.handles.len() as u32;
        if self.policy.compact_handles_on_load && handle_count > next_pow2(loaded.heap.allocated_handles) {
            loaded.compact_handle_offsets();
        }

        tracing::debug!(
            bytes = stream.position().saturating_sub(start),
            ?format,
            heap_slots = loaded.heap.data.len(),
            handles = loaded.heap.handles.len(),
            "loaded data store"
        );

        *self = loaded;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::Platform;
    use std::io::Cursor;

    fn saved(store: &DataStore, compact: bool) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        store.save(&mut out, Platform::current(), compact).unwrap();
        out.into_inner()
    }

    #[test]
    fn failed_load_leaves_store_unchanged() {
        let mut store = DataStore::new();
        store.make_table(0).unwrap();
        let root = store.root_node();
        store.set_int32_to_table(root, "keep", 3).unwrap();

        let mut bytes = saved(&store, true);
        bytes.truncate(bytes.len() - 2);
        assert!(store.load(&mut Cursor::new(bytes.as_slice())).is_err());
        assert_eq!(store.as_int32(store.table_value(root, "keep").unwrap()), Some(3));
    }

    #[test]
    fn uncompacted_handle_table_is_densified() {
        let mut store = DataStore::new();
        store.make_table(0).unwrap();
        let root = store.root_node();
        for i in 0..20 {
            store.set_table_to_table(root, format!("t{i}"), 0).unwrap();
        }
        for i in 0..18 {
            store.erase_value_from_table(root, format!("t{i}")).unwrap();
        }
        store.collect_garbage(false);
        assert_eq!(store.heap.handles.len(), 32);

        let bytes = saved(&store, false);
        let mut loaded = DataStore::new();
        loaded.load(&mut Cursor::new(bytes.as_slice())).unwrap();
        assert_eq!(loaded.heap.handles.len(), 3);
        assert!(loaded.table_contains_key(loaded.root_node(), "t19"));

        let mut kept = DataStore::builder().compact_handles_on_load(false).build().unwrap();
        kept.load(&mut Cursor::new(bytes.as_slice())).unwrap();
        assert_eq!(kept.heap.handles.len(), 32);
        assert!(kept.table_contains_key(kept.root_node(), "t18"));
    }

    #[test]
    fn suppression_does_not_survive_round_trip() {
        let mut store = DataStore::new();
        store.make_array(0).unwrap();
        let bytes = {
            let guard = store.suppress_gc();
            saved(&guard, false)
        };
        let mut loaded = DataStore::new();
        loaded.load(&mut Cursor::new(bytes.as_slice())).unwrap();
        assert!(!loaded.is_gc_suppressed());
    }
}
