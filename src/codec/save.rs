//! Writing a store to a stream.

use eyre::{ensure, Result};

use super::header::FileFormat;
use super::remap::{remap_graph, SaveRemap};
use super::stream::{write_buffer, write_u32, SyncStream};
use crate::path::Platform;
use crate::store::DataStore;

impl DataStore {
    /// Writes this store to `stream` in the current binary format.
    ///
    /// Works on a private copy, so the live store and every node held by
    /// callers are untouched. With `compact`, the copy is collected, its
    /// containers shrunk and its handle table densified before writing.
    /// FilePath names are written with `platform`'s directory separator.
    ///
    /// # Errors
    ///
    /// Fails if the stream is not writable, a write comes up short, or a
    /// string reference does not fit the FilePath name field.
    pub fn save<S: SyncStream + ?Sized>(&self, stream: &mut S, platform: Platform, compact: bool) -> Result<()> {
        self.save_as(stream, platform, compact, FileFormat::Current)
    }

    pub(crate) fn save_as<S: SyncStream + ?Sized>(
        &self,
        stream: &mut S,
        platform: Platform,
        compact: bool,
        format: FileFormat,
    ) -> Result<()> {
        ensure!(stream.can_write(), "save: stream is not writable");
        let start = stream.position();

        let mut copy = self.clone();
        copy.suppress_gc = 0;
        if compact {
            copy.collect_garbage_and_compact_heap(true);
            copy.compact_handle_offsets();
        }

        let (file_names, keys) = if copy.heap.data.is_empty() {
            (Vec::new(), Vec::new())
        } else {
            let mut remap = SaveRemap::new(platform, format.ordinal_strings());
            let stopped = remap_graph(&mut copy.heap, &mut remap);
            ensure!(stopped == 0, "save: {} subtrees could not be remapped", stopped);
            (remap.file_names.bytes().to_vec(), remap.keys.bytes().to_vec())
        };

        format.write(stream)?;
        write_buffer(stream, &file_names, "file name table")?;
        write_buffer(stream, &keys, "key table")?;
        write_buffer(stream, &copy.heap.handles, "handle table")?;
        write_buffer(stream, &copy.heap.data, "heap")?;

        write_u32(stream, copy.heap.size_after_last_gc, "size after last gc")?;
        write_u32(stream, copy.heap.next_handle, "next handle")?;
        write_u32(stream, copy.heap.allocated_handles, "allocated handles")?;
        write_u32(stream, copy.suppress_gc, "gc suppression count")?;

        tracing::debug!(
            bytes = stream.position().saturating_sub(start),
            heap_slots = copy.heap.data.len(),
            handles = copy.heap.handles.len(),
            compact,
            ?platform,
            "saved data store"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn save_leaves_live_store_untouched() {
        let mut store = DataStore::new();
        store.make_table(0).unwrap();
        let root = store.root_node();
        store.set_string_to_table(root, "k", "v").unwrap();
        store.set_string_to_table(root, "k", "w").unwrap();
        let before = store.heap.data.clone();

        let mut out = Cursor::new(Vec::new());
        store.save(&mut out, Platform::current(), true).unwrap();
        assert_eq!(store.heap.data, before);
        assert_eq!(store.table_value(root, "k").and_then(|v| store.as_string(v)), Some("w"));
    }

    #[test]
    fn empty_store_writes_empty_tables() {
        let store = DataStore::new();
        let mut out = Cursor::new(Vec::new());
        store.save(&mut out, Platform::current(), false).unwrap();
        // header + four empty buffers + four scalars
        assert_eq!(out.into_inner().len(), 12 + 4 * 4 + 4 * 4);
    }

    #[test]
    fn read_only_stream_is_rejected() {
        let store = DataStore::new();
        let bytes: &[u8] = &[];
        let mut input = Cursor::new(bytes);
        assert!(store.save(&mut input, Platform::current(), false).is_err());
    }
}
