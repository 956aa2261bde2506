//! # Garbage Collection
//!
//! A copying collector over the single-rooted value graph. Collection walks
//! the graph depth-first from the root and copies every reachable container
//! and by-reference scalar into a fresh heap, in visit order. The handle
//! table keeps its length and every handle keeps its index and generation,
//! so nodes held by callers stay valid; only offsets change.
//!
//! ```text
//! old heap  [root][A....][garbage][B..][garbage....][C.]
//!              |
//!              v  visit root, then A's children, ...
//! new heap  [root][A....][B..][C.]
//! ```
//!
//! ## Container Compaction
//!
//! With `compact_containers`, arrays shrink to `capacity == count` and
//! tables to `next_pow2(count + 1)` buckets, keeping the hidden null slot
//! only when the empty-string key is set. Tables whose capacity changes are
//! rebuilt in two passes: first every key whose home bucket is free takes
//! it, then the rest probe linearly from home. Tables whose capacity does
//! not change are copied as-is, so compacting twice produces identical
//! buffers.
//!
//! Compaction shrinks containers in place, so later insertions pay for
//! regrowth. It is meant for snapshot copies about to be saved.
//!
//! ## Suppression
//!
//! [`SuppressGc`] defers automatic and explicit collection while alive.
//! Guards nest; collection resumes once the last one drops.

use std::ops::{Deref, DerefMut};

use super::table::{table_slots, Buckets};
use super::DataStore;
use crate::config::{CONTAINER_HEADER_SLOTS, DEFAULT_HANDLE_GENERATION};
use crate::heap::{next_pow2, Container, HandleDataOffset, Heap};
use crate::node::{DataNode, Handle, NodeType};

/// RAII guard that defers garbage collection on a store.
///
/// Dereferences to the store, so the guarded store is used through the
/// guard:
///
/// ```ignore
/// let mut store = store.suppress_gc();
/// let node = store.make_table_node(0)?;
/// store.set_table_value(root, key, node)?;
/// ```
pub struct SuppressGc<'a> {
    store: &'a mut DataStore,
}

impl Drop for SuppressGc<'_> {
    fn drop(&mut self) {
        debug_assert!(self.store.suppress_gc > 0);
        self.store.suppress_gc -= 1;
    }
}

impl Deref for SuppressGc<'_> {
    type Target = DataStore;

    fn deref(&self) -> &DataStore {
        self.store
    }
}

impl DerefMut for SuppressGc<'_> {
    fn deref_mut(&mut self) -> &mut DataStore {
        self.store
    }
}

impl DataStore {
    /// Defers garbage collection until the returned guard drops.
    pub fn suppress_gc(&mut self) -> SuppressGc<'_> {
        self.suppress_gc += 1;
        SuppressGc { store: self }
    }

    /// True while any [`SuppressGc`] guard is alive.
    pub fn is_gc_suppressed(&self) -> bool {
        self.suppress_gc > 0
    }

    /// Frees everything unreachable from the root. With
    /// `compact_containers`, also shrinks every array and table to its
    /// minimal size. Does nothing while collection is suppressed.
    pub fn collect_garbage(&mut self, compact_containers: bool) {
        self.collect_garbage_inner(compact_containers);
    }

    /// [`collect_garbage`](Self::collect_garbage) followed by
    /// [`compact_heap`](Self::compact_heap).
    pub fn collect_garbage_and_compact_heap(&mut self, compact_containers: bool) {
        self.collect_garbage_inner(compact_containers);
        self.compact_heap();
    }

    /// Releases unused heap and handle table capacity and drops trailing free
    /// handle table entries.
    pub fn compact_heap(&mut self) {
        while self.heap.handles.last().is_some_and(|e| !e.is_bound()) {
            self.heap.handles.pop();
        }
        self.heap.handles.shrink_to_fit();
        self.heap.data.shrink_to_fit();
    }

    pub(crate) fn collect_garbage_inner(&mut self, compact_containers: bool) {
        if self.suppress_gc > 0 {
            return;
        }

        let marker = self.policy.gc_marker_bytes;
        if self.heap.data.is_empty() {
            self.heap.size_after_last_gc = self.heap.data_bytes().max(marker);
            return;
        }

        let before = self.heap.data_bytes();
        let root = self.heap.root();
        let mut copier = Copier::new(&self.heap, compact_containers);
        copier.copy(root);
        let Copier { data, handles, .. } = copier;

        self.heap.data = data;
        self.heap.handles = handles;
        self.heap.recount_allocated_handles();
        self.heap.size_after_last_gc = self.heap.data_bytes().max(marker);

        tracing::debug!(
            before_bytes = before,
            after_bytes = self.heap.data_bytes(),
            live_handles = self.heap.allocated_handles,
            compact_containers,
            "collected garbage"
        );
    }

    /// Rebuilds the handle table densely: live entries keep their relative
    /// order, every generation resets to the default, and every handle in
    /// the graph is rewritten.
    ///
    /// Nodes held outside the store stop resolving. Only the root (read
    /// again through [`root_node`](Self::root_node)) stays usable.
    pub fn compact_handle_offsets(&mut self) {
        let old_len = self.heap.handles.len();
        let mut remap: Vec<Option<u32>> = vec![None; old_len];
        let mut handles = Vec::with_capacity(self.heap.allocated_handles as usize);
        for (i, entry) in self.heap.handles.iter().enumerate() {
            if entry.is_bound() {
                remap[i] = Some(handles.len() as u32);
                handles.push(HandleDataOffset::new(entry.offset(), DEFAULT_HANDLE_GENERATION));
            }
        }

        let mut visited = vec![false; old_len];
        let root = self.heap.root();
        let new_root = self.remap_handles(root, &remap, &mut visited);
        self.heap.set_root(new_root);

        let len = handles.len() as u32;
        self.heap.handles = handles;
        self.heap.next_handle = len;
        self.heap.allocated_handles = len;

        tracing::debug!(old_len, new_len = len, "compacted handle table");
    }

    /// Rewrites the children of `node` against `remap` and returns `node`
    /// with its own handle rewritten. Resolution uses the old table.
    fn remap_handles(&mut self, node: DataNode, remap: &[Option<u32>], visited: &mut [bool]) -> DataNode {
        if !node.is_by_reference() {
            return node;
        }
        let index = node.handle().index() as usize;
        let Some(Some(new_index)) = remap.get(index).copied() else {
            return node;
        };
        let remapped = node.with_handle(Handle::new(new_index, DEFAULT_HANDLE_GENERATION));
        if visited[index] {
            return remapped;
        }
        visited[index] = true;

        let children: Vec<u32> = match node.node_type() {
            NodeType::Array => match self.array_header(node) {
                Some((offset, header)) => {
                    let start = offset + CONTAINER_HEADER_SLOTS;
                    (start..start + header.count()).collect()
                }
                None => Vec::new(),
            },
            NodeType::Table => match self.table_buckets(node) {
                Some((offset, buckets)) => {
                    let values = offset + CONTAINER_HEADER_SLOTS;
                    let mut slots: Vec<u32> = (0..buckets.capacity())
                        .filter(|&i| !buckets.key(i).is_empty())
                        .map(|i| values + i)
                        .collect();
                    if buckets.null_value().is_some() {
                        slots.push(values + buckets.capacity());
                    }
                    slots
                }
                None => Vec::new(),
            },
            _ => Vec::new(),
        };

        for slot in children {
            if let Some(raw) = self.heap.slot(slot) {
                let child = self.remap_handles(DataNode::from_raw(raw), remap, visited);
                self.heap.set_slot(slot, child.raw());
            }
        }
        remapped
    }
}

/// Copies the live graph of one heap into fresh buffers.
struct Copier<'a> {
    old: &'a Heap,
    data: Vec<u32>,
    handles: Vec<HandleDataOffset>,
    compact: bool,
}

impl<'a> Copier<'a> {
    fn new(old: &'a Heap, compact: bool) -> Self {
        let mut data = Vec::with_capacity(old.data.len());
        data.push(old.root().raw());
        let handles = old
            .handles
            .iter()
            .map(|e| {
                let mut e = *e;
                e.release();
                e
            })
            .collect();
        Copier { old, data, handles, compact }
    }

    /// Source offset of `node` if it still needs copying and its first
    /// `min_slots` slots are in bounds.
    fn source(&self, node: DataNode, min_slots: u32) -> Option<u32> {
        let index = node.handle().index() as usize;
        if self.handles.get(index)?.is_bound() {
            return None;
        }
        let offset = self.old.resolve(node.handle())?;
        (offset as usize + min_slots as usize <= self.old.data.len()).then_some(offset)
    }

    fn bind(&mut self, node: DataNode, offset: u32) {
        let handle = node.handle();
        self.handles[handle.index() as usize] = HandleDataOffset::new(offset, handle.generation());
    }

    fn append(&mut self, from: u32, slots: u32) -> u32 {
        let offset = self.data.len() as u32;
        let (from, to) = (from as usize, from as usize + slots as usize);
        self.data.extend_from_slice(&self.old.data[from..to]);
        offset
    }

    fn copy(&mut self, node: DataNode) {
        match node.node_type() {
            NodeType::Array => self.copy_array(node),
            NodeType::Table => self.copy_table(node),
            NodeType::String => self.copy_string(node),
            t => {
                if let Some(slots) = t.scalar_slots() {
                    if let Some(from) = self.source(node, slots) {
                        let to = self.append(from, slots);
                        self.bind(node, to);
                    }
                }
            }
        }
    }

    fn copy_string(&mut self, node: DataNode) {
        let Some(from) = self.source(node, CONTAINER_HEADER_SLOTS) else {
            return;
        };
        let Some(header) = Container::read(&self.old.data, from) else {
            return;
        };
        let slots = CONTAINER_HEADER_SLOTS + header.capacity();
        if from as usize + slots as usize > self.old.data.len() {
            return;
        }
        let to = self.append(from, slots);
        self.bind(node, to);
    }

    fn copy_array(&mut self, node: DataNode) {
        let Some(from) = self.source(node, CONTAINER_HEADER_SLOTS) else {
            return;
        };
        let Some(header) = Container::read(&self.old.data, from) else {
            return;
        };
        let (count, capacity) = (header.count(), header.capacity());
        if count > capacity || from as usize + (CONTAINER_HEADER_SLOTS + capacity) as usize > self.old.data.len() {
            return;
        }

        let to = if self.compact {
            let to = self.append(from, CONTAINER_HEADER_SLOTS + count);
            Container::new(count, count).write(&mut self.data, to);
            to
        } else {
            self.append(from, CONTAINER_HEADER_SLOTS + capacity)
        };
        self.bind(node, to);

        let values = from + CONTAINER_HEADER_SLOTS;
        for i in 0..count {
            self.copy(DataNode::from_raw(self.old.data[(values + i) as usize]));
        }
    }

    fn copy_table(&mut self, node: DataNode) {
        let Some(from) = self.source(node, CONTAINER_HEADER_SLOTS) else {
            return;
        };
        let heap = self.old;
        let Some(old) = Buckets::new(&heap.data[from as usize..]) else {
            return;
        };
        let header = old.header();
        let capacity = header.capacity();
        if header.count() > capacity {
            return;
        }
        let Ok(old_slots) = u32::try_from(table_slots(header.total_capacity())) else {
            return;
        };
        let null_value = old.null_value();
        let live = (0..capacity).filter(|&i| !old.key(i).is_empty()).count() as u32;
        let new_capacity = next_pow2(live + 1);

        let to = if self.compact && new_capacity != capacity {
            let to = self.data.len() as u32;
            let total = new_capacity + null_value.is_some() as u32;
            self.data.resize((to as u64 + table_slots(total)) as usize, 0);

            let mut fresh = Container::new(new_capacity, live);
            fresh.set_has_null_storage(null_value.is_some());
            fresh.write(&mut self.data, to);

            if let Some(mut rebuilt) = Buckets::new(&mut self.data[to as usize..]) {
                for i in 0..capacity {
                    let key = old.key(i);
                    if !key.is_empty() {
                        let home = rebuilt.home(key);
                        if rebuilt.key(home).is_empty() {
                            rebuilt.seat(home, key, old.value(i));
                        }
                    }
                }
                for i in 0..capacity {
                    let key = old.key(i);
                    if key.is_empty() {
                        continue;
                    }
                    let home = rebuilt.home(key);
                    if rebuilt.key(home) == key {
                        continue;
                    }
                    if let Some(j) = rebuilt.first_empty_from(home) {
                        rebuilt.seat(j, key, old.value(i));
                    }
                }
                if let Some(v) = null_value {
                    rebuilt.set_null_value(v);
                }
            }
            to
        } else {
            self.append(from, old_slots)
        };
        self.bind(node, to);

        for i in 0..capacity {
            if !old.key(i).is_empty() {
                self.copy(old.value(i));
            }
        }
        if let Some(v) = null_value {
            self.copy(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::fixtures::{corrupted, Corruption};

    fn populated() -> DataStore {
        let mut store = DataStore::new();
        store.make_table(0).unwrap();
        let root = store.root_node();
        for i in 0..10 {
            store.set_int64_to_table(root, format!("n{i}"), 1 << 40 | i).unwrap();
        }
        store.set_array_to_table(root, "list", 16).unwrap();
        let list = store.table_value(root, "list").unwrap();
        for i in 0..3 {
            store.set_string_to_array(list, i, "entry").unwrap();
        }
        store.set_float32_to_table(root, "", 0.25).unwrap();
        store
    }

    #[test]
    fn collection_drops_unreachable_data() {
        let mut store = populated();
        let root = store.root_node();
        for i in 0..10 {
            store.set_string_to_table(root, "churn", &format!("value {i}")).unwrap();
        }
        let before = store.in_use_heap_size_bytes();
        store.collect_garbage(false);
        assert!(store.in_use_heap_size_bytes() < before);

        assert_eq!(store.as_string(store.table_value(root, "churn").unwrap()), Some("value 9"));
        assert_eq!(store.as_int64(store.table_value(root, "n3").unwrap()), Some(1 << 40 | 3));
        assert_eq!(store.as_float32(store.table_value(root, "").unwrap()), Some(0.25));
    }

    #[test]
    fn held_nodes_survive_collection() {
        let mut store = populated();
        let root = store.root_node();
        let list = store.table_value(root, "list").unwrap();
        store.collect_garbage(false);
        assert_eq!(store.array_count(list), Some(3));
        assert_eq!(store.as_string(store.array_value(list, 2).unwrap()), Some("entry"));
    }

    #[test]
    fn unreachable_nodes_stop_resolving() {
        let mut store = populated();
        let root = store.root_node();
        let list = store.table_value(root, "list").unwrap();
        store.erase_value_from_table(root, "list").unwrap();
        store.collect_garbage(false);
        assert_eq!(store.array_count(list), None);
    }

    #[test]
    fn compaction_shrinks_and_is_idempotent() {
        let mut store = populated();
        let root = store.root_node();
        store.collect_garbage(true);

        let list = store.table_value(root, "list").unwrap();
        assert_eq!(store.array_capacity(list), Some(3));
        assert_eq!(store.table_capacity(root), Some(16));
        assert_eq!(store.table_count(root), Some(12));
        for i in 0..10 {
            assert_eq!(store.as_int64(store.table_value(root, format!("n{i}")).unwrap()), Some(1 << 40 | i));
        }

        let (data, handles) = (store.heap.data.clone(), store.heap.handles.clone());
        store.collect_garbage(true);
        assert_eq!(store.heap.data, data);
        assert_eq!(store.heap.handles, handles);
    }

    #[test]
    fn corrupted_table_headers_are_skipped() {
        let kinds = [
            Corruption::TableCapacity,
            Corruption::TableCount,
            Corruption::TableBucketOverflow,
            Corruption::TableCountOverflow,
        ];
        for kind in kinds {
            for compact in [false, true] {
                let mut store = corrupted(kind);
                let root = store.root_node();
                let table = store.table_value(root, "table").unwrap();
                if kind == Corruption::TableBucketOverflow {
                    assert!(store.table_value(table, "a").is_none());
                }

                store.collect_garbage(compact);
                assert!(store.in_use_heap_size_bytes() < 1 << 20, "{:?} compact={}", kind, compact);
                let text = store.table_value(root, "string").unwrap();
                assert_eq!(store.as_string(text), Some("integrity sample"));
            }
        }
    }

    #[test]
    fn suppression_nests() {
        let mut store = populated();
        let before = store.in_use_heap_size_bytes();
        {
            let mut outer = store.suppress_gc();
            {
                let mut inner = outer.suppress_gc();
                inner.collect_garbage(false);
                assert!(inner.is_gc_suppressed());
            }
            outer.collect_garbage(false);
            assert_eq!(outer.in_use_heap_size_bytes(), before);
        }
        assert!(!store.is_gc_suppressed());
    }

    #[test]
    fn compact_handle_offsets_renumbers_densely() {
        let mut store = populated();
        let root = store.root_node();
        store.erase_value_from_table(root, "n0").unwrap();
        store.collect_garbage(false);
        store.compact_handle_offsets();

        let root = store.root_node();
        assert_eq!(store.heap.handles.len() as u32, store.heap.allocated_handles);
        assert!(store.heap.handles.iter().all(|e| e.generation() == DEFAULT_HANDLE_GENERATION));
        let list = store.table_value(root, "list").unwrap();
        assert_eq!(store.as_string(store.array_value(list, 0).unwrap()), Some("entry"));
        assert_eq!(store.as_int64(store.table_value(root, "n9").unwrap()), Some(1 << 40 | 9));
    }

    #[test]
    fn compact_heap_trims_free_tail() {
        let mut store = populated();
        let root = store.root_node();
        store.set_string_to_table(root, "tail", "x").unwrap();
        store.erase_value_from_table(root, "tail").unwrap();
        store.collect_garbage_and_compact_heap(false);
        assert!(store.heap.handles.last().is_some_and(|e| e.is_bound()));
        assert!(store.table_value(root, "tail").is_none());
    }
}
