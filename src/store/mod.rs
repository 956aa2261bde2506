//! # Data Store
//!
//! [`DataStore`] owns one value tree: a root node plus every array, string,
//! table and by-reference scalar reachable from it, all living in a single
//! [`crate::heap`] slot arena.
//!
//! ## Usage
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
//!
//! assert_eq!(store.to_string(), r#"{"name":"Alice","tags":["a"]}"#);
//! ```
//!
//! ## Node Validity
//!
//! Nodes returned by the store are plain values. A by-reference node stays
//! valid as long as the data it refers to is reachable from the root: garbage
//! collection moves data but never changes handles. Overwriting or erasing
//! the slot a container lived in makes it unreachable, and the next
//! collection frees it. A node that no longer resolves fails every operation
//! instead of aliasing other data.
//!
//! ## Automatic Garbage Collection
//!
//! Every allocation first checks whether the heap has grown past
//! `growth_factor ×` its size after the last collection, and collects if so.
//! Collection is deferred while a [`SuppressGc`] guard is alive. Inserting a
//! freshly created value into a container always runs suppressed, since the
//! value is not reachable from the root until the insertion completes.
//!
//! ## Module Organization
//!
//! - [`builder`]: `DataStoreBuilder` for tuning GC and load policy
//! - `array`, `string`, `table`: container layouts and the table hash engine
//! - `values`: typed setters and readers
//! - `iter`: table iteration
//! - `gc`: copying collector, heap and handle table compaction
//! - `copy`: deep copy between stores

pub mod builder;
mod array;
mod copy;
mod gc;
mod iter;
mod string;
mod table;
mod values;

pub use builder::DataStoreBuilder;
pub use copy::ConflictPolicy;
pub use gc::SuppressGc;
pub use iter::TableIter;

pub(crate) use table::table_slots;

use eyre::{bail, ensure, Result};

use crate::config::{GC_GROWTH_FACTOR, GC_MARKER_BYTES, SLOT_BYTES};
use crate::heap::Heap;
use crate::node::{DataNode, Handle, NodeType};
use crate::strings::HString;

/// Runtime policy knobs, set through [`DataStoreBuilder`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct StorePolicy {
    pub(crate) gc_marker_bytes: u32,
    pub(crate) gc_growth_factor: u32,
    pub(crate) compact_handles_on_load: bool,
}

impl Default for StorePolicy {
    fn default() -> Self {
        Self {
            gc_marker_bytes: GC_MARKER_BYTES,
            gc_growth_factor: GC_GROWTH_FACTOR,
            compact_handles_on_load: true,
        }
    }
}

/// A dynamically typed value tree over a generational-handle heap.
///
/// Cloning a store deep-copies its heap. Nodes from the original resolve
/// against the clone to the same values.
#[derive(Clone, Debug)]
pub struct DataStore {
    pub(crate) heap: Heap,
    pub(crate) suppress_gc: u32,
    pub(crate) policy: StorePolicy,
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DataStore {
    /// An empty store with a Null root.
    pub fn new() -> Self {
        Self::with_policy(StorePolicy::default())
    }

    /// An empty store whose heap has room for `bytes` without reallocating.
    pub fn with_capacity(bytes: u32) -> Self {
        let mut store = Self::new();
        store.reserve(bytes);
        store
    }

    /// Returns a builder for tuning GC and load policy.
    pub fn builder() -> DataStoreBuilder {
        DataStoreBuilder::new()
    }

    pub(crate) fn with_policy(policy: StorePolicy) -> Self {
        Self {
            heap: Heap::new(policy.gc_marker_bytes),
            suppress_gc: 0,
            policy,
        }
    }

    /// Ensures the heap can hold at least `bytes` in total.
    pub fn reserve(&mut self, bytes: u32) {
        let slots = bytes.div_ceil(SLOT_BYTES) as usize;
        let additional = slots.saturating_sub(self.heap.data.len());
        self.heap.data.reserve(additional);
    }

    // ========================================================================
    // ROOT
    // ========================================================================

    /// The root value. Null until `make_array` or `make_table` is called.
    #[inline]
    pub fn root_node(&self) -> DataNode {
        self.heap.root()
    }

    /// Discards all data and makes the root an empty array.
    pub fn make_array(&mut self, initial_capacity: u32) -> Result<()> {
        self.heap.reset(self.policy.gc_marker_bytes);
        let node = self.make_array_node(initial_capacity)?;
        self.heap.set_root(node);
        Ok(())
    }

    /// Discards all data and makes the root an empty table. The capacity
    /// rounds up to a power of two.
    pub fn make_table(&mut self, initial_capacity: u32) -> Result<()> {
        self.heap.reset(self.policy.gc_marker_bytes);
        let node = self.make_table_node(initial_capacity)?;
        self.heap.set_root(node);
        Ok(())
    }

    /// Replaces the root with a new table holding the old root under `key`.
    pub fn move_root_into_new_root_table(
        &mut self,
        key: impl Into<HString>,
        initial_capacity: u32,
    ) -> Result<()> {
        let key = key.into();
        if self.heap.data.is_empty() {
            self.heap.reset(self.policy.gc_marker_bytes);
        }

        let mut store = self.suppress_gc();
        let old_root = store.root_node();
        let table = store.make_table_node(initial_capacity)?;
        store.heap.set_root(table);
        store.set_table_value(table, key, old_root)
    }

    /// Moves the value at `key_from` in `from` to `key_to` in `to`.
    ///
    /// Moving a key onto itself is a successful no-op.
    pub fn move_node_between_tables(
        &mut self,
        from: DataNode,
        key_from: impl Into<HString>,
        to: DataNode,
        key_to: impl Into<HString>,
    ) -> Result<()> {
        let (key_from, key_to) = (key_from.into(), key_to.into());
        let Some(node) = self.table_value(from, key_from) else {
            bail!("move_node_between_tables: key {:?} not found", key_from.as_str());
        };

        if key_from == key_to && from == to {
            return Ok(());
        }

        self.set_table_value(to, key_to, node)?;
        self.erase_value_from_table(from, key_from)
    }

    /// Makes the array or table at `array[index]` the new root.
    pub fn replace_root_with_array_element(&mut self, array: DataNode, index: u32) -> Result<()> {
        match self.array_value(array, index) {
            Some(v) if v.is_array() || v.is_table() => {
                self.heap.set_root(v);
                Ok(())
            }
            _ => bail!("array element {} is not a container", index),
        }
    }

    /// Makes the array or table at `table[key]` the new root.
    pub fn replace_root_with_table_element(
        &mut self,
        table: DataNode,
        key: impl Into<HString>,
    ) -> Result<()> {
        let key = key.into();
        match self.table_value(table, key) {
            Some(v) if v.is_array() || v.is_table() => {
                self.heap.set_root(v);
                Ok(())
            }
            _ => bail!("table element {:?} is not a container", key.as_str()),
        }
    }

    // ========================================================================
    // MEMORY
    // ========================================================================

    /// Bytes reserved by the heap.
    pub fn heap_capacity_bytes(&self) -> usize {
        self.heap.capacity_bytes()
    }

    /// Bytes of the heap in use, garbage included.
    pub fn in_use_heap_size_bytes(&self) -> usize {
        self.heap.data_bytes() as usize
    }

    /// Heap plus handle table allocation.
    pub fn total_memory_usage_bytes(&self) -> usize {
        self.heap.total_memory_bytes()
    }

    // ========================================================================
    // ALLOCATION
    // ========================================================================

    fn gc_due(&self) -> bool {
        (self.heap.size_after_last_gc as u64) * (self.policy.gc_growth_factor as u64)
            <= self.heap.data_bytes() as u64
    }

    /// Appends `slots` zeroed slots without binding a handle.
    pub(crate) fn allocate_raw(&mut self, slots: u32) -> Result<u32> {
        if self.gc_due() {
            self.collect_garbage_inner(false);
        }
        self.heap.append_raw(slots)
    }

    /// Appends `slots` zeroed slots and binds a new handle to them.
    pub(crate) fn allocate(&mut self, slots: u32) -> Result<Handle> {
        if self.heap.handles_saturated() {
            self.collect_garbage_inner(false);
        }
        let offset = self.allocate_raw(slots)?;
        self.heap.bind_handle(offset)
    }

    /// Grows the region of `handle` from `old_slots` to `new_slots`.
    pub(crate) fn reallocate(&mut self, handle: Handle, old_slots: u32, new_slots: u32) -> Result<u32> {
        if self.gc_due() {
            self.collect_garbage_inner(false);
        }
        self.heap.grow_region(handle, old_slots, new_slots)
    }

    /// Allocates a by-reference scalar holding `words`.
    pub(crate) fn make_scalar_node(&mut self, node_type: NodeType, words: &[u32]) -> Result<DataNode> {
        debug_assert_eq!(node_type.scalar_slots(), Some(words.len() as u32));
        let handle = self.allocate(words.len() as u32)?;
        let Some(offset) = self.heap.resolve(handle) else {
            bail!("freshly allocated handle {:?} does not resolve", handle);
        };
        let o = offset as usize;
        self.heap.data[o..o + words.len()].copy_from_slice(words);
        Ok(DataNode::by_reference(node_type, handle))
    }

    /// Slot offset of a by-reference node's data, if `slots` slots are in
    /// bounds there.
    #[inline]
    pub(crate) fn data_offset(&self, node: DataNode, slots: u32) -> Option<u32> {
        let offset = self.heap.resolve(node.handle())?;
        ((offset as usize + slots as usize) <= self.heap.data.len()).then_some(offset)
    }

    pub(crate) fn ensure_kind(node: DataNode, kind: NodeType, op: &str) -> Result<()> {
        ensure!(
            node.node_type() == kind,
            "{}: expected {:?}, found {:?}",
            op,
            kind,
            node.node_type()
        );
        Ok(())
    }
}
