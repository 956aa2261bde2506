//! Array containers: a header followed by `capacity` node slots.
//!
//! Slots past `count` are always Null, so growing within capacity never
//! exposes stale values.

use eyre::{bail, ensure, eyre, Result};

use super::DataStore;
use crate::config::{BIG_ARRAY_LIMIT, CONTAINER_HEADER_SLOTS};
use crate::heap::{next_pow2, Container};
use crate::node::{DataNode, NodeType};
use crate::strings::HString;

impl DataStore {
    /// Allocates an empty array with room for `initial_capacity` elements.
    pub(crate) fn make_array_node(&mut self, initial_capacity: u32) -> Result<DataNode> {
        ensure!(
            initial_capacity < BIG_ARRAY_LIMIT,
            "array capacity {} exceeds limit {}",
            initial_capacity,
            BIG_ARRAY_LIMIT
        );
        let handle = self.allocate(CONTAINER_HEADER_SLOTS + initial_capacity)?;
        let offset = self
            .heap
            .resolve(handle)
            .ok_or_else(|| eyre!("freshly allocated array handle {:?} does not resolve", handle))?;
        Container::new(initial_capacity, 0).write(&mut self.heap.data, offset);
        Ok(DataNode::by_reference(NodeType::Array, handle))
    }

    /// Offset and header of an array whose element slots are all in bounds.
    pub(crate) fn array_header(&self, array: DataNode) -> Option<(u32, Container)> {
        if !array.is_array() {
            return None;
        }
        let (offset, header) = self.heap.container(array)?;
        let end = offset as usize + (CONTAINER_HEADER_SLOTS + header.capacity()) as usize;
        (end <= self.heap.data.len() && header.count() <= header.capacity()).then_some((offset, header))
    }

    pub fn array_count(&self, array: DataNode) -> Option<u32> {
        self.array_header(array).map(|(_, h)| h.count())
    }

    pub fn array_capacity(&self, array: DataNode) -> Option<u32> {
        self.array_header(array).map(|(_, h)| h.capacity())
    }

    /// Element at `index`, if `index < count`.
    pub fn array_value(&self, array: DataNode, index: u32) -> Option<DataNode> {
        let (offset, header) = self.array_header(array)?;
        if index >= header.count() {
            return None;
        }
        self.heap
            .slot(offset + CONTAINER_HEADER_SLOTS + index)
            .map(DataNode::from_raw)
    }

    /// Sets the element count to `new_count`, growing capacity to the next
    /// power of two (header included) when needed. New elements are Null.
    pub fn resize_array(&mut self, array: DataNode, new_count: u32) -> Result<()> {
        ensure!(
            new_count < BIG_ARRAY_LIMIT,
            "array size {} exceeds limit {}",
            new_count,
            BIG_ARRAY_LIMIT
        );
        let Some((mut offset, mut header)) = self.array_header(array) else {
            bail!("resize_array: {:?} is not a valid array", array);
        };

        let count = header.count();
        let capacity = header.capacity();
        if new_count > capacity {
            let new_total = next_pow2(new_count + CONTAINER_HEADER_SLOTS);
            offset = self.reallocate(array.handle(), CONTAINER_HEADER_SLOTS + capacity, new_total)?;
            header.set_capacity(new_total - CONTAINER_HEADER_SLOTS);
        } else if new_count < count {
            let values = (offset + CONTAINER_HEADER_SLOTS) as usize;
            self.heap.data[values + new_count as usize..values + count as usize].fill(DataNode::NULL.raw());
        }

        header.set_count(new_count);
        header.write(&mut self.heap.data, offset);
        Ok(())
    }

    /// Removes the element at `index`, shifting later elements down.
    pub fn erase_value_from_array(&mut self, array: DataNode, index: u32) -> Result<()> {
        let Some((offset, mut header)) = self.array_header(array) else {
            bail!("erase_value_from_array: {:?} is not a valid array", array);
        };
        let count = header.count();
        ensure!(index < count, "erase_value_from_array: index {} out of range {}", index, count);

        let values = (offset + CONTAINER_HEADER_SLOTS) as usize;
        let (at, end) = (values + index as usize, values + count as usize);
        self.heap.data.copy_within(at + 1..end, at);
        self.heap.data[end - 1] = DataNode::NULL.raw();

        header.set_count(count - 1);
        header.write(&mut self.heap.data, offset);
        Ok(())
    }

    /// True if any String element of `array` equals `identifier`.
    pub fn array_contains(&self, array: DataNode, identifier: impl Into<HString>) -> bool {
        let identifier = identifier.into();
        let Some(count) = self.array_count(array) else {
            return false;
        };
        (0..count)
            .filter_map(|i| self.array_value(array, i))
            .filter(|v| v.is_string())
            .any(|v| self.as_string(v) == Some(identifier.as_str()))
    }

    /// Writes `array[index]`, growing the array when `index >= count`. Runs
    /// with GC suppressed, since `value` may not be reachable yet.
    pub(crate) fn set_array_value(&mut self, array: DataNode, index: u32, value: DataNode) -> Result<()> {
        Self::ensure_kind(array, NodeType::Array, "set_array_value")?;
        let mut store = self.suppress_gc();

        let Some((_, header)) = store.array_header(array) else {
            bail!("set_array_value: {:?} is not a valid array", array);
        };
        if index >= header.count() {
            store.resize_array(array, index + 1)?;
        }

        let Some((offset, _)) = store.array_header(array) else {
            bail!("set_array_value: {:?} lost during resize", array);
        };
        store.heap.set_slot(offset + CONTAINER_HEADER_SLOTS + index, value.raw());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn array_store() -> (DataStore, DataNode) {
        let mut store = DataStore::new();
        store.make_array(0).unwrap();
        let root = store.root_node();
        (store, root)
    }

    #[test]
    fn set_past_end_grows_to_power_of_two() {
        let (mut store, root) = array_store();
        store.set_array_value(root, 4, DataNode::boolean(true)).unwrap();

        assert_eq!(store.array_count(root), Some(5));
        assert_eq!(store.array_capacity(root), Some(6));
        assert_eq!(store.array_value(root, 0), Some(DataNode::NULL));
        assert_eq!(store.array_value(root, 4), Some(DataNode::boolean(true)));
        assert_eq!(store.array_value(root, 5), None);
    }

    #[test]
    fn shrink_then_grow_yields_null() {
        let (mut store, root) = array_store();
        for i in 0..4 {
            store.set_array_value(root, i, DataNode::int32_small(i as i32 + 1)).unwrap();
        }
        store.resize_array(root, 1).unwrap();
        store.resize_array(root, 4).unwrap();
        assert_eq!(store.array_value(root, 0), Some(DataNode::int32_small(1)));
        for i in 1..4 {
            assert_eq!(store.array_value(root, i), Some(DataNode::NULL));
        }
    }

    #[test]
    fn resize_rejects_big_arrays() {
        let (mut store, root) = array_store();
        assert!(store.resize_array(root, BIG_ARRAY_LIMIT).is_err());
        assert!(store.set_array_value(root, BIG_ARRAY_LIMIT, DataNode::NULL).is_err());
        assert_eq!(store.array_count(root), Some(0));
    }

    #[test]
    fn erase_shifts_tail() {
        let (mut store, root) = array_store();
        for i in 0..4 {
            store.set_array_value(root, i, DataNode::int32_small(i as i32)).unwrap();
        }
        store.erase_value_from_array(root, 1).unwrap();
        assert_eq!(store.array_count(root), Some(3));
        let vals: Vec<_> = (0..3).map(|i| store.array_value(root, i).unwrap()).collect();
        assert_eq!(
            vals,
            vec![DataNode::int32_small(0), DataNode::int32_small(2), DataNode::int32_small(3)]
        );
        assert!(store.erase_value_from_array(root, 3).is_err());
    }

    #[test]
    fn contains_matches_string_elements_only() {
        let (mut store, root) = array_store();
        store.set_string_to_array(root, 0, "alpha").unwrap();
        store.set_int32_to_array(root, 1, 3).unwrap();
        assert!(store.array_contains(root, "alpha"));
        assert!(!store.array_contains(root, "beta"));
    }

    #[test]
    fn array_ops_reject_tables() {
        let mut store = DataStore::new();
        store.make_table(0).unwrap();
        let root = store.root_node();
        assert_eq!(store.array_count(root), None);
        assert!(store.resize_array(root, 2).is_err());
        assert!(store.set_array_value(root, 0, DataNode::NULL).is_err());
    }
}
