//! Table iteration in bucket order.

use std::iter::FusedIterator;

use super::DataStore;
use crate::config::CONTAINER_HEADER_SLOTS;
use crate::node::DataNode;
use crate::strings::HString;

/// Iterator over the `(key, value)` pairs of a table.
///
/// Visits buckets `0..capacity` in order, skipping empty ones, then the
/// empty-string key if it is set. The order is bucket order, not insertion
/// order. Iterating something that is not a valid table yields nothing.
pub struct TableIter<'a> {
    store: &'a DataStore,
    values: usize,
    keys: usize,
    capacity: u32,
    null_value: Option<DataNode>,
    next: u32,
}

impl<'a> Iterator for TableIter<'a> {
    type Item = (HString, DataNode);

    fn next(&mut self) -> Option<Self::Item> {
        let data = &self.store.heap.data;
        while self.next < self.capacity {
            let i = self.next as usize;
            self.next += 1;
            let key = HString::from_raw(data[self.keys + i]);
            if !key.is_empty() {
                return Some((key, DataNode::from_raw(data[self.values + i])));
            }
        }
        self.null_value.take().map(|v| (HString::EMPTY, v))
    }
}

impl FusedIterator for TableIter<'_> {}

impl DataStore {
    /// Iterates the pairs of `table`.
    pub fn table_iter(&self, table: DataNode) -> TableIter<'_> {
        let mut iter = TableIter {
            store: self,
            values: 0,
            keys: 0,
            capacity: 0,
            null_value: None,
            next: 0,
        };
        if let Some((offset, buckets)) = self.table_buckets(table) {
            let header = buckets.header();
            iter.values = (offset + CONTAINER_HEADER_SLOTS) as usize;
            iter.keys = iter.values + header.total_capacity() as usize;
            iter.capacity = header.capacity();
            iter.null_value = buckets.null_value();
        }
        iter
    }

    /// Keys of `table`, sorted by their text.
    pub fn sorted_table_keys(&self, table: DataNode) -> Vec<HString> {
        let mut keys: Vec<HString> = self.table_iter(table).map(|(k, _)| k).collect();
        keys.sort_unstable_by(|a, b| a.as_str().cmp(b.as_str()));
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn visits_every_key_once() {
        let mut store = DataStore::new();
        store.make_table(0).unwrap();
        let root = store.root_node();
        for i in 0..30 {
            store.set_int32_to_table(root, format!("it{i}"), i).unwrap();
        }
        store.set_boolean_to_table(root, "", true).unwrap();

        let seen: Vec<_> = store.table_iter(root).collect();
        assert_eq!(seen.len(), 31);
        let unique: HashSet<_> = seen.iter().map(|(k, _)| *k).collect();
        assert_eq!(unique.len(), 31);
        assert_eq!(seen.last().map(|(k, _)| k.is_empty()), Some(true));
    }

    #[test]
    fn non_table_yields_nothing() {
        let mut store = DataStore::new();
        store.make_array(0).unwrap();
        assert_eq!(store.table_iter(store.root_node()).count(), 0);
    }

    #[test]
    fn sorted_keys_are_byte_ordered() {
        let mut store = DataStore::new();
        store.make_table(0).unwrap();
        let root = store.root_node();
        for k in ["b", "a", "C", "c"] {
            store.set_null_to_table(root, k).unwrap();
        }
        let keys: Vec<_> = store.sorted_table_keys(root).iter().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["C", "a", "b", "c"]);
    }
}
