//! Test-only stores: a well-formed sample, deliberately corrupted copies of
//! it, and byte-for-byte comparison.

use crate::heap::Container;
use crate::node::{DataNode, Handle};
use crate::store::DataStore;
use crate::strings::HString;

/// One way of breaking the sample store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Corruption {
    ArrayCapacity,
    ArrayCount,
    ArrayHandle,
    ArrayOffset,
    StringCapacity,
    StringCount,
    StringHandle,
    StringOffset,
    TableCapacity,
    TableCount,
    TableHandle,
    TableOffset,
    TableBucketOverflow,
    TableCountOverflow,
    BadTypeTag,
}

impl Corruption {
    pub(crate) const ALL: [Corruption; 15] = [
        Corruption::ArrayCapacity,
        Corruption::ArrayCount,
        Corruption::ArrayHandle,
        Corruption::ArrayOffset,
        Corruption::StringCapacity,
        Corruption::StringCount,
        Corruption::StringHandle,
        Corruption::StringOffset,
        Corruption::TableCapacity,
        Corruption::TableCount,
        Corruption::TableHandle,
        Corruption::TableOffset,
        Corruption::TableBucketOverflow,
        Corruption::TableCountOverflow,
        Corruption::BadTypeTag,
    ];
}

/// `{"array":[1,2,3],"string":"...","table":{"a":1,"b":5000000000},"":null}`
pub(crate) fn sample_store() -> DataStore {
    let mut store = DataStore::new();
    store.make_table(0).unwrap();
    let root = store.root_node();
    store.set_array_to_table(root, "array", 0).unwrap();
    let array = store.table_value(root, "array").unwrap();
    for i in 0..3 {
        store.set_int32_to_array(array, i, i as i32 + 1).unwrap();
    }
    store.set_string_to_table(root, "string", "integrity sample").unwrap();
    store.set_table_to_table(root, "table", 0).unwrap();
    let table = store.table_value(root, "table").unwrap();
    store.set_int32_to_table(table, "a", 1).unwrap();
    store.set_int64_to_table(table, "b", 5_000_000_000).unwrap();
    store.set_null_to_table(root, "").unwrap();
    store
}

/// The sample store with one corruption applied.
pub(crate) fn corrupted(kind: Corruption) -> DataStore {
    let mut store = sample_store();
    match kind {
        Corruption::ArrayCapacity => edit_header(&mut store, "array", |h| h.set_capacity(0x7FFF_0000)),
        Corruption::ArrayCount => edit_header(&mut store, "array", |h| h.set_count(h.capacity() + 1)),
        Corruption::ArrayHandle => dangle_handle(&mut store, "array"),
        Corruption::ArrayOffset => move_offset(&mut store, "array"),
        Corruption::StringCapacity => edit_header(&mut store, "string", |h| h.set_capacity(0)),
        Corruption::StringCount => edit_header(&mut store, "string", |h| h.set_count(h.capacity() * 4)),
        Corruption::StringHandle => dangle_handle(&mut store, "string"),
        Corruption::StringOffset => move_offset(&mut store, "string"),
        Corruption::TableCapacity => edit_header(&mut store, "table", |h| h.set_capacity(3)),
        Corruption::TableCount => edit_header(&mut store, "table", |h| h.set_count(h.count() + 1)),
        Corruption::TableHandle => dangle_handle(&mut store, "table"),
        Corruption::TableOffset => move_offset(&mut store, "table"),
        Corruption::TableBucketOverflow => edit_header(&mut store, "table", |h| {
            h.set_capacity(0x7FFF_FFFF);
            h.set_has_null_storage(true);
        }),
        Corruption::TableCountOverflow => edit_header(&mut store, "table", |h| h.set_count(0x7FFF_0000)),
        Corruption::BadTypeTag => {
            let root = store.root_node();
            store
                .set_table_value(root, HString::new("string"), DataNode::from_raw(26))
                .unwrap();
        }
    }
    store
}

fn child(store: &DataStore, key: &str) -> DataNode {
    store.table_value(store.root_node(), key).unwrap()
}

fn edit_header(store: &mut DataStore, key: &str, edit: impl FnOnce(&mut Container)) {
    let (offset, mut header) = store.heap.container(child(store, key)).unwrap();
    edit(&mut header);
    header.write(&mut store.heap.data, offset);
}

fn dangle_handle(store: &mut DataStore, key: &str) {
    let node = child(store, key);
    let index = store.heap.handles.len() as u32 + 5;
    let dangling = DataNode::by_reference(node.node_type(), Handle::new(index, node.handle().generation()));
    let root = store.root_node();
    store.set_table_value(root, HString::new(key), dangling).unwrap();
}

fn move_offset(store: &mut DataStore, key: &str) {
    let node = child(store, key);
    let beyond = store.heap.data.len() as u32 + 10;
    store.heap.handles[node.handle().index() as usize].set_offset(beyond);
}

/// Whether two stores hold identical heaps, handle tables and counters.
pub(crate) fn bitwise_eq(a: &DataStore, b: &DataStore) -> bool {
    a.heap.data == b.heap.data
        && a.heap.handles == b.heap.handles
        && a.heap.next_handle == b.heap.next_handle
        && a.heap.allocated_handles == b.heap.allocated_handles
        && a.heap.size_after_last_gc == b.heap.size_after_last_gc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corruptions_change_the_heap() {
        let clean = sample_store();
        assert!(bitwise_eq(&clean, &sample_store()));
        for kind in Corruption::ALL {
            assert!(!bitwise_eq(&clean, &corrupted(kind)), "{:?}", kind);
        }
    }
}
