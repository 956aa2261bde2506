//! Fuzz testing for table and array mutation.
//!
//! This fuzz target drives a store with an arbitrary sequence of writes,
//! erases, garbage collections and restructurings, mirroring the root table
//! in a `HashMap` to check lookups after every step. The heap must pass the
//! integrity check at the end.

#![no_main]

use std::collections::HashMap;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use datastore::{DataStore, NodeType};

#[derive(Debug, Arbitrary)]
struct TableInput {
    operations: Vec<TableOperation>,
}

#[derive(Debug, Arbitrary)]
enum TableOperation {
    SetInt(u8, i64),
    SetFloat(u8, f32),
    SetString(u8, String),
    SetTable(u8),
    SetArray(u8, u8),
    Erase(u8),
    Collect(bool),
    CompactHandles,
    Reserve(u16),
}

fn key(k: u8) -> String {
    if k % 16 == 0 {
        String::new()
    } else {
        format!("fuzz_{}", k % 64)
    }
}

fuzz_target!(|input: TableInput| {
    if input.operations.len() > 1000 {
        return;
    }

    let mut store = DataStore::new();
    store.make_table(0).expect("make_table");
    let mut model: HashMap<String, NodeType> = HashMap::new();

    for op in &input.operations {
        let root = store.root_node();
        match op {
            TableOperation::SetInt(k, v) => {
                store.set_int64_to_table(root, key(*k).as_str(), *v).unwrap();
                let node = store.table_value(root, key(*k).as_str()).unwrap();
                assert_eq!(store.as_int64(node), Some(*v));
                model.insert(key(*k), node.node_type());
            }
            TableOperation::SetFloat(k, v) => {
                store.set_float32_to_table(root, key(*k).as_str(), *v).unwrap();
                let node = store.table_value(root, key(*k).as_str()).unwrap();
                model.insert(key(*k), node.node_type());
            }
            TableOperation::SetString(k, s) => {
                if s.len() > 1024 {
                    continue;
                }
                store.set_string_to_table(root, key(*k).as_str(), s).unwrap();
                model.insert(key(*k), NodeType::String);
            }
            TableOperation::SetTable(k) => {
                store.set_table_to_table(root, key(*k).as_str(), 0).unwrap();
                model.insert(key(*k), NodeType::Table);
            }
            TableOperation::SetArray(k, len) => {
                store.set_array_to_table(root, key(*k).as_str(), 0).unwrap();
                let array = store.table_value(root, key(*k).as_str()).unwrap();
                store.resize_array(array, *len as u32).unwrap();
                assert_eq!(store.array_count(array), Some(*len as u32));
                model.insert(key(*k), NodeType::Array);
            }
            TableOperation::Erase(k) => {
                let erased = store.erase_value_from_table(root, key(*k).as_str()).is_ok();
                assert_eq!(erased, model.remove(&key(*k)).is_some());
            }
            TableOperation::Collect(compact) => store.collect_garbage_and_compact_heap(*compact),
            TableOperation::CompactHandles => store.compact_handle_offsets(),
            TableOperation::Reserve(bytes) => store.reserve(*bytes as u32),
        }

        let root = store.root_node();
        assert_eq!(store.table_count(root), Some(model.len() as u32));
    }

    let root = store.root_node();
    for (k, kind) in &model {
        let node = store.table_value(root, k.as_str()).expect("model key missing");
        assert_eq!(node.node_type(), *kind);
    }
    assert!(store.verify_integrity());
});
