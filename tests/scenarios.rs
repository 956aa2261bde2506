//! # End-to-End Scenario Tests
//!
//! Exercises the public API the way an embedding application would: build a
//! tree, read it back, render it, diff it, collect garbage and restructure
//! the root.
//!
//! ## Test Categories
//!
//! 1. **Building and Rendering**: typed setters, text output, key sorting
//! 2. **Diff and Patch**: the tombstone scenario, nested merges
//! 3. **Garbage Collection**: handle stability, suppression, compaction
//! 4. **Root Restructuring**: moving nodes and replacing the root
//!
//! ## Usage
//!
//! ```sh
//! cargo test --test scenarios -- --nocapture
//! ```

use datastore::{ConflictPolicy, DataNode, DataStore, FilePath, GameDirectory, NodeType, Value};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn int_table(pairs: &[(&str, i32)]) -> DataStore {
    let mut store = DataStore::new();
    store.make_table(0).unwrap();
    let root = store.root_node();
    for (k, v) in pairs {
        store.set_int32_to_table(root, *k, *v).unwrap();
    }
    store
}

fn same(a: &DataStore, b: &DataStore) -> bool {
    DataStore::equals(a, a.root_node(), b, b.root_node(), true)
}

// ============================================================================
// BUILDING AND RENDERING
// ============================================================================

mod rendering {
    use super::*;

    fn alice() -> DataStore {
        let mut store = DataStore::new();
        store.make_table(0).unwrap();
        let root = store.root_node();
        store.set_string_to_table(root, "name", "Alice").unwrap();
        store.set_array_to_table(root, "tags", 0).unwrap();
        let tags = store.table_value(root, "tags").unwrap();
        store.set_string_to_array(tags, 0, "a").unwrap();
        store.set_string_to_array(tags, 1, "b").unwrap();
        store
    }

    #[test]
    fn name_and_tags_render_as_json() {
        let store = alice();
        assert_eq!(store.to_string(), r#"{"name":"Alice","tags":["a","b"]}"#);
        assert_eq!(store.to_text(false, true), r#"{"name":"Alice","tags":["a","b"]}"#);
    }

    #[test]
    fn sorted_rendering_ignores_insertion_order() {
        let forward = int_table(&[("delta", 4), ("alpha", 1), ("charlie", 3), ("bravo", 2)]);
        let backward = int_table(&[("bravo", 2), ("charlie", 3), ("alpha", 1), ("delta", 4)]);
        let expected = r#"{"alpha":1,"bravo":2,"charlie":3,"delta":4}"#;
        assert_eq!(forward.to_text(false, true), expected);
        assert_eq!(backward.to_text(false, true), expected);
    }

    #[test]
    fn typed_view_matches_setters() {
        let mut store = DataStore::new();
        store.make_array(0).unwrap();
        let root = store.root_node();
        store.set_boolean_to_array(root, 0, true).unwrap();
        store.set_int64_to_array(root, 1, -7_000_000_000).unwrap();
        store.set_float32_to_array(root, 2, 2.5).unwrap();
        let path = FilePath::create(GameDirectory::Save, "ScenarioTest/slot1.dat");
        store.set_file_path_to_array(root, 3, path).unwrap();
        store.set_string_to_array(root, 4, "text").unwrap();

        let at = |i| store.value(store.array_value(root, i).unwrap());
        assert_eq!(at(0), Some(Value::Boolean(true)));
        assert_eq!(at(1), Some(Value::Int64(-7_000_000_000)));
        assert_eq!(at(2), Some(Value::Float32(2.5)));
        assert_eq!(at(3), Some(Value::FilePath(path)));
        assert_eq!(at(4), Some(Value::String("text")));
        assert_eq!(store.array_count(root), Some(5));
    }

    #[test]
    fn unescaped_strings_decode_sequences() {
        let mut store = DataStore::new();
        store.make_table(0).unwrap();
        let root = store.root_node();
        store.unescape_and_set_string_to_table(root, "s", r"tab\there").unwrap();
        assert_eq!(store.as_string(store.table_value(root, "s").unwrap()), Some("tab\there"));
    }
}

// ============================================================================
// DIFF AND PATCH
// ============================================================================

mod diff_patch {
    use super::*;

    #[test]
    fn removed_key_becomes_tombstone() {
        init_tracing();
        let a = int_table(&[("x", 1), ("y", 2)]);
        let b = int_table(&[("x", 1), ("z", 3)]);

        let diff = DataStore::compute_diff(&a, &b).unwrap();
        let root = diff.root_node();
        assert_eq!(diff.table_count(root), Some(2));
        assert_eq!(diff.table_value(root, "y").map(|n| n.node_type()), Some(NodeType::SpecialErase));
        assert_eq!(diff.as_int32(diff.table_value(root, "z").unwrap()), Some(3));

        let mut target = a.clone();
        target.apply_diff(&diff).unwrap();
        assert!(same(&target, &b));
        assert_eq!(target.compute_md5(), b.compute_md5());
    }

    #[test]
    fn nested_changes_merge_into_existing_tables() {
        let mut a = int_table(&[("keep", 1)]);
        let root = a.root_node();
        a.set_table_to_table(root, "settings", 0).unwrap();
        let settings = a.table_value(root, "settings").unwrap();
        a.set_int32_to_table(settings, "volume", 3).unwrap();
        a.set_string_to_table(settings, "lang", "en").unwrap();

        let mut b = a.clone();
        let settings = b.table_value(b.root_node(), "settings").unwrap();
        b.set_int32_to_table(settings, "volume", 9).unwrap();

        let diff = DataStore::compute_diff(&a, &b).unwrap();
        let nested = diff.table_value(diff.root_node(), "settings").unwrap();
        assert_eq!(diff.table_count(nested), Some(1));

        let mut target = a.clone();
        target.apply_diff(&diff).unwrap();
        let settings = target.table_value(target.root_node(), "settings").unwrap();
        assert_eq!(target.as_string(target.table_value(settings, "lang").unwrap()), Some("en"));
        assert_eq!(target.as_int32(target.table_value(settings, "volume").unwrap()), Some(9));
    }

    #[test]
    fn deep_copy_policies() {
        let source = int_table(&[("a", 1), ("b", 2)]);
        let mut dest = int_table(&[("a", 10)]);
        let root = dest.root_node();

        assert!(dest
            .deep_copy(&source, source.root_node(), root, ConflictPolicy::default())
            .is_err());

        dest.deep_copy(&source, source.root_node(), root, ConflictPolicy::PRESERVE)
            .unwrap();
        assert_eq!(dest.as_int32(dest.table_value(root, "a").unwrap()), Some(10));
        assert_eq!(dest.as_int32(dest.table_value(root, "b").unwrap()), Some(2));

        dest.deep_copy(&source, source.root_node(), root, ConflictPolicy::OVERWRITE)
            .unwrap();
        assert_eq!(dest.as_int32(dest.table_value(root, "a").unwrap()), Some(1));
    }
}

// ============================================================================
// GARBAGE COLLECTION
// ============================================================================

mod garbage_collection {
    use super::*;

    #[test]
    fn held_nodes_survive_collection() {
        init_tracing();
        let mut store = DataStore::new();
        store.make_table(0).unwrap();
        let root = store.root_node();
        store.set_array_to_table(root, "list", 0).unwrap();
        let list = store.table_value(root, "list").unwrap();
        for i in 0..100 {
            store.set_string_to_array(list, i, &format!("garbage {i}")).unwrap();
        }
        for i in 0..100 {
            store.set_int32_to_array(list, i, i as i32).unwrap();
        }

        let before = store.in_use_heap_size_bytes();
        store.collect_garbage_and_compact_heap(true);
        assert!(store.in_use_heap_size_bytes() < before);
        assert_eq!(store.array_count(list), Some(100));
        assert_eq!(store.as_int32(store.array_value(list, 99).unwrap()), Some(99));
        assert!(store.verify_integrity());
    }

    #[test]
    fn unreachable_nodes_stop_resolving() {
        let mut store = DataStore::new();
        store.make_table(0).unwrap();
        let root = store.root_node();
        store.set_table_to_table(root, "old", 0).unwrap();
        let old = store.table_value(root, "old").unwrap();
        store.erase_value_from_table(root, "old").unwrap();
        store.collect_garbage(false);

        assert_eq!(store.table_count(old), None);
        assert!(store.set_int32_to_table(old, "k", 1).is_err());
    }

    #[test]
    fn suppression_defers_collection() {
        let mut store = DataStore::builder().gc_marker_bytes(64).build().unwrap();
        store.make_array(0).unwrap();
        let root = store.root_node();
        {
            let mut guard = store.suppress_gc();
            assert!(guard.is_gc_suppressed());
            for i in 0..64 {
                guard.set_string_to_array(root, 0, &format!("churn {i}")).unwrap();
            }
        }
        assert!(!store.is_gc_suppressed());
        assert_eq!(store.as_string(store.array_value(root, 0).unwrap()), Some("churn 63"));
    }
}

// ============================================================================
// ROOT RESTRUCTURING
// ============================================================================

mod restructuring {
    use super::*;

    #[test]
    fn wrap_and_unwrap_root() {
        let mut store = int_table(&[("v", 5)]);
        store.move_root_into_new_root_table("inner", 0).unwrap();
        let root = store.root_node();
        let inner = store.table_value(root, "inner").unwrap();
        assert_eq!(store.as_int32(store.table_value(inner, "v").unwrap()), Some(5));

        store.replace_root_with_table_element(root, "inner").unwrap();
        assert_eq!(store.root_node(), inner);
        assert!(same(&store, &int_table(&[("v", 5)])));
    }

    #[test]
    fn move_between_tables() {
        let mut store = int_table(&[("v", 5)]);
        let root = store.root_node();
        store.set_table_to_table(root, "box", 0).unwrap();
        let boxed = store.table_value(root, "box").unwrap();
        store.move_node_between_tables(root, "v", boxed, "w").unwrap();

        assert!(!store.table_contains_key(root, "v"));
        assert_eq!(store.as_int32(store.table_value(boxed, "w").unwrap()), Some(5));
        assert!(store.move_node_between_tables(root, "v", boxed, "w").is_err());
    }

    #[test]
    fn scalar_root_element_is_rejected() {
        let mut store = DataStore::new();
        store.make_array(0).unwrap();
        let root = store.root_node();
        store.set_int32_to_array(root, 0, 1).unwrap();
        assert!(store.replace_root_with_array_element(root, 0).is_err());
        assert_eq!(store.root_node(), root);
        assert_ne!(store.root_node(), DataNode::NULL);
    }
}
