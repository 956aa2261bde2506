//! # Integrity Verification
//!
//! [`DataStore::verify_integrity`] walks every node reachable from the root
//! and checks that reading it cannot go out of bounds or loop:
//!
//! - by-reference nodes resolve: index in range, generation matches, offset
//!   inside the heap
//! - by-reference scalars fit their one or two slots
//! - strings: `count + 1 <= capacity * 4`, payload inside the heap, UTF-8
//! - arrays: `count <= capacity`, element slots inside the heap
//! - tables: power-of-two capacity with a free bucket, null flag only with
//!   null storage, every slot inside the heap, the non-empty key count
//!   matches `count`, every key id has been issued
//! - each container is reached exactly once
//! - no node carries an unknown type tag
//!
//! The walk uses an explicit worklist, so deeply nested or adversarial input
//! cannot exhaust the stack. It returns `false` instead of failing; load an
//! untrusted file, then verify before reading it.

use hashbrown::HashSet;

use crate::config::{CONTAINER_HEADER_SLOTS, SLOT_BYTES};
use crate::heap::Container;
use crate::node::{DataNode, NodeType};
use crate::store::{table_slots, DataStore};
use crate::strings::HString;

impl DataStore {
    /// Whether every node reachable from the root is well formed.
    pub fn verify_integrity(&self) -> bool {
        let Some(root) = self.heap.slot(0).map(DataNode::from_raw) else {
            return true;
        };

        let mut visited = HashSet::new();
        let mut pending = vec![root];
        while let Some(node) = pending.pop() {
            if !self.verify_node(node, &mut visited, &mut pending) {
                tracing::debug!(?node, "integrity check failed");
                return false;
            }
        }
        true
    }

    fn verify_node(&self, node: DataNode, visited: &mut HashSet<u32>, pending: &mut Vec<DataNode>) -> bool {
        let kind = node.node_type();
        if kind == NodeType::Invalid {
            return false;
        }
        if !kind.is_by_reference() {
            return true;
        }

        let Some(offset) = self.heap.resolve(node.handle()) else {
            return false;
        };
        let heap_len = self.heap.data.len() as u64;
        if let Some(slots) = kind.scalar_slots() {
            return offset as u64 + slots as u64 <= heap_len;
        }

        if !visited.insert(node.handle().index()) {
            return false;
        }
        let Some(header) = Container::read(&self.heap.data, offset) else {
            return false;
        };
        let body = offset as u64 + CONTAINER_HEADER_SLOTS as u64;
        let (count, capacity) = (header.count(), header.capacity());

        match kind {
            NodeType::String => {
                count as u64 + 1 <= capacity as u64 * SLOT_BYTES as u64
                    && body + capacity as u64 <= heap_len
                    && self.string_bytes(node).is_some_and(|b| std::str::from_utf8(b).is_ok())
            }
            NodeType::Array => {
                if count > capacity || body + capacity as u64 > heap_len {
                    return false;
                }
                let start = body as usize;
                pending.extend(self.heap.data[start..start + count as usize].iter().map(|&raw| DataNode::from_raw(raw)));
                true
            }
            NodeType::Table => self.verify_table(offset, header, pending),
            _ => false,
        }
    }

    fn verify_table(&self, offset: u32, header: Container, pending: &mut Vec<DataNode>) -> bool {
        let (count, capacity) = (header.count(), header.capacity());
        if capacity != 0 && !capacity.is_power_of_two() {
            return false;
        }
        if count > 0 && count >= capacity {
            return false;
        }
        if header.has_null() && !header.has_null_storage() {
            return false;
        }
        let total = header.total_capacity();
        if offset as u64 + table_slots(total) > self.heap.data.len() as u64 {
            return false;
        }

        let values = (offset + CONTAINER_HEADER_SLOTS) as usize;
        let keys = values + total as usize;
        let mut live = 0u32;
        for i in 0..capacity as usize {
            let key = self.heap.data[keys + i];
            if key == 0 {
                continue;
            }
            if HString::from_id(key).is_none() {
                return false;
            }
            live += 1;
            pending.push(DataNode::from_raw(self.heap.data[values + i]));
        }
        if header.has_null() {
            pending.push(DataNode::from_raw(self.heap.data[values + capacity as usize]));
        }
        live == count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::fixtures::{corrupted, sample_store, Corruption};

    #[test]
    fn well_formed_stores_pass() {
        assert!(DataStore::new().verify_integrity());
        let store = sample_store();
        assert!(store.verify_integrity());

        let mut collected = store.clone();
        collected.collect_garbage_and_compact_heap(true);
        assert!(collected.verify_integrity());
    }

    #[test]
    fn every_corruption_is_detected() {
        for kind in Corruption::ALL {
            let store = corrupted(kind);
            assert!(!store.verify_integrity(), "{:?} not detected", kind);
        }
    }

    #[test]
    fn shared_container_is_rejected() {
        let mut store = sample_store();
        let root = store.root_node();
        let table = store.table_value(root, "table").unwrap();
        store.set_table_value(root, HString::new("alias"), table).unwrap();
        assert!(!store.verify_integrity());
    }
}
