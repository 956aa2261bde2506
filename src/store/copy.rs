//! # Deep Copy
//!
//! Copies a subtree from one store into an array or table of another,
//! re-creating every container and by-reference value in the destination.
//! Diff/patch and store-to-store merges are both built on this.
//!
//! ## Conflicts
//!
//! A conflict is a destination slot that already holds a value.
//! [`ConflictPolicy`] decides what happens:
//!
//! | allow_conflicts | overwrite_conflicts | behavior                          |
//! |-----------------|---------------------|-----------------------------------|
//! | false           | (ignored)           | fail on the first conflict        |
//! | true            | true                | overwrite; merge into containers  |
//! | true            | false               | keep existing values              |
//!
//! When conflicts are allowed, an existing array or table in the destination
//! is merged into rather than replaced if the source value has the same
//! container type.
//!
//! A failed copy leaves the destination partially written.

use eyre::{bail, Result};

use super::DataStore;
use crate::node::{DataNode, NodeType};
use crate::strings::HString;

/// How [`DataStore::deep_copy`] treats destination slots that already hold
/// a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictPolicy {
    pub allow_conflicts: bool,
    pub overwrite_conflicts: bool,
}

impl Default for ConflictPolicy {
    fn default() -> Self {
        Self {
            allow_conflicts: false,
            overwrite_conflicts: true,
        }
    }
}

impl ConflictPolicy {
    /// Overwrite scalars, merge containers.
    pub const OVERWRITE: ConflictPolicy = ConflictPolicy {
        allow_conflicts: true,
        overwrite_conflicts: true,
    };

    /// Keep existing values, fill in the rest.
    pub const PRESERVE: ConflictPolicy = ConflictPolicy {
        allow_conflicts: true,
        overwrite_conflicts: false,
    };

    fn skips_existing(self) -> bool {
        self.allow_conflicts && !self.overwrite_conflicts
    }
}

/// Destination slot inside an array or table.
#[derive(Debug, Clone, Copy)]
enum Slot {
    Index(u32),
    Key(HString),
}

impl DataStore {
    fn slot_value(&self, container: DataNode, slot: Slot) -> Option<DataNode> {
        match slot {
            Slot::Index(i) => self.array_value(container, i),
            Slot::Key(k) => self.table_value(container, k),
        }
    }

    fn store_at(&mut self, container: DataNode, slot: Slot, node: DataNode) -> Result<()> {
        match slot {
            Slot::Index(i) => self.set_array_value(container, i, node),
            Slot::Key(k) => self.set_table_value(container, k, node),
        }
    }

    /// Re-creates the non-container value `value` of `from` in this store.
    fn import_value(&mut self, from: &DataStore, value: DataNode) -> Result<DataNode> {
        match value.node_type() {
            NodeType::Null
            | NodeType::SpecialErase
            | NodeType::Boolean
            | NodeType::Int32Small
            | NodeType::Float31
            | NodeType::FilePath => Ok(value),
            NodeType::Int32Big => self.make_int32_node(from.assume_int32_big(value)),
            NodeType::UInt32 => self.make_uint32_node(from.assume_uint32(value)),
            NodeType::Int64 => self.make_int64_node(from.assume_int64(value)),
            NodeType::UInt64 => self.make_uint64_node(from.assume_uint64(value)),
            NodeType::Float32 => self.make_float32_node(from.assume_float32(value)),
            NodeType::String => match from.as_string(value) {
                Some(s) => self.make_string_node(s),
                None => bail!("deep copy: unreadable string {:?}", value),
            },
            t => bail!("deep copy: cannot import {:?} as a leaf", t),
        }
    }

    /// Copies every element or pair of `from_node` (in `from`) into `to`.
    /// Both must be arrays or both tables.
    pub fn deep_copy(
        &mut self,
        from: &DataStore,
        from_node: DataNode,
        to: DataNode,
        policy: ConflictPolicy,
    ) -> Result<()> {
        if from_node.node_type() != to.node_type() {
            bail!(
                "deep copy: source {:?} and destination {:?} differ",
                from_node.node_type(),
                to.node_type()
            );
        }

        match from_node.node_type() {
            NodeType::Array => {
                let Some(count) = from.array_count(from_node) else {
                    bail!("deep copy: invalid source array {:?}", from_node);
                };
                for i in 0..count {
                    if policy.skips_existing() && self.array_value(to, i).is_some() {
                        continue;
                    }
                    let Some(value) = from.array_value(from_node, i) else {
                        bail!("deep copy: source element {} unreadable", i);
                    };
                    self.deep_copy_into(from, value, to, Slot::Index(i), policy)?;
                }
                Ok(())
            }
            NodeType::Table => {
                for (key, value) in from.table_iter(from_node) {
                    if policy.skips_existing() && self.table_value(to, key).is_some() {
                        continue;
                    }
                    self.deep_copy_into(from, value, to, Slot::Key(key), policy)?;
                }
                Ok(())
            }
            t => bail!("deep copy: {:?} is not a container", t),
        }
    }

    /// Copies `value` (in `from`) to `to[index]`, recursing into containers.
    pub fn deep_copy_to_array(
        &mut self,
        from: &DataStore,
        value: DataNode,
        to: DataNode,
        index: u32,
        policy: ConflictPolicy,
    ) -> Result<()> {
        self.deep_copy_into(from, value, to, Slot::Index(index), policy)
    }

    /// Copies `value` (in `from`) to `to[key]`, recursing into containers.
    pub fn deep_copy_to_table(
        &mut self,
        from: &DataStore,
        value: DataNode,
        to: DataNode,
        key: impl Into<HString>,
        policy: ConflictPolicy,
    ) -> Result<()> {
        self.deep_copy_into(from, value, to, Slot::Key(key.into()), policy)
    }

    /// [`deep_copy`](Self::deep_copy) with source and destination in this
    /// store. The source is read from a snapshot, so overlapping trees copy
    /// what the source held before the call.
    pub fn deep_copy_within(&mut self, from_node: DataNode, to: DataNode, policy: ConflictPolicy) -> Result<()> {
        let snapshot = self.clone();
        self.deep_copy(&snapshot, from_node, to, policy)
    }

    /// Writes a copy of `value` (in `from`) to `to[index]`, replacing
    /// whatever was there. Containers are always copied into a fresh one.
    pub fn copy_value_to_array(&mut self, from: &DataStore, value: DataNode, to: DataNode, index: u32) -> Result<()> {
        self.replace_at(from, value, to, Slot::Index(index))
    }

    /// Writes a copy of `value` (in `from`) to `to[key]`, replacing whatever
    /// was there. Containers are always copied into a fresh one.
    pub fn copy_value_to_table(
        &mut self,
        from: &DataStore,
        value: DataNode,
        to: DataNode,
        key: impl Into<HString>,
    ) -> Result<()> {
        self.replace_at(from, value, to, Slot::Key(key.into()))
    }

    fn replace_at(&mut self, from: &DataStore, value: DataNode, to: DataNode, slot: Slot) -> Result<()> {
        let kind = value.node_type();
        let fresh = match kind {
            NodeType::Array => self.make_array_node(0)?,
            NodeType::Table => self.make_table_node(0)?,
            _ => {
                let node = self.import_value(from, value)?;
                return self.store_at(to, slot, node);
            }
        };
        self.store_at(to, slot, fresh)?;
        let Some(target) = self.slot_value(to, slot) else {
            bail!("copy: new container at {:?} not readable", slot);
        };
        self.deep_copy(from, value, target, ConflictPolicy::default())
    }

    fn deep_copy_into(
        &mut self,
        from: &DataStore,
        value: DataNode,
        to: DataNode,
        slot: Slot,
        policy: ConflictPolicy,
    ) -> Result<()> {
        let existing = self.slot_value(to, slot);
        if existing.is_some() && !policy.allow_conflicts {
            bail!("deep copy: conflict at {:?}", slot);
        }

        let kind = value.node_type();
        match kind {
            NodeType::Array | NodeType::Table => {
                let mut target = existing.filter(|e| policy.allow_conflicts && e.node_type() == kind);
                if target.is_none() {
                    let fresh = match kind {
                        NodeType::Array => self.make_array_node(0)?,
                        _ => self.make_table_node(0)?,
                    };
                    self.store_at(to, slot, fresh)?;
                    target = self.slot_value(to, slot);
                }
                let Some(target) = target else {
                    bail!("deep copy: new container at {:?} not readable", slot);
                };
                self.deep_copy(from, value, target, policy)
            }
            _ => {
                let node = self.import_value(from, value)?;
                self.store_at(to, slot, node)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> DataStore {
        let mut store = DataStore::new();
        store.make_table(0).unwrap();
        let root = store.root_node();
        store.set_string_to_table(root, "name", "src").unwrap();
        store.set_uint64_to_table(root, "big", u64::MAX).unwrap();
        store.set_table_to_table(root, "nested", 0).unwrap();
        let nested = store.table_value(root, "nested").unwrap();
        store.set_int32_to_table(nested, "a", 1).unwrap();
        store.set_array_to_table(nested, "list", 0).unwrap();
        let list = store.table_value(nested, "list").unwrap();
        store.set_float32_to_array(list, 0, 0.5).unwrap();
        store
    }

    #[test]
    fn copies_into_empty_table() {
        let from = source();
        let mut to = DataStore::new();
        to.make_table(0).unwrap();
        to.deep_copy(&from, from.root_node(), to.root_node(), ConflictPolicy::default())
            .unwrap();

        let root = to.root_node();
        assert_eq!(to.as_string(to.table_value(root, "name").unwrap()), Some("src"));
        assert_eq!(to.as_uint64(to.table_value(root, "big").unwrap()), Some(u64::MAX));
        let nested = to.table_value(root, "nested").unwrap();
        let list = to.table_value(nested, "list").unwrap();
        assert_eq!(to.as_float32(to.array_value(list, 0).unwrap()), Some(0.5));
    }

    #[test]
    fn default_policy_fails_on_conflict() {
        let from = source();
        let mut to = DataStore::new();
        to.make_table(0).unwrap();
        to.set_boolean_to_table(to.root_node(), "name", true).unwrap();
        assert!(to
            .deep_copy(&from, from.root_node(), to.root_node(), ConflictPolicy::default())
            .is_err());
    }

    #[test]
    fn preserve_keeps_existing_and_merges() {
        let from = source();
        let mut to = DataStore::new();
        to.make_table(0).unwrap();
        let root = to.root_node();
        to.set_string_to_table(root, "name", "kept").unwrap();
        to.set_table_to_table(root, "nested", 0).unwrap();
        let nested = to.table_value(root, "nested").unwrap();
        to.set_int32_to_table(nested, "b", 2).unwrap();

        to.deep_copy(&from, from.root_node(), root, ConflictPolicy::PRESERVE).unwrap();
        assert_eq!(to.as_string(to.table_value(root, "name").unwrap()), Some("kept"));
        let nested = to.table_value(root, "nested").unwrap();
        assert_eq!(to.table_value(nested, "a"), None);
        assert_eq!(to.as_int32(to.table_value(nested, "b").unwrap()), Some(2));
    }

    #[test]
    fn overwrite_merges_nested_tables() {
        let from = source();
        let mut to = DataStore::new();
        to.make_table(0).unwrap();
        let root = to.root_node();
        to.set_string_to_table(root, "name", "old").unwrap();
        to.set_table_to_table(root, "nested", 0).unwrap();
        let nested = to.table_value(root, "nested").unwrap();
        to.set_int32_to_table(nested, "b", 2).unwrap();

        to.deep_copy(&from, from.root_node(), root, ConflictPolicy::OVERWRITE).unwrap();
        assert_eq!(to.as_string(to.table_value(root, "name").unwrap()), Some("src"));
        let nested = to.table_value(root, "nested").unwrap();
        assert_eq!(to.as_int32(to.table_value(nested, "a").unwrap()), Some(1));
        assert_eq!(to.as_int32(to.table_value(nested, "b").unwrap()), Some(2));
    }

    #[test]
    fn copy_within_same_store() {
        let mut store = source();
        let root = store.root_node();
        store.set_table_to_table(root, "clone", 0).unwrap();
        let nested = store.table_value(root, "nested").unwrap();
        let clone = store.table_value(root, "clone").unwrap();
        store.deep_copy_within(nested, clone, ConflictPolicy::default()).unwrap();
        let clone = store.table_value(root, "clone").unwrap();
        assert_eq!(store.as_int32(store.table_value(clone, "a").unwrap()), Some(1));
    }

    #[test]
    fn copy_value_replaces_existing_container() {
        let from = source();
        let mut to = DataStore::new();
        to.make_table(0).unwrap();
        let root = to.root_node();
        to.set_table_to_table(root, "nested", 0).unwrap();
        let stale = to.table_value(root, "nested").unwrap();
        to.set_int32_to_table(stale, "b", 2).unwrap();

        let nested = from.table_value(from.root_node(), "nested").unwrap();
        to.copy_value_to_table(&from, nested, root, "nested").unwrap();
        let nested = to.table_value(root, "nested").unwrap();
        assert_eq!(to.table_value(nested, "b"), None);
        assert_eq!(to.as_int32(to.table_value(nested, "a").unwrap()), Some(1));

        to.set_array_to_table(root, "list", 0).unwrap();
        let list = to.table_value(root, "list").unwrap();
        to.copy_value_to_array(&from, DataNode::boolean(true), list, 2).unwrap();
        assert_eq!(to.array_count(list), Some(3));
        assert!(to.array_value(list, 0).unwrap().is_null());
    }

    #[test]
    fn mismatched_kinds_fail() {
        let from = source();
        let mut to = DataStore::new();
        to.make_array(0).unwrap();
        assert!(to
            .deep_copy(&from, from.root_node(), to.root_node(), ConflictPolicy::OVERWRITE)
            .is_err());
    }
}
