//! # Structural Diff and Patch
//!
//! `DataStore::compute_diff(a, b)` builds a store `diff` such that applying
//! it to a copy of `a` yields a store equal to `b`.
//!
//! ## Diff Shape
//!
//! For two table roots the diff is a table holding only what changed:
//!
//! ```text
//! a    = {"x":1, "y":2, "t":{"p":1, "q":2}}
//! b    = {"x":1, "z":3, "t":{"p":1, "q":5}}
//! diff = {"z":3, "y":SpecialErase, "t":{"q":5}}
//! ```
//!
//! - a key only in `b`, or whose values differ, is copied from `b`
//! - when both values are tables, the diff recurses instead of copying
//! - a key only in `a` gets a SpecialErase tombstone
//!
//! Every other root pairing (an array root, mismatched root types, a Null
//! root in `a`) makes the diff a full copy of `b`. A Null root in `b` is
//! diffed as an empty container of `a`'s root type.
//!
//! ## Applying
//!
//! A Null diff root changes nothing. A target whose root type differs from
//! the diff's is first replaced with an empty container of that type. Array
//! diffs then resize and overwrite the target array; table diffs erase
//! tombstoned keys (a missing key is fine), merge nested tables, and
//! overwrite everything else.

use eyre::{bail, Result};

use crate::node::{DataNode, NodeType};
use crate::store::DataStore;

impl DataStore {
    /// Delta that turns `a` into `b` when applied with
    /// [`apply_diff`](Self::apply_diff).
    pub fn compute_diff(a: &DataStore, b: &DataStore) -> Result<DataStore> {
        let a_root = a.root_node();
        if a_root.is_null() {
            return Ok(b.clone());
        }

        let substitute;
        let b = if b.root_node().is_null() {
            let mut empty = DataStore::with_policy(b.policy);
            match a_root.node_type() {
                NodeType::Array => empty.make_array(0)?,
                NodeType::Table => empty.make_table(0)?,
                _ => return Ok(b.clone()),
            }
            substitute = empty;
            &substitute
        } else {
            b
        };

        let b_root = b.root_node();
        if a_root.node_type() != b_root.node_type() || !a_root.is_table() {
            return Ok(b.clone());
        }

        let mut diff = DataStore::with_policy(b.policy);
        diff.make_table(0)?;
        let diff_root = diff.root_node();
        diff.diff_additive(a, a_root, b, b_root, diff_root)?;
        diff.diff_subtractive(a, a_root, b, b_root, diff_root)?;

        tracing::debug!(
            changed = diff.table_count(diff_root).unwrap_or(0),
            heap_slots = diff.heap.data.len(),
            "computed diff"
        );
        Ok(diff)
    }

    /// Records in `self[diff]` every pair of `b[tb]` missing from or unequal
    /// to `a[ta]`.
    fn diff_additive(&mut self, a: &DataStore, ta: DataNode, b: &DataStore, tb: DataNode, diff: DataNode) -> Result<()> {
        for (key, vb) in b.table_iter(tb) {
            let Some(va) = a.table_value(ta, key) else {
                self.copy_value_to_table(b, vb, diff, key)?;
                continue;
            };
            if Self::equals(a, va, b, vb, true) {
                continue;
            }
            if va.is_table() && vb.is_table() {
                self.set_table_to_table(diff, key, 0)?;
                let Some(nested) = self.table_value(diff, key) else {
                    bail!("diff: nested table {:?} not readable", key.as_str());
                };
                self.diff_additive(a, va, b, vb, nested)?;
            } else {
                self.copy_value_to_table(b, vb, diff, key)?;
            }
        }
        Ok(())
    }

    /// Tombstones every key of `a[ta]` missing from `b[tb]`, recursing into
    /// the nested tables the additive pass created.
    fn diff_subtractive(
        &mut self,
        a: &DataStore,
        ta: DataNode,
        b: &DataStore,
        tb: DataNode,
        diff: DataNode,
    ) -> Result<()> {
        for (key, va) in a.table_iter(ta) {
            let Some(vb) = b.table_value(tb, key) else {
                self.set_special_erase_to_table(diff, key)?;
                continue;
            };
            if !(va.is_table() && vb.is_table()) || Self::equals(a, va, b, vb, true) {
                continue;
            }
            let Some(nested) = self.table_value(diff, key).filter(|n| n.is_table()) else {
                bail!("diff: nested table {:?} missing after additive pass", key.as_str());
            };
            self.diff_subtractive(a, va, b, vb, nested)?;
        }
        Ok(())
    }

    /// Applies a delta produced by [`compute_diff`](Self::compute_diff).
    ///
    /// Every node obtained from this store before the call may be invalid
    /// afterwards if the root had to be replaced.
    pub fn apply_diff(&mut self, diff: &DataStore) -> Result<()> {
        let diff_root = diff.root_node();
        let kind = diff_root.node_type();
        match kind {
            NodeType::Null => return Ok(()),
            NodeType::Array | NodeType::Table => {}
            t => bail!("apply_diff: diff root is {:?}, not a container", t),
        }

        if self.root_node().node_type() != kind {
            if kind == NodeType::Array {
                self.make_array(0)?;
            } else {
                self.make_table(0)?;
            }
        }
        let root = self.root_node();
        self.apply_node(diff, diff_root, root)
    }

    fn apply_node(&mut self, diff: &DataStore, from: DataNode, to: DataNode) -> Result<()> {
        if from.is_array() {
            let Some(count) = diff.array_count(from) else {
                bail!("apply_diff: unreadable diff array {:?}", from);
            };
            self.resize_array(to, count)?;
            for i in 0..count {
                let value = diff.array_value(from, i).unwrap_or(DataNode::NULL);
                self.copy_value_to_array(diff, value, to, i)?;
            }
            return Ok(());
        }

        for (key, value) in diff.table_iter(from) {
            match value.node_type() {
                NodeType::SpecialErase => {
                    if self.table_contains_key(to, key) {
                        self.erase_value_from_table(to, key)?;
                    }
                }
                NodeType::Table => {
                    let nested = match self.table_value(to, key).filter(|n| n.is_table()) {
                        Some(n) => n,
                        None => {
                            self.set_table_to_table(to, key, 0)?;
                            let Some(n) = self.table_value(to, key) else {
                                bail!("apply_diff: new table {:?} not readable", key.as_str());
                            };
                            n
                        }
                    };
                    self.apply_node(diff, value, nested)?;
                }
                _ => self.copy_value_to_table(diff, value, to, key)?,
            }
        }
        Ok(())
    }
}
