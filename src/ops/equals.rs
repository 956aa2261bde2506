//! Deep structural equality between nodes of two stores.

use crate::node::{DataNode, NodeType, Value};
use crate::store::DataStore;

impl DataStore {
    /// Whether `a_node` (in `a`) and `b_node` (in `b`) hold the same tree.
    ///
    /// Node types must match exactly. Arrays compare element by element;
    /// tables compare by key membership, so bucket order and capacity do not
    /// matter. NaN equals NaN only when `nan_equal` is set. Nodes that do not
    /// resolve are never equal to anything.
    pub fn equals(a: &DataStore, a_node: DataNode, b: &DataStore, b_node: DataNode, nan_equal: bool) -> bool {
        let kind = a_node.node_type();
        if kind != b_node.node_type() {
            return false;
        }

        match kind {
            NodeType::Array => {
                let (Some(count), Some(other)) = (a.array_count(a_node), b.array_count(b_node)) else {
                    return false;
                };
                count == other
                    && (0..count).all(|i| match (a.array_value(a_node, i), b.array_value(b_node, i)) {
                        (Some(x), Some(y)) => Self::equals(a, x, b, y, nan_equal),
                        _ => false,
                    })
            }
            NodeType::Table => {
                let (Some(count), Some(other)) = (a.table_count(a_node), b.table_count(b_node)) else {
                    return false;
                };
                count == other
                    && a.table_iter(a_node).all(|(key, x)| match b.table_value(b_node, key) {
                        Some(y) => Self::equals(a, x, b, y, nan_equal),
                        None => false,
                    })
            }
            NodeType::Invalid => false,
            _ => match (a.value(a_node), b.value(b_node)) {
                (Some(Value::Float32(x)), Some(Value::Float32(y))) => x == y || (nan_equal && x.is_nan() && y.is_nan()),
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }
}
