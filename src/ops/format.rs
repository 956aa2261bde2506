//! # Text Rendering
//!
//! JSON-like text for a tree, for logs, snapshots and debugging. The output
//! is JSON except for the float tokens `NaN`, `Infinity` and `-Infinity`.
//!
//! ```text
//! single line:  {"name":"Alice","tags":["a","b"]}
//!
//! multiline:    {
//!               	"name":"Alice",
//!               	"tags":["a", "b"]
//!               }
//! ```
//!
//! Multiline mode starts every table entry on its own line, indented with
//! one tab per nesting level, and puts the closing brace of a non-empty
//! table on its own line. Array elements stay on one line, separated by
//! `", "`. Tables are written in bucket order unless key sorting is
//! requested, in which case keys are ordered by their bytes.
//!
//! Null and SpecialErase both render as `null`, so text output cannot
//! represent a diff faithfully.

use std::fmt;

use crate::node::{DataNode, Value};
use crate::store::DataStore;
use crate::strings::{escape_json, HString};

/// Significant digits of a rendered float, as C's `%g`.
const FLOAT_PRECISION: i32 = 6;

impl DataStore {
    /// Renders the whole tree.
    pub fn to_text(&self, multiline: bool, sort_keys: bool) -> String {
        self.node_to_string(self.root_node(), multiline, 0, sort_keys)
    }

    /// Renders the subtree at `node`, starting at `indentation` tabs.
    pub fn node_to_string(&self, node: DataNode, multiline: bool, indentation: usize, sort_keys: bool) -> String {
        let mut out = String::new();
        self.write_node(node, &mut out, multiline, indentation, sort_keys);
        out
    }

    fn write_node(&self, node: DataNode, out: &mut String, multiline: bool, indentation: usize, sort_keys: bool) {
        let Some(value) = self.value(node) else {
            out.push_str("null");
            return;
        };

        match value {
            Value::Null | Value::SpecialErase => out.push_str("null"),
            Value::Boolean(b) => out.push_str(if b { "true" } else { "false" }),
            Value::Int32(v) => out.push_str(&v.to_string()),
            Value::UInt32(v) => out.push_str(&v.to_string()),
            Value::Int64(v) => out.push_str(&v.to_string()),
            Value::UInt64(v) => out.push_str(&v.to_string()),
            Value::Float32(v) => out.push_str(&format_float(v)),
            Value::FilePath(path) if path.is_valid() => {
                out.push('"');
                out.push_str(&path.to_serialized_url());
                out.push('"');
            }
            Value::FilePath(_) => out.push_str("null"),
            Value::String(s) => write_quoted(s, out),
            Value::Array(array) => {
                out.push('[');
                let count = self.array_count(array).unwrap_or(0);
                for i in 0..count {
                    if i > 0 {
                        out.push_str(if multiline { ", " } else { "," });
                    }
                    let element = self.array_value(array, i).unwrap_or(DataNode::NULL);
                    self.write_node(element, out, multiline, indentation, sort_keys);
                }
                out.push(']');
            }
            Value::Table(table) => self.write_table(table, out, multiline, indentation, sort_keys),
        }
    }

    fn write_table(&self, table: DataNode, out: &mut String, multiline: bool, indentation: usize, sort_keys: bool) {
        let mut pairs: Vec<(HString, DataNode)> = self.table_iter(table).collect();
        if sort_keys {
            pairs.sort_unstable_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
        }

        out.push('{');
        for (i, (key, value)) in pairs.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            if multiline {
                out.push('\n');
                push_tabs(out, indentation + 1);
            }
            write_quoted(key.as_str(), out);
            out.push(':');
            self.write_node(*value, out, multiline, indentation + 1, sort_keys);
        }
        if multiline && !pairs.is_empty() {
            out.push('\n');
            push_tabs(out, indentation);
        }
        out.push('}');
    }
}

impl fmt::Display for DataStore {
    /// Single-line rendering of the root, keys in bucket order.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text(false, false))
    }
}

fn write_quoted(s: &str, out: &mut String) {
    out.push('"');
    escape_json(s, out);
    out.push('"');
}

fn push_tabs(out: &mut String, n: usize) {
    out.extend(std::iter::repeat('\t').take(n));
}

/// `%g` with six significant digits, plus `NaN` and `±Infinity`.
pub(crate) fn format_float(v: f32) -> String {
    if v.is_nan() {
        return "NaN".to_owned();
    }
    if v.is_infinite() {
        return if v < 0.0 { "-Infinity" } else { "Infinity" }.to_owned();
    }
    if v == 0.0 {
        return if v.is_sign_negative() { "-0" } else { "0" }.to_owned();
    }

    let v = v as f64;
    let scientific = format!("{:.*e}", (FLOAT_PRECISION - 1) as usize, v);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= FLOAT_PRECISION {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_fraction(mantissa), sign, exponent.abs())
    } else {
        let decimals = (FLOAT_PRECISION - 1 - exponent) as usize;
        trim_fraction(&format!("{:.*}", decimals, v)).to_owned()
    }
}

/// Drops trailing zeros after a decimal point, then the point itself.
fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
