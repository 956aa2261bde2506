//! # Whole-Tree Operations
//!
//! Algorithms built purely on the public value API of [`DataStore`]:
//!
//! | Operation                         | Module      | Result              |
//! |-----------------------------------|-------------|---------------------|
//! | `DataStore::equals`               | `equals`    | deep structural eq  |
//! | `compute_md5` / `node_md5`        | `checksum`  | order-free checksum |
//! | `verify_integrity`                | `integrity` | `bool`, never panics|
//! | `node_to_string`, `Display`       | `format`    | text rendering      |
//! | `compute_diff` / `apply_diff`     | `diff`      | structural delta    |
//!
//! ## Ordering
//!
//! Table bucket order depends on insertion history and capacity, so nothing
//! here relies on it. Equality looks keys up in the other table; checksums
//! and sorted rendering walk keys in byte order.
//!
//! ## Diff Round Trip
//!
//! ```text
//! a ──compute_diff(a, b)──> diff
//! copy(a) ──apply_diff(diff)──> store equal to b
//! ```
//!
//! Only table roots diff incrementally. Every other root pairing produces a
//! full copy of `b`.
//!
//! [`DataStore`]: crate::store::DataStore

mod checksum;
mod diff;
mod equals;
mod format;
mod integrity;

#[cfg(test)]
pub(crate) mod fixtures;
