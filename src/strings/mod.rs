//! # Interned Strings
//!
//! Table keys and string-valued identifiers are stored in the heap as 32-bit
//! interned ids rather than as bytes. This module provides the process-wide
//! interner behind those ids and the JSON-style escaping used when strings
//! are rendered to or read from text.
//!
//! ## Components
//!
//! - [`HString`]: a copyable id for an interned string, with a stable 32-bit
//!   hash used for table bucketing.
//! - [`escape`]: `escape_json` / `unescape_json` helpers.
//!
//! ## Id Stability
//!
//! Ids are process-local. They are handed out in first-seen order, so the same
//! text may receive different ids in different processes. Anything that leaves
//! the process (the binary codec) maps ids to text first. The hash, by
//! contrast, depends only on the bytes and is identical everywhere, which keeps
//! table layouts reproducible.

pub mod escape;
mod hstring;

pub use escape::{escape_json, escaped_json_len, unescape_json};
pub use hstring::HString;

pub(crate) use hstring::Interner;
