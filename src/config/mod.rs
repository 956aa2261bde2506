//! # Data Store Configuration Module
//!
//! This module centralizes the layout and policy constants for the data store.
//! Constants are grouped by functional area and their interdependencies are
//! enforced through compile-time assertions.
//!
//! Runtime-tunable policy (GC thresholds, load-time handle compaction) lives in
//! [`crate::store::DataStoreBuilder`]; the values here are its defaults.
//!
//! ## Module Organization
//!
//! - [`constants`]: Node encoding, handle, container, GC and file format values

pub mod constants;
pub use constants::*;
