//! # Data Store Builder
//!
//! `DataStoreBuilder` configures the runtime policy of a [`DataStore`]
//! before it is created. Every setting is optional; unset settings take the
//! defaults from [`crate::config`].
//!
//! ## Configuration Options
//!
//! | Option                  | Default  | Description                                     |
//! |-------------------------|----------|-------------------------------------------------|
//! | initial_capacity_bytes  | 0        | Heap bytes reserved up front                    |
//! | gc_marker_bytes         | 512 KiB  | Heap size below which automatic GC never runs   |
//! | gc_growth_factor        | 2        | Collect once the heap grows this much since GC  |
//! | compact_handles_on_load | true     | Densify oversized handle tables after `load`    |
//!
//! ## Usage
//!
//! ```ignore
//! let store = DataStore::builder()
//!     .initial_capacity_bytes(64 * 1024)
//!     .gc_growth_factor(4)
//!     .build()?;
//! ```

use eyre::{ensure, Result};

use super::{DataStore, StorePolicy};
use crate::config::{GC_GROWTH_FACTOR, GC_MARKER_BYTES};

/// Builder for a [`DataStore`] with non-default policy.
///
/// Use `DataStore::builder()` to create one, chain settings, then call
/// `build()`.
#[derive(Debug, Clone, Default)]
pub struct DataStoreBuilder {
    initial_capacity_bytes: Option<u32>,
    gc_marker_bytes: Option<u32>,
    gc_growth_factor: Option<u32>,
    compact_handles_on_load: Option<bool>,
}

impl DataStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves heap space for `bytes` so early growth does not reallocate.
    pub fn initial_capacity_bytes(mut self, bytes: u32) -> Self {
        self.initial_capacity_bytes = Some(bytes);
        self
    }

    /// Sets the heap size floor for automatic collection.
    ///
    /// After each collection the threshold becomes
    /// `max(heap size, marker) × growth factor`, so a small heap never
    /// triggers collection on its own.
    pub fn gc_marker_bytes(mut self, bytes: u32) -> Self {
        self.gc_marker_bytes = Some(bytes);
        self
    }

    /// Sets how many times larger the heap may grow between automatic
    /// collections. Must be at least 2.
    pub fn gc_growth_factor(mut self, factor: u32) -> Self {
        self.gc_growth_factor = Some(factor);
        self
    }

    /// Controls whether `load` densifies a handle table much larger than the
    /// number of live handles.
    pub fn compact_handles_on_load(mut self, enabled: bool) -> Self {
        self.compact_handles_on_load = Some(enabled);
        self
    }

    /// Creates an empty store with the configured policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the growth factor is below 2.
    pub fn build(self) -> Result<DataStore> {
        let policy = StorePolicy {
            gc_marker_bytes: self.gc_marker_bytes.unwrap_or(GC_MARKER_BYTES),
            gc_growth_factor: self.gc_growth_factor.unwrap_or(GC_GROWTH_FACTOR),
            compact_handles_on_load: self.compact_handles_on_load.unwrap_or(true),
        };
        ensure!(
            policy.gc_growth_factor >= 2,
            "gc_growth_factor must be at least 2, got {}",
            policy.gc_growth_factor
        );

        let mut store = DataStore::with_policy(policy);
        if let Some(bytes) = self.initial_capacity_bytes {
            store.reserve(bytes);
        }
        Ok(store)
    }

    pub fn get_initial_capacity_bytes(&self) -> Option<u32> {
        self.initial_capacity_bytes
    }

    pub fn get_gc_marker_bytes(&self) -> Option<u32> {
        self.gc_marker_bytes
    }

    pub fn get_gc_growth_factor(&self) -> Option<u32> {
        self.gc_growth_factor
    }

    pub fn get_compact_handles_on_load(&self) -> Option<bool> {
        self.compact_handles_on_load
    }
}
