//! # Heap and Handle Table
//!
//! All by-reference data of a store lives in one growable `Vec<u32>` of slots.
//! Nodes never point into it directly; they carry a [`Handle`] whose index
//! selects a [`HandleDataOffset`] entry holding the current slot offset.
//! Moving data (reallocation, garbage collection) therefore only rewrites the
//! handle table entry, and every copy of the handle stays valid.
//!
//! ## Layout
//!
//! ```text
//! data:     [root][hdr hdr payload...][hdr hdr payload...][lo hi]...
//!            ^ slot 0 holds the root DataNode
//!
//! handles:  [gen|offset][gen|offset][FREE][gen|offset]...
//!            index 0     index 1     index 2 ...
//! ```
//!
//! Storage is bump-allocated at the tail. Growing the most recently allocated
//! region extends it in place; growing anything else copies it to the tail
//! and leaves the old region as garbage for the collector.
//!
//! ## Handle Binding
//!
//! The handle table length is always a power of two once anything has been
//! allocated. Binding scans forward from a cursor for a free entry, bumps
//! its 3-bit generation and stores the offset. When every entry is in use,
//! the table doubles and the scan resumes at the first new entry.
//!
//! This module holds the mechanics only. The policy of when to collect
//! garbage before allocating lives with the store.

mod container;
mod handle_table;

pub(crate) use container::Container;
pub(crate) use handle_table::HandleDataOffset;

use eyre::{bail, ensure, Result};

use crate::config::{INVALID_HEAP_OFFSET, MAX_HANDLE_COUNT, SLOT_BYTES};
use crate::node::{DataNode, Handle};

/// Next power of two at or above `v`, with `next_pow2(0) == 0`.
#[inline]
pub(crate) fn next_pow2(v: u32) -> u32 {
    if v == 0 {
        0
    } else {
        v.checked_next_power_of_two().unwrap_or(1 << 31)
    }
}

/// Slot storage and handle table of one store.
#[derive(Clone, Debug)]
pub(crate) struct Heap {
    pub(crate) data: Vec<u32>,
    pub(crate) handles: Vec<HandleDataOffset>,
    pub(crate) next_handle: u32,
    pub(crate) allocated_handles: u32,
    pub(crate) size_after_last_gc: u32,
}

impl Heap {
    pub(crate) fn new(gc_marker_bytes: u32) -> Heap {
        Heap {
            data: Vec::new(),
            handles: Vec::new(),
            next_handle: 0,
            allocated_handles: 0,
            size_after_last_gc: gc_marker_bytes,
        }
    }

    // ========================================================================
    // ROOT
    // ========================================================================

    /// The root node, or Null for a store with no data.
    #[inline]
    pub(crate) fn root(&self) -> DataNode {
        self.data
            .first()
            .map(|r| DataNode::from_raw(*r))
            .unwrap_or(DataNode::NULL)
    }

    #[inline]
    pub(crate) fn set_root(&mut self, node: DataNode) {
        match self.data.first_mut() {
            Some(r) => *r = node.raw(),
            None => self.data.push(node.raw()),
        }
    }

    /// Drops all data and leaves a single Null root slot. Handle generations
    /// survive so stale handles keep failing to resolve.
    pub(crate) fn reset(&mut self, gc_marker_bytes: u32) {
        for entry in &mut self.handles {
            entry.release();
        }
        self.allocated_handles = 0;
        self.data.clear();
        self.data.push(DataNode::NULL.raw());
        self.size_after_last_gc = gc_marker_bytes;
    }

    // ========================================================================
    // SIZES
    // ========================================================================

    #[inline]
    pub(crate) fn data_bytes(&self) -> u32 {
        (self.data.len() as u32).saturating_mul(SLOT_BYTES)
    }

    pub(crate) fn capacity_bytes(&self) -> usize {
        self.data.capacity() * SLOT_BYTES as usize
    }

    pub(crate) fn total_memory_bytes(&self) -> usize {
        self.capacity_bytes() + self.handles.capacity() * std::mem::size_of::<HandleDataOffset>()
    }

    /// Handle table is full and cannot grow.
    #[inline]
    pub(crate) fn handles_saturated(&self) -> bool {
        self.allocated_handles > 0
            && self.handles.len() as u32 == self.allocated_handles
            && self.handles.len() as u32 >= MAX_HANDLE_COUNT
    }

    // ========================================================================
    // ALLOCATION
    // ========================================================================

    /// Appends `slots` zeroed slots and returns the offset of the first.
    pub(crate) fn append_raw(&mut self, slots: u32) -> Result<u32> {
        let offset = self.data.len() as u32;
        let end = offset as u64 + slots as u64;
        ensure!(
            end < INVALID_HEAP_OFFSET as u64,
            "heap exhausted: {} slots requested at offset {}",
            slots,
            offset
        );
        self.data.resize(end as usize, 0);
        Ok(offset)
    }

    /// Binds a free handle table entry to `offset`.
    pub(crate) fn bind_handle(&mut self, offset: u32) -> Result<Handle> {
        let len = self.handles.len() as u32;
        if len == self.allocated_handles || !len.is_power_of_two() {
            let new_len = next_pow2(len.saturating_add(1).max(1));
            if new_len > MAX_HANDLE_COUNT {
                bail!("handle table exhausted: {} handles in use", self.allocated_handles);
            }
            self.handles.resize(new_len as usize, HandleDataOffset::FREE);
            self.next_handle = len;
        }

        let mask = self.handles.len() as u32 - 1;
        loop {
            self.next_handle &= mask;
            if !self.handles[self.next_handle as usize].is_bound() {
                break;
            }
            self.next_handle += 1;
        }

        let index = self.next_handle;
        let entry = &mut self.handles[index as usize];
        let generation = (entry.generation() + 1) & 0x7;
        *entry = HandleDataOffset::new(offset, generation);

        self.next_handle += 1;
        self.allocated_handles += 1;
        Ok(Handle::new(index, generation))
    }

    /// Grows the region of `handle` from `old_slots` to `new_slots`.
    ///
    /// Extends in place when the region ends at the heap tail, else copies it
    /// to the tail and repoints the handle. Returns the region's offset.
    pub(crate) fn grow_region(&mut self, handle: Handle, old_slots: u32, new_slots: u32) -> Result<u32> {
        let Some(offset) = self.resolve(handle) else {
            bail!("reallocate of unresolvable handle {:?}", handle);
        };
        debug_assert!(new_slots >= old_slots);
        ensure!(
            offset as u64 + old_slots as u64 <= self.data.len() as u64,
            "reallocate: region of {} slots at {} runs past the heap",
            old_slots,
            offset
        );

        if offset as usize + old_slots as usize == self.data.len() {
            self.append_raw(new_slots - old_slots)?;
            return Ok(offset);
        }

        let new_offset = self.append_raw(new_slots)?;
        let (o, n) = (offset as usize, new_offset as usize);
        self.data.copy_within(o..o + old_slots as usize, n);
        self.repoint(handle, new_offset);
        Ok(new_offset)
    }

    // ========================================================================
    // RESOLUTION
    // ========================================================================

    /// Current slot offset of `handle`, if it is live and in range.
    #[inline]
    pub(crate) fn resolve(&self, handle: Handle) -> Option<u32> {
        let entry = self.handles.get(handle.index() as usize)?;
        if !entry.is_bound() || entry.generation() != handle.generation() {
            return None;
        }
        let offset = entry.offset();
        ((offset as usize) < self.data.len()).then_some(offset)
    }

    #[inline]
    pub(crate) fn repoint(&mut self, handle: Handle, offset: u32) {
        if let Some(entry) = self.handles.get_mut(handle.index() as usize) {
            entry.set_offset(offset);
        }
    }

    #[inline]
    pub(crate) fn slot(&self, index: u32) -> Option<u32> {
        self.data.get(index as usize).copied()
    }

    #[inline]
    pub(crate) fn set_slot(&mut self, index: u32, value: u32) {
        if let Some(s) = self.data.get_mut(index as usize) {
            *s = value;
        }
    }

    /// Header of the container `node` refers to, with its offset.
    #[inline]
    pub(crate) fn container(&self, node: DataNode) -> Option<(u32, Container)> {
        let offset = self.resolve(node.handle())?;
        Some((offset, Container::read(&self.data, offset)?))
    }

    pub(crate) fn recount_allocated_handles(&mut self) {
        self.allocated_handles = self.handles.iter().filter(|e| e.is_bound()).count() as u32;
    }
}
