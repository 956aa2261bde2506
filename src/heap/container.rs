//! Two-slot header shared by arrays, strings and tables.

use crate::config::CONTAINER_HEADER_SLOTS;

/// Container header as read from (slot 0, slot 1).
///
/// ```text
/// slot 0  bits 0..31 capacity excluding null   bit 31 has null storage
/// slot 1  bits 0..31 count excluding null      bit 31 has null
/// ```
///
/// The null flags only mean something for tables. Arrays and strings keep
/// them clear.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub(crate) struct Container(u64);

impl Container {
    packed_fields! { u64 =>
        capacity: 0, 31;
        has_null_storage_bit: 31, 1;
        count: 32, 31;
        has_null_bit: 63, 1;
    }

    pub(crate) fn new(capacity: u32, count: u32) -> Container {
        let mut c = Container(0);
        c.set_capacity(capacity);
        c.set_count(count);
        c
    }

    /// Reads the header at `offset`, if both slots are in bounds.
    #[inline]
    pub(crate) fn read(data: &[u32], offset: u32) -> Option<Container> {
        let o = offset as usize;
        let lo = *data.get(o)?;
        let hi = *data.get(o + 1)?;
        Some(Container(lo as u64 | ((hi as u64) << 32)))
    }

    /// Writes the header at `offset`. Out-of-bounds writes are dropped.
    #[inline]
    pub(crate) fn write(self, data: &mut [u32], offset: u32) {
        let o = offset as usize;
        if let Some(slots) = data.get_mut(o..o + CONTAINER_HEADER_SLOTS as usize) {
            slots[0] = self.0 as u32;
            slots[1] = (self.0 >> 32) as u32;
        } else {
            debug_assert!(false, "container header write out of bounds at {}", offset);
        }
    }

    #[inline]
    pub(crate) fn has_null_storage(self) -> bool {
        self.has_null_storage_bit() != 0
    }

    #[inline]
    pub(crate) fn set_has_null_storage(&mut self, v: bool) {
        self.set_has_null_storage_bit(v as u32);
    }

    #[inline]
    pub(crate) fn has_null(self) -> bool {
        self.has_null_bit() != 0
    }

    #[inline]
    pub(crate) fn set_has_null(&mut self, v: bool) {
        self.set_has_null_bit(v as u32);
    }

    /// Capacity including the hidden null slot, if any.
    #[inline]
    pub(crate) fn total_capacity(self) -> u32 {
        self.capacity() + self.has_null_storage_bit()
    }
}
