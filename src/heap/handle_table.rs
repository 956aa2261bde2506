//! Handle table entries.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::config::INVALID_HEAP_OFFSET;

/// Maps one handle index to a heap slot offset.
///
/// ```text
/// bit  0..29  offset into the heap, in slots (INVALID_HEAP_OFFSET when free)
/// bit 29..32  generation
/// ```
///
/// Freeing an entry keeps its generation, so the next handle bound to the
/// same index gets a different generation than any handle issued before.
#[derive(Clone, Copy, PartialEq, Eq, Debug, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(transparent)]
pub(crate) struct HandleDataOffset(u32);

impl HandleDataOffset {
    /// A free entry with generation 0, the furthest from `Handle::DEFAULT`'s 7.
    pub(crate) const FREE: HandleDataOffset = HandleDataOffset(INVALID_HEAP_OFFSET);

    packed_fields! { u32 =>
        offset: 0, 29;
        generation: 29, 3;
    }

    pub(crate) fn new(offset: u32, generation: u32) -> HandleDataOffset {
        let mut e = HandleDataOffset(0);
        e.set_offset(offset);
        e.set_generation(generation);
        e
    }

    #[inline]
    pub(crate) fn is_bound(self) -> bool {
        self.offset() != INVALID_HEAP_OFFSET
    }

    #[inline]
    pub(crate) fn release(&mut self) {
        self.set_offset(INVALID_HEAP_OFFSET);
    }
}

impl Default for HandleDataOffset {
    fn default() -> Self {
        HandleDataOffset::FREE
    }
}
