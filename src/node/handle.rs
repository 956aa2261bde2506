//! Generational handle packed into a node payload.

use std::fmt;

use crate::config::{DEFAULT_HANDLE_GENERATION, HANDLE_GENERATION_BITS, MAX_HANDLE_COUNT};

/// (index, generation) reference into a store's handle table.
///
/// The index selects a handle table entry; the generation must equal the
/// entry's generation for the handle to resolve. Reusing an entry bumps its
/// generation, so a stale copy of an old handle stops resolving instead of
/// aliasing whatever was allocated in its place.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u32);

impl Handle {
    /// Handle that resolves to nothing in a freshly built table.
    pub const DEFAULT: Handle =
        Handle(((MAX_HANDLE_COUNT - 1) << HANDLE_GENERATION_BITS) | DEFAULT_HANDLE_GENERATION);

    packed_fields! { u32 =>
        generation: 0, 3;
        index: 3, 24;
    }

    #[inline]
    pub fn new(index: u32, generation: u32) -> Handle {
        let mut h = Handle(0);
        h.set_index(index);
        h.set_generation(generation);
        h
    }

    /// The 27-bit payload stored in a by-reference node.
    #[inline]
    pub fn to_raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn from_raw(raw: u32) -> Handle {
        Handle(raw & ((1 << crate::config::NODE_VALUE_BITS) - 1))
    }
}

impl Default for Handle {
    fn default() -> Self {
        Handle::DEFAULT
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}@{})", self.index(), self.generation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_are_independent() {
        let mut h = Handle::new(12345, 5);
        assert_eq!(h.index(), 12345);
        assert_eq!(h.generation(), 5);
        h.set_generation(9);
        assert_eq!(h.generation(), 1);
        assert_eq!(h.index(), 12345);
    }

    #[test]
    fn default_handle_uses_top_index_and_default_generation() {
        assert_eq!(Handle::DEFAULT.index(), MAX_HANDLE_COUNT - 1);
        assert_eq!(Handle::DEFAULT.generation(), DEFAULT_HANDLE_GENERATION);
        assert_eq!(Handle::from_raw(Handle::DEFAULT.to_raw()), Handle::DEFAULT);
    }
}
