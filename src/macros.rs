//! # Internal Macros
//!
//! This module provides internal macros for reducing boilerplate in the data
//! store.
//!
//! ## packed_fields!
//!
//! Generates getter and setter methods for bit fields packed into a newtype
//! over an unsigned integer. Handles, handle table entries and container
//! headers are all words with several fields in them, and every one of them
//! needs the same shift/mask/merge code.
//!
//! ### Usage
//!
//! ```ignore
//! #[derive(Clone, Copy)]
//! struct Entry(u32);
//!
//! impl Entry {
//!     packed_fields! { u32 =>
//!         offset: 0, 29;
//!         generation: 29, 3;
//!     }
//! }
//!
//! // Generates:
//! // pub fn offset(&self) -> u32 { (self.0 >> 0) & 0x1FFF_FFFF }
//! // pub fn set_offset(&mut self, val: u32) { ... }
//! // pub fn generation(&self) -> u32 { (self.0 >> 29) & 0x7 }
//! // pub fn set_generation(&mut self, val: u32) { ... }
//! ```
//!
//! Setters silently truncate `val` to the field width, matching what a C
//! bitfield assignment would do. Callers that care about overflow check the
//! range before calling.

/// Generates getter and setter methods for bit fields of a packed newtype.
#[macro_export]
macro_rules! packed_fields {
    (@impl $repr:ty, $field:ident, $shift:literal, $bits:literal) => {
        ::paste::paste! {
            #[inline]
            pub fn $field(&self) -> u32 {
                ((self.0 >> $shift) & (((1 as $repr) << $bits) - 1)) as u32
            }

            #[inline]
            pub fn [<set_ $field>](&mut self, val: u32) {
                let mask: $repr = (((1 as $repr) << $bits) - 1) << $shift;
                self.0 = (self.0 & !mask) | (((val as $repr) << $shift) & mask);
            }
        }
    };
    ($repr:ty => $($field:ident : $shift:literal, $bits:literal);* $(;)?) => {
        $(
            $crate::packed_fields!(@impl $repr, $field, $shift, $bits);
        )*
    };
}
