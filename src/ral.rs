//! A RAL-like module for GPDMA register access
//!
//! The device crates generated from SVD files describe each GPDMA channel
//! as a loose collection of symbols. This module represents a channel as a
//! `#[repr(C)]` struct, and the controller as an array of those structs, while
//! still exposing an interface that works with the RAL macros.

#![allow(
    non_snake_case, // Compatibility with RAL
    non_upper_case_globals, // Field offset and mask constants
)]

pub use ral_registers::{modify_reg, read_reg, write_reg};
use ral_registers::{RORegister, RWRegister, WORegister};

/// Declares register field modules the way the RAL lays them out
///
/// Each field becomes a module with an `offset`, a `mask`, and the (empty)
/// `R`, `W` and `RW` enumerated value modules that the RAL macros import.
macro_rules! fields {
    ($($reg:ident { $($field:ident: $offset:literal, $width:literal;)* })*) => {
        $(
            pub mod $reg {
                $(
                    pub mod $field {
                        pub const offset: u32 = $offset;
                        pub const mask: u32 = (((1u64 << $width) - 1) << $offset) as u32;
                        pub mod R {}
                        pub mod W {}
                        pub mod RW {}
                    }
                )*
            }
        )*
    };
}

pub mod gpdma;

//
// Helper types for static memory
//
// Similar to the RAL's `Instance` type, but more copy.
//

pub(crate) struct Static<T>(pub(crate) *const T);
impl<T> core::ops::Deref for Static<T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        // Safety: pointer points to static memory (peripheral memory)
        unsafe { &*self.0 }
    }
}
impl<T> Clone for Static<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Static<T> {}
