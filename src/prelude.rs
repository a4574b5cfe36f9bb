//! Commonly used items for convenient importing.
//!
//! The prelude module re-exports the most frequently used types and traits
//! from the dynseq library. This allows you to import everything a typical
//! container call site needs with a single use statement.
//!
//! # Usage
//!
//! ```rust
//! use core::ptr::NonNull;
//!
//! use dynseq::prelude::*;
//!
//! let desc = TypeDesc::of::<u32>().unwrap();
//! let alloc = AllocRef::global();
//! let mut values = Vector::new();
//!
//! for n in 0u32..4 {
//!     // SAFETY: `desc` and `alloc` accompany this vector on every call,
//!     // and `n` lives outside its storage.
//!     unsafe { values.push_copy(&desc, alloc, NonNull::from(&n).cast()).unwrap() };
//! }
//!
//! let total: u32 = values
//!     .elements(&desc)
//!     // SAFETY: the vector holds initialized `u32` elements.
//!     .map(|element| unsafe { element.cast::<u32>().read() })
//!     .sum();
//! assert_eq!(total, 6);
//!
//! // SAFETY: same descriptor and allocator as every prior call.
//! unsafe { values.destroy(&desc, alloc) };
//! ```
//!
//! # What's Included
//!
//! This prelude includes:
//!
//! - **[`Vector`]**, **[`List`]**, **[`ZString`]**: the three container engines
//! - **[`TypeDesc`]** and **[`TypeOps`]**: runtime element descriptors
//! - **[`AllocRef`]** and **[`SharedAlloc`]**: allocator handles and shared
//!   allocator ownership
//! - **[`CapacityError`]**: the error every fallible container call returns
//! - **[`AllocPropagation`]**: allocator transfer policy for whole-container
//!   assignment
//! - **[`handlers`]**: the trait for plugging in custom allocation strategies
//!
//! # When to Use the Prelude
//!
//! Use the prelude when you drive the containers directly and want the common
//! vocabulary in scope at once. For more specialized needs, import specific
//! items directly from their respective modules.

pub use crate::{
    AllocPropagation, AllocRef, CapacityError, List, SharedAlloc, TypeDesc, TypeOps, Vector,
    ZString, handlers,
};
