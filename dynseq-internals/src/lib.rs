#![no_std]
#![forbid(
    missing_docs,
    clippy::alloc_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::std_instead_of_core,
    clippy::missing_safety_doc,
    clippy::missing_docs_in_private_items,
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]
#![allow(rustdoc::private_intra_doc_links)]
//! Internal implementation crate for [`dynseq`].
//!
//! # Overview
//!
//! This crate contains the low-level, type-erased machinery that powers the
//! [`dynseq`] container library: the runtime type descriptor with its dispatch
//! shims, the reciprocal-division helper that turns byte distances into
//! element counts, the erased allocator record, and the counted byte-range
//! algorithms the container engines compose.
//!
//! **This crate is an implementation detail.** No semantic versioning
//! guarantees are provided. Users should depend on the [`dynseq`] crate, not
//! this one.
//!
//! # Architecture
//!
//! - **[`desc`]**: The runtime type record
//!   - [`TypeDesc`]: Layout, reciprocal stride, and callback table of one
//!     element type, plus the single-element lifecycle helpers
//!   - [`TypeOps`]: Nullable copy/move/destroy/compare/hash callbacks with
//!     `const` builders over concrete Rust types
//!
//! - **[`allocator`]**: The erased allocator
//!   - [`RawAlloc`]: Owned allocator record with [`Arc`]-based allocation
//!   - [`RawAllocRef`]: Borrowed reference to a record
//!   - [`AllocRef`]: The `Copy` handle passed on every allocating call,
//!     either a record borrow or the global allocator
//!   - [`AllocFrame`]: Staging storage for one element during self-aliasing
//!     inserts
//!   - [`AllocData`]: `#[repr(C)]` wrapper enabling field access on erased
//!     state
//!   - [`AllocVtable`]: Function pointers for type-erased dispatch
//!
//! - **[`handlers`]**: Trait definitions for allocation behavior
//!   - [`AllocHandler`]: Defines how storage is carved out of a state type
//!
//! - **[`range`]**: Counted algorithms over typed byte ranges: assigning and
//!   uninitialized fill/copy loops, the consuming relocate loops in both
//!   directions, and bulk destruction
//!
//! - **[`recip`]**: Precomputed reciprocal division for element-count math
//!   - [`Reciprocal`]: Magic-multiply constants for one divisor
//!
//! # Safety Strategy
//!
//! Type erasure requires careful handling to maintain Rust's type safety
//! guarantees. When an allocator record erases its state to
//! `AllocData<Erased>`, the vtable function pointers must still match the
//! concrete type stored in memory; when a container hands the descriptor a
//! byte pointer, the descriptor's callbacks must match the element behind it.
//!
//! This crate maintains safety through:
//!
//! - **Module-based encapsulation**: Safety-critical types keep fields
//!   module-private, making invariants locally verifiable within a single file
//! - **`#[repr(C)]` layout**: Enables safe field projection on type-erased
//!   pointers without constructing invalid references
//! - **Numbered caller obligations**: Every `unsafe fn` lists what the caller
//!   must ensure, and call sites answer the list point by point
//!
//! The descriptor's relocation protocol (see [`desc`]) fixes how moving and
//! destruction compose, so that element ownership transfers exactly once on
//! every path.
//!
//! [`dynseq`]: https://docs.rs/dynseq/latest/dynseq/
//! [`TypeDesc`]: desc::TypeDesc
//! [`TypeOps`]: desc::TypeOps
//! [`RawAlloc`]: allocator::RawAlloc
//! [`RawAllocRef`]: allocator::RawAllocRef
//! [`AllocRef`]: allocator::AllocRef
//! [`AllocFrame`]: allocator::AllocFrame
//! [`AllocData`]: allocator::data::AllocData
//! [`AllocVtable`]: allocator::vtable::AllocVtable
//! [`AllocHandler`]: handlers::AllocHandler
//! [`Reciprocal`]: recip::Reciprocal
//! [`Arc`]: triomphe::Arc

extern crate alloc;

mod allocator;
mod desc;
pub mod handlers;
pub mod range;
pub mod recip;
mod util;

pub use allocator::{AllocFrame, AllocRef, RawAlloc, RawAllocRef};
pub use desc::{
    CopyFn, DescriptorError, DropFn, EqualFn, HashFn, LessFn, MoveFn, TypeDesc, TypeOps,
};
