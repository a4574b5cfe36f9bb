#![cfg_attr(not(doc), no_std)]
#![deny(
    missing_docs,
    clippy::alloc_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::std_instead_of_core,
    clippy::missing_safety_doc,
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    clippy::as_ptr_cast_mut,
    clippy::ptr_as_ptr,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]
// Extra checks on nightly
#![cfg_attr(nightly_extra_checks, feature(rustdoc_missing_doc_code_examples))]
#![cfg_attr(nightly_extra_checks, forbid(rustdoc::missing_doc_code_examples))]
// Make docs.rs generate better docs
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Type-erased sequence containers driven by runtime descriptors.
//!
//! ## Overview
//!
//! This crate provides a vector, a doubly linked list, and a zero-terminated
//! byte string whose element type is not a compile-time parameter. Each
//! container is a plain struct of pointers and counters; the element type
//! lives in a [`TypeDesc`] record, built once and passed to every call that
//! needs to know the element's size, alignment, or lifecycle callbacks. One
//! compiled copy of each engine therefore serves every element type, and
//! element types can be assembled at runtime from layout and callbacks that
//! no Rust type spells out.
//!
//! Storage comes from allocator records rather than a type parameter: an
//! [`AllocRef`] handle accompanies every allocating call, the containers
//! never store one, and [`SharedAlloc`] owns a record built from any
//! [`handlers::AllocHandler`] implementation. The trade for this flexibility
//! is an `unsafe` mutation surface: the compiler cannot check that the same
//! descriptor and allocator accompany a container its whole life, so the
//! caller promises it.
//!
//! ## Quick Example
//!
//! ```
//! use core::ptr::NonNull;
//!
//! use dynseq::{AllocRef, TypeDesc, Vector};
//!
//! let desc = TypeDesc::of::<i64>().unwrap();
//! let alloc = AllocRef::global();
//! let mut values = Vector::new();
//!
//! for n in 1i64..=3 {
//!     // SAFETY: `desc` and `alloc` accompany this vector on every call,
//!     // and the pushed value lives outside its storage.
//!     unsafe { values.push_copy(&desc, alloc, NonNull::from(&n).cast()).unwrap() };
//! }
//!
//! assert_eq!(values.len(&desc), 3);
//! // SAFETY: index 1 is within the length, same descriptor as above.
//! let middle = unsafe { values.get(&desc, 1).cast::<i64>().read() };
//! assert_eq!(middle, 2);
//!
//! // SAFETY: same descriptor and allocator as every prior call.
//! unsafe { values.destroy(&desc, alloc) };
//! ```
//!
//! ## Core Concepts
//!
//! On a mechanical level, every container call pairs three things:
//! - The **container**, a bare struct owning raw storage.
//! - The **descriptor**, a [`TypeDesc`] telling the engine how big an element
//!   is and how to destroy, copy, move, and compare one.
//! - The **allocator**, an [`AllocRef`] handle naming where storage comes
//!   from and goes back to.
//!
//! The **descriptor** is the stand-in for a generic parameter. For a Rust
//! type, [`TypeDesc::of`] derives everything from the type itself;
//! [`TypeDesc::define_with`] accepts an explicit layout and a [`TypeOps`]
//! callback table instead, which is what makes runtime-assembled element
//! types possible. A descriptor with no copy and no move callback relocates
//! elements by plain byte transfer, which is exactly right for Rust types;
//! callbacks switch individual operations over to construct-and-destroy
//! protocols. One container must see one descriptor for life. Nothing ties a
//! descriptor to the container that uses it, so the engines restate this
//! obligation on every call.
//!
//! The **allocator** handle works the same way: one container must draw all
//! its storage from one allocator identity. Handles are borrowed and
//! copyable; [`SharedAlloc`] is the owning form, reference-counted so clones
//! share an identity. [`AllocRef::global`] denotes the process-global
//! allocator without any record behind it. Whole-container assignment is
//! where identities meet: [`AllocPropagation`] chooses whether the
//! destination adopts the source's allocator or keeps its own, and the
//! engines pick elementwise or wholesale transfer accordingly.
//!
//! The **engines** are deliberately low-level. Mutations take raw element
//! pointers, return [`CapacityError`] when storage runs out, and leave the
//! container in a usable state on every failure path. Reading back is the
//! safe layer: [`Vector::elements`] and [`List::elements`] iterate borrowed
//! element pointers, and [`ZString`] exposes its content as byte slices.
//!
//! For implementation details, see the [`dynseq-internals`] crate.
//!
//! [`dynseq-internals`]: dynseq_internals
//!
//! ## Runtime-Assembled Element Types
//!
//! Descriptors for Rust types can opt into deep copying, and descriptors for
//! non-Rust layouts are built from raw parts:
//!
//! ```
//! use core::ptr::NonNull;
//!
//! use dynseq::{AllocRef, List, TypeDesc, TypeOps};
//!
//! // A String descriptor whose copies clone instead of sharing buffers.
//! let desc = TypeDesc::define_with(
//!     size_of::<String>(),
//!     align_of::<String>(),
//!     TypeOps::for_type::<String>().with_clone::<String>(),
//! )
//! .unwrap();
//! let alloc = AllocRef::global();
//!
//! let mut names = List::construct(alloc).unwrap();
//! let name = String::from("ada");
//! // SAFETY: `desc` and `alloc` accompany this list on every call, and the
//! // source string lives outside its nodes.
//! unsafe {
//!     names
//!         .insert_one_copy(&desc, alloc, names.end(), NonNull::from(&name).cast())
//!         .unwrap();
//! }
//! assert_eq!(names.len(), 1);
//!
//! // SAFETY: same descriptor and allocator as every prior call.
//! unsafe { names.destroy(&desc, alloc) };
//! ```
//!
//! ## Project Goals
//!
//! - **One engine per shape**: the vector, list, and string are compiled
//!   once each and reused for every element type, instead of once per
//!   instantiation.
//! - **Reference layouts**: the vector is three pointers, the list is a
//!   sentinel pointer and a length, and the string keeps a terminator byte
//!   past its content, so the structures interoperate with code that expects
//!   those exact shapes.
//! - **Pluggable storage**: any [`handlers::AllocHandler`] implementation
//!   can back a container, with identity checks that keep storage and
//!   allocator paired.
//! - **Fail-soft**: allocation failure and size overflow surface as
//!   [`CapacityError`] values, never as aborts, and failed calls leave their
//!   container destroyable and usable.
//! - **Honest `unsafe`**: every obligation the compiler cannot check is
//!   spelled out on the operation that carries it, and the safe reading
//!   layer is genuinely safe.

extern crate alloc;

pub mod prelude;

mod errors;
mod list;
mod policy;
mod shared_alloc;
mod vector;
mod zstring;

pub use dynseq_internals::{
    AllocFrame, AllocRef, CopyFn, DescriptorError, DropFn, EqualFn, HashFn, LessFn, MoveFn,
    RawAlloc, RawAllocRef, TypeDesc, TypeOps, handlers,
};

pub use self::{
    errors::CapacityError,
    list::{List, ListCursor, ListElements},
    policy::AllocPropagation,
    shared_alloc::SharedAlloc,
    vector::{Cursor, Elements, Vector},
    zstring::ZString,
};
