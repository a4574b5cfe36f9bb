//! Allocator identity policy for whole-container assignment.
//!
//! Containers never store an allocator; the embedding application owns the
//! records and passes a handle on every allocating call. When one container is
//! assigned from another, the application must also decide which identity the
//! destination uses afterwards. [`AllocPropagation`] carries that decision
//! into [`copy_assign_from`](crate::Vector::copy_assign_from) and
//! [`move_assign_from`](crate::Vector::move_assign_from) on both engines.
//!
//! Propagating matches the source and destination identities, which makes
//! move assignment a pointer steal. Retaining keeps the destination identity
//! and forces element-by-element work whenever the identities differ.

/// Whether a whole-container assignment adopts the source's allocator
/// identity.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Hash)]
pub enum AllocPropagation {
    /// The destination adopts the source's identity; the destination handle
    /// passed by `&mut` is overwritten with the source handle.
    Propagate,
    /// The destination keeps its own identity and routes every element through
    /// it.
    #[default]
    Retain,
}
