//! Vtable for type-erased allocator operations.
//!
//! This module contains the [`AllocVtable`] which enables calling handler
//! methods on an allocator record when its concrete state type `S` and handler
//! type `H` have been erased. The vtable stores function pointers that dispatch
//! to the correct typed implementations.
//!
//! This module encapsulates the fields of [`AllocVtable`] so they cannot be
//! accessed directly. This visibility restriction guarantees the safety
//! invariant: **the vtable's type parameters must match the actual state type
//! and handler stored in the [`AllocData`]**.
//!
//! # Safety Invariant
//!
//! This invariant is maintained because vtables are created as `&'static`
//! references via [`AllocVtable::new`], which pairs the function pointers with
//! specific types `S` and `H` at compile time.

use core::{alloc::Layout, any::TypeId, ptr::NonNull};

use crate::{
    allocator::{
        data::AllocData,
        raw::{RawAlloc, RawAllocRef},
    },
    handlers::AllocHandler,
    util::Erased,
};

/// Vtable for type-erased allocator operations.
///
/// Contains function pointers for performing operations on an allocator record
/// without knowing its concrete state type at compile time.
///
/// # Safety Invariant
///
/// The fields `drop`, `clone_arc`, `strong_count`, `allocate`, and
/// `deallocate` are guaranteed to point to the functions defined below
/// instantiated with the state type `S` and handler type `H` that were used to
/// create this [`AllocVtable`].
pub(crate) struct AllocVtable {
    /// Gets the [`TypeId`] of the state type that was used to create this
    /// [`AllocVtable`].
    type_id: fn() -> TypeId,
    /// Gets the [`TypeId`] of the handler that was used to create this
    /// [`AllocVtable`].
    handler_type_id: fn() -> TypeId,
    /// Gets the [`core::any::type_name`] of the state type that was used to
    /// create this [`AllocVtable`].
    type_name: fn() -> &'static str,
    /// Drops the [`triomphe::Arc<AllocData<S>>`] instance pointed to by this
    /// pointer.
    drop: unsafe fn(NonNull<AllocData<Erased>>),
    /// Clones the [`triomphe::Arc<AllocData<S>>`] pointed to by this pointer.
    clone_arc: unsafe fn(NonNull<AllocData<Erased>>) -> RawAlloc,
    /// Gets the strong count of the [`triomphe::Arc<AllocData<S>>`] pointed to
    /// by this pointer.
    strong_count: unsafe fn(NonNull<AllocData<Erased>>) -> usize,
    /// Allocates a block through the handler.
    allocate: unsafe fn(RawAllocRef<'_>, Layout) -> Option<NonNull<u8>>,
    /// Returns a block to the handler.
    deallocate: unsafe fn(RawAllocRef<'_>, NonNull<u8>, Layout),
}

impl AllocVtable {
    /// Creates a new [`AllocVtable`] for the state type `S` and the handler
    /// type `H`.
    pub(super) const fn new<S: 'static, H: AllocHandler<S>>() -> &'static Self {
        const {
            &Self {
                type_id: TypeId::of::<S>,
                handler_type_id: TypeId::of::<H>,
                type_name: core::any::type_name::<S>,
                drop: drop::<S>,
                clone_arc: clone_arc::<S>,
                strong_count: strong_count::<S>,
                allocate: allocate::<S, H>,
                deallocate: deallocate::<S, H>,
            }
        }
    }

    /// Gets the [`TypeId`] of the state type that was used to create this
    /// [`AllocVtable`].
    #[inline]
    pub(super) fn type_id(&self) -> TypeId {
        (self.type_id)()
    }

    /// Gets the [`TypeId`] of the handler that was used to create this
    /// [`AllocVtable`].
    #[inline]
    pub(super) fn handler_type_id(&self) -> TypeId {
        (self.handler_type_id)()
    }

    /// Gets the [`core::any::type_name`] of the state type that was used to
    /// create this [`AllocVtable`].
    #[inline]
    pub(super) fn type_name(&self) -> &'static str {
        (self.type_name)()
    }

    /// Drops the `triomphe::Arc<AllocData<S>>` instance pointed to by this
    /// pointer.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. The pointer comes from a [`triomphe::Arc<AllocData<S>>`] turned into
    ///    a pointer via [`triomphe::Arc::into_raw`]
    /// 2. This [`AllocVtable`] must be a vtable for the state type stored in
    ///    the [`AllocData`].
    /// 3. This method releases one strong reference, so the caller must be
    ///    able to transfer ownership of that reference and must not use the
    ///    pointer through it afterwards.
    #[inline]
    pub(super) unsafe fn drop(&self, ptr: NonNull<AllocData<Erased>>) {
        // SAFETY: We know that `self.drop` points to the function `drop::<S>`
        // below. That function's safety requirements are upheld:
        // 1. Guaranteed by the caller
        // 2. Guaranteed by the caller
        // 3. Guaranteed by the caller
        unsafe { (self.drop)(ptr) }
    }

    /// Clones the [`triomphe::Arc<AllocData<S>>`] pointed to by this pointer.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. The pointer comes from a [`triomphe::Arc<AllocData<S>>`] turned into
    ///    a pointer via [`triomphe::Arc::into_raw`]
    /// 2. This [`AllocVtable`] must be a vtable for the state type stored in
    ///    the [`AllocData`].
    #[inline]
    pub(super) unsafe fn clone_arc(&self, ptr: NonNull<AllocData<Erased>>) -> RawAlloc {
        // SAFETY: We know that `self.clone_arc` points to the function
        // `clone_arc::<S>` below. That function's safety requirements are
        // upheld:
        // 1. Guaranteed by the caller
        // 2. Guaranteed by the caller
        unsafe { (self.clone_arc)(ptr) }
    }

    /// Gets the strong count of the [`triomphe::Arc<AllocData<S>>`] pointed to
    /// by this pointer.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. The pointer comes from a [`triomphe::Arc<AllocData<S>>`] turned into
    ///    a pointer via [`triomphe::Arc::into_raw`]
    /// 2. This [`AllocVtable`] must be a vtable for the state type stored in
    ///    the [`AllocData`].
    #[inline]
    pub(super) unsafe fn strong_count(&self, ptr: NonNull<AllocData<Erased>>) -> usize {
        // SAFETY: We know that `self.strong_count` points to the function
        // `strong_count::<S>` below. That function's safety requirements are
        // upheld:
        // 1. Guaranteed by the caller
        // 2. Guaranteed by the caller
        unsafe { (self.strong_count)(ptr) }
    }

    /// Allocates a block using the [`H::allocate`] function used when creating
    /// this [`AllocVtable`].
    ///
    /// [`H::allocate`]: AllocHandler::allocate
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. This [`AllocVtable`] must be a vtable for the state type stored in
    ///    the [`RawAllocRef`].
    /// 2. `layout.size()` is nonzero
    #[inline]
    pub(super) unsafe fn allocate(
        &self,
        ptr: RawAllocRef<'_>,
        layout: Layout,
    ) -> Option<NonNull<u8>> {
        // SAFETY: We know that `self.allocate` points to the function
        // `allocate::<S, H>` below. That function's safety requirements are
        // upheld:
        // 1. Guaranteed by the caller
        // 2. Guaranteed by the caller
        unsafe { (self.allocate)(ptr, layout) }
    }

    /// Returns a block using the [`H::deallocate`] function used when creating
    /// this [`AllocVtable`].
    ///
    /// [`H::deallocate`]: AllocHandler::deallocate
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. This [`AllocVtable`] must be a vtable for the state type stored in
    ///    the [`RawAllocRef`].
    /// 2. `block` was returned by [`AllocVtable::allocate`] on the same record
    ///    with the same `layout`
    /// 3. `block` is not used after this call
    #[inline]
    pub(super) unsafe fn deallocate(
        &self,
        ptr: RawAllocRef<'_>,
        block: NonNull<u8>,
        layout: Layout,
    ) {
        // SAFETY: We know that `self.deallocate` points to the function
        // `deallocate::<S, H>` below. That function's safety requirements are
        // upheld:
        // 1. Guaranteed by the caller
        // 2. Guaranteed by the caller
        // 3. Guaranteed by the caller
        unsafe { (self.deallocate)(ptr, block, layout) }
    }
}

/// Drops the [`triomphe::Arc<AllocData<S>>`] instance pointed to by this
/// pointer.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. The pointer comes from a [`triomphe::Arc<AllocData<S>>`] turned into a
///    pointer via [`triomphe::Arc::into_raw`]
/// 2. The state type `S` matches the actual state type stored in the
///    [`AllocData`]
/// 3. This method releases one strong reference, so the caller must be able to
///    transfer ownership of that reference and must not use the pointer
///    through it afterwards.
unsafe fn drop<S: 'static>(ptr: NonNull<AllocData<Erased>>) {
    let ptr: *const AllocData<S> = ptr.cast::<AllocData<S>>().as_ptr();
    // SAFETY: The pointer has the correct type and came from `Arc::into_raw`
    // (guaranteed by the caller); after `from_raw` the reference it carried is
    // consumed and not accessed again.
    let arc = unsafe { triomphe::Arc::from_raw(ptr) };
    core::mem::drop(arc);
}

/// Clones the [`triomphe::Arc<AllocData<S>>`] pointed to by this pointer.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. The pointer comes from a [`triomphe::Arc<AllocData<S>>`] turned into a
///    pointer via [`triomphe::Arc::into_raw`]
/// 2. The state type `S` matches the actual state type stored in the
///    [`AllocData`]
unsafe fn clone_arc<S: 'static>(ptr: NonNull<AllocData<Erased>>) -> RawAlloc {
    let ptr: *const AllocData<S> = ptr.cast::<AllocData<S>>().as_ptr();

    // SAFETY: The pointer is valid and came from `Arc::into_raw` with the
    // correct type (guaranteed by the caller), which fulfills the requirements
    // for `ArcBorrow::from_ptr`.
    let arc_borrow = unsafe { triomphe::ArcBorrow::from_ptr(ptr) };

    let arc = arc_borrow.clone_arc();
    RawAlloc::from_arc(arc)
}

/// Gets the strong count of the [`triomphe::Arc<AllocData<S>>`] pointed to by
/// this pointer.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. The pointer comes from a [`triomphe::Arc<AllocData<S>>`] turned into a
///    pointer via [`triomphe::Arc::into_raw`]
/// 2. The state type `S` matches the actual state type stored in the
///    [`AllocData`]
unsafe fn strong_count<S: 'static>(ptr: NonNull<AllocData<Erased>>) -> usize {
    let ptr: *const AllocData<S> = ptr.cast::<AllocData<S>>().as_ptr();

    // SAFETY: The pointer is valid and came from `Arc::into_raw` with the
    // correct type (guaranteed by the caller), which fulfills the requirements
    // for `ArcBorrow::from_ptr`.
    let arc_borrow = unsafe { triomphe::ArcBorrow::from_ptr(ptr) };

    triomphe::ArcBorrow::strong_count(&arc_borrow)
}

/// Allocates a block using the handler's allocate implementation.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. The type `S` matches the actual state type stored in the [`AllocData`]
/// 2. `layout.size()` is nonzero
unsafe fn allocate<S: 'static, H: AllocHandler<S>>(
    ptr: RawAllocRef<'_>,
    layout: Layout,
) -> Option<NonNull<u8>> {
    // SAFETY:
    // 1. Guaranteed by the caller
    let state: &S = unsafe { ptr.state_downcast_unchecked::<S>() };
    H::allocate(state, layout)
}

/// Returns a block using the handler's deallocate implementation.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. The type `S` matches the actual state type stored in the [`AllocData`]
/// 2. `block` was returned by [`AllocHandler::allocate`] on this same state
///    with this same `layout`
/// 3. `block` is not used after this call
unsafe fn deallocate<S: 'static, H: AllocHandler<S>>(
    ptr: RawAllocRef<'_>,
    block: NonNull<u8>,
    layout: Layout,
) {
    // SAFETY:
    // 1. Guaranteed by the caller
    let state: &S = unsafe { ptr.state_downcast_unchecked::<S>() };
    // SAFETY: `H::deallocate`'s requirements are upheld:
    // 1. Guaranteed by the caller (obligation 2)
    // 2. Guaranteed by the caller (obligation 3)
    unsafe { H::deallocate(state, block, layout) }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PassThrough;
    impl AllocHandler<()> for PassThrough {
        fn allocate(_state: &(), layout: Layout) -> Option<NonNull<u8>> {
            // SAFETY: the vtable contract guarantees a nonzero layout size.
            NonNull::new(unsafe { alloc::alloc::alloc(layout) })
        }

        unsafe fn deallocate(_state: &(), ptr: NonNull<u8>, layout: Layout) {
            // SAFETY: the pointer came from `alloc::alloc::alloc` with this
            // layout.
            unsafe { alloc::alloc::dealloc(ptr.as_ptr(), layout) }
        }
    }

    #[test]
    fn test_alloc_vtable_is_shared() {
        let vtable1 = AllocVtable::new::<(), PassThrough>();
        let vtable2 = AllocVtable::new::<(), PassThrough>();

        // Both should be the exact same static instance
        assert!(core::ptr::eq(vtable1, vtable2));
    }

    #[test]
    fn test_alloc_vtable_type_ids() {
        let vtable = AllocVtable::new::<(), PassThrough>();
        assert_eq!(vtable.type_id(), TypeId::of::<()>());
        assert_eq!(vtable.handler_type_id(), TypeId::of::<PassThrough>());
        assert_eq!(vtable.type_name(), core::any::type_name::<()>());
    }
}
