//! Type-erased allocator record pointer types.
//!
//! This module encapsulates the `ptr` field of [`RawAlloc`] and
//! [`RawAllocRef`], ensuring it is only visible within this module. This
//! visibility restriction guarantees the safety invariant: **the pointer
//! always comes from `triomphe::Arc<AllocData<S>>`**.
//!
//! # Safety Invariant
//!
//! Since the `ptr` field can only be set via [`RawAlloc::new`] or
//! [`RawAlloc::from_arc`] (which create it from `Arc::into_raw`), and cannot
//! be modified afterward (no `pub` or `pub(crate)` fields), the pointer
//! provenance remains valid throughout the value's lifetime.
//!
//! The [`RawAlloc::drop`] implementation and reference counting operations
//! rely on this invariant to safely reconstruct the `Arc` and manage memory.
//!
//! # Type Erasure
//!
//! The concrete state type `S` is erased by casting to `AllocData<Erased>`.
//! The vtable stored within the `AllocData` provides the dispatch needed to
//! allocate and free through the handler without knowing `S`.
//!
//! # Allocation Strategy
//!
//! Records use `triomphe::Arc` for storage. Containers never hold a strong
//! reference themselves; they receive borrows for the duration of each call,
//! while the embedding application keeps the record alive. Cloning the record
//! is cheap and shares the same state, which also makes the clones
//! interchangeable for ownership transfer.

use core::{any::TypeId, ptr::NonNull};

use crate::{allocator::data::AllocData, handlers::AllocHandler, util::Erased};

/// A pointer to an [`AllocData`] that is guaranteed to point to an initialized
/// instance of an [`AllocData<S>`] for some specific `S`, though we do not
/// know which actual `S` it is.
///
/// However, the pointer is allowed to transition into a non-initialized state
/// inside the [`RawAlloc::drop`] method.
///
/// The pointer is guaranteed to have been created using
/// [`triomphe::Arc::into_raw`].
///
/// We cannot use a [`triomphe::Arc<AllocData<S>>`] directly, because that does
/// not allow us to type-erase the `S`.
#[repr(transparent)]
pub struct RawAlloc {
    /// Pointer to the inner allocator record
    ///
    /// # Safety
    ///
    /// The following safety invariants are guaranteed to be upheld as long as
    /// this struct exists:
    ///
    /// 1. The pointer must have been created from a
    ///    `triomphe::Arc<AllocData<S>>` for some `S` using
    ///    `triomphe::Arc::into_raw`.
    /// 2. The pointer retains full provenance over the `Arc` for the entire
    ///    lifetime of this object (i.e., it was not derived from a `&T`)
    /// 3. The pointer will point to the same `AllocData<S>` for the entire
    ///    lifetime of this object.
    ptr: NonNull<AllocData<Erased>>,
}

impl RawAlloc {
    /// Creates a new [`RawAlloc`] from a [`triomphe::Arc<AllocData<S>>`].
    #[inline]
    pub(super) fn from_arc<S: 'static>(data: triomphe::Arc<AllocData<S>>) -> Self {
        let ptr: *const AllocData<S> = triomphe::Arc::into_raw(data);
        let ptr: *mut AllocData<Erased> = ptr.cast::<AllocData<Erased>>().cast_mut();

        // SAFETY: Triomphe guarantees that `Arc::into_raw` returns a non-null
        // pointer.
        let ptr: NonNull<AllocData<Erased>> = unsafe { NonNull::new_unchecked(ptr) };

        Self {
            // SAFETY:
            // 1. We just created the pointer using `triomphe::Arc::into_raw`.
            // 2. We have provenance and we are not locally changing that here
            // 3. We are creating the object here and we are not changing the
            //    pointer.
            ptr,
        }
    }

    /// Creates a new allocator record with the specified handler and state.
    ///
    /// The returned record owns one strong reference to the state; further
    /// references are created with [`RawAllocRef::clone_arc`].
    #[inline]
    pub fn new<S, H>(state: S) -> Self
    where
        S: 'static,
        H: AllocHandler<S>,
    {
        let data = triomphe::Arc::new(AllocData::new::<H>(state));
        Self::from_arc(data)
    }

    /// Returns a reference to the [`AllocData`] instance.
    #[inline]
    pub fn as_ref(&self) -> RawAllocRef<'_> {
        RawAllocRef {
            // SAFETY:
            // 1. Guaranteed by the invariants on `RawAlloc`
            // 2. Guaranteed by the invariants on `RawAlloc` and the fact that
            //    we are taking a shared reference to `self`
            // 3. We are creating the `RawAllocRef` here, and we are not
            //    changing the pointer
            ptr: self.ptr,
            _marker: core::marker::PhantomData,
        }
    }
}

impl core::ops::Drop for RawAlloc {
    #[inline]
    fn drop(&mut self) {
        let vtable = self.as_ref().vtable();

        // SAFETY:
        // 1. The pointer comes from `Arc::into_raw` (guaranteed by `RawAlloc`'s
        //    invariant)
        // 2. The vtable returned by `self.as_ref().vtable()` is guaranteed to
        //    match the data in the `AllocData`.
        // 3. The pointer is not used after this call (we're in the drop
        //    function)
        unsafe { vtable.drop(self.ptr) }
    }
}

/// A lifetime-bound pointer to an [`AllocData`] that is guaranteed to point to
/// an initialized instance of an [`AllocData<S>`] for some specific `S`,
/// though we do not know which actual `S` it is.
///
/// We cannot use a [`&'a AllocData<S>`] directly, because that would require
/// us to know the actual type of the state, which we do not.
///
/// [`&'a AllocData<S>`]: AllocData
///
/// # Safety invariants
///
/// This reference behaves like a `&'a AllocData<S>` for some unknown `S` and
/// upholds the usual safety invariants of shared references:
///
/// 1. The pointee is properly initialized for the entire lifetime `'a`.
/// 2. The pointee is not mutated for the entire lifetime `'a`.
#[derive(Clone, Copy)]
#[repr(transparent)]
pub struct RawAllocRef<'a> {
    /// Pointer to the inner allocator record
    ///
    /// # Safety
    ///
    /// The following safety invariants are guaranteed to be upheld as long as
    /// this struct exists:
    ///
    /// 1. The pointer must have been created from a
    ///    `triomphe::Arc<AllocData<S>>` for some `S` using
    ///    `triomphe::Arc::into_raw`.
    /// 2. The pointer retains full provenance over the `Arc` for the entire
    ///    lifetime of this object (i.e., it was not derived from a `&T`)
    /// 3. The pointer will point to the same `AllocData<S>` for the entire
    ///    lifetime of this object.
    ptr: NonNull<AllocData<Erased>>,

    /// Marker to tell the compiler that we should
    /// behave the same as a `&'a AllocData<Erased>`
    _marker: core::marker::PhantomData<&'a AllocData<Erased>>,
}

impl<'a> RawAllocRef<'a> {
    /// Casts the [`RawAllocRef`] to an [`AllocData<S>`] reference.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. The type `S` matches the actual state type stored in the
    ///    [`AllocData`]
    #[inline]
    pub(super) unsafe fn cast_inner<S: 'static>(self) -> &'a AllocData<S> {
        // Debug assertion to catch type mismatches in case of bugs
        debug_assert_eq!(self.vtable().type_id(), TypeId::of::<S>());

        let this = self.ptr.cast::<AllocData<S>>();
        // SAFETY: Converting the NonNull pointer to a reference is sound
        // because:
        // - The pointer is non-null, properly aligned, and dereferenceable
        //   (guaranteed by RawAllocRef's type invariants)
        // - The pointee is properly initialized (RawAllocRef's doc comment
        //   guarantees it points to an initialized AllocData<S> for some S)
        // - The type `S` matches the actual state type (guaranteed by caller)
        // - Shared access is allowed
        // - The reference lifetime 'a is valid (tied to RawAllocRef<'a>'s
        //   lifetime)
        unsafe { this.as_ref() }
    }

    /// Returns a pointer to the [`AllocData`] instance.
    #[inline]
    pub(super) fn as_ptr(self) -> *const AllocData<Erased> {
        self.ptr.as_ptr()
    }

    /// Whether two references point to the same allocator record.
    ///
    /// Records that compare equal here share one state and are interchangeable
    /// for ownership transfer: memory allocated through one may be freed
    /// through the other.
    #[inline]
    pub fn ptr_eq(self, other: RawAllocRef<'_>) -> bool {
        core::ptr::eq(self.as_ptr(), other.as_ptr())
    }

    /// Returns the [`TypeId`] of the allocator state.
    #[inline]
    pub fn state_type_id(self) -> TypeId {
        self.vtable().type_id()
    }

    /// Returns the [`TypeId`] of the handler.
    #[inline]
    pub fn state_handler_type_id(self) -> TypeId {
        self.vtable().handler_type_id()
    }

    /// Returns the [`core::any::type_name`] of the allocator state.
    #[inline]
    pub fn state_type_name(self) -> &'static str {
        self.vtable().type_name()
    }

    /// Clones the inner [`triomphe::Arc`] and returns a new [`RawAlloc`]
    /// pointing to the same record.
    ///
    /// Every reference to an allocator record is compatible with shared
    /// ownership (no API of this crate assumes a unique strong reference), so
    /// this is safe.
    #[inline]
    pub fn clone_arc(self) -> RawAlloc {
        let vtable = self.vtable();
        // SAFETY:
        // 1. Guaranteed by invariants on this type
        // 2. The vtable returned by `self.vtable()` is guaranteed to match the
        //    data in the `AllocData`.
        unsafe { vtable.clone_arc(self.ptr) }
    }

    /// Gets the strong count of the inner [`triomphe::Arc`].
    #[inline]
    pub fn strong_count(self) -> usize {
        let vtable = self.vtable();
        // SAFETY:
        // 1. Guaranteed by invariants on this type
        // 2. The vtable returned by `self.vtable()` is guaranteed to match the
        //    data in the `AllocData`.
        unsafe { vtable.strong_count(self.ptr) }
    }

    /// Allocates a block for `layout` through the record's handler, or `None`
    /// when the handler cannot serve the request.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `layout.size()` is nonzero
    #[inline]
    pub unsafe fn allocate(self, layout: core::alloc::Layout) -> Option<NonNull<u8>> {
        let vtable = self.vtable();
        // SAFETY:
        // 1. The vtable returned by `self.vtable()` is guaranteed to match the
        //    data in the `AllocData`.
        // 2. Guaranteed by the caller
        unsafe { vtable.allocate(self, layout) }
    }

    /// Returns a block to the record's handler.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `block` was returned by [`RawAllocRef::allocate`] on this record (or
    ///    one sharing its state) with this same `layout`
    /// 2. `block` is not used after this call
    #[inline]
    pub unsafe fn deallocate(self, block: NonNull<u8>, layout: core::alloc::Layout) {
        let vtable = self.vtable();
        // SAFETY:
        // 1. The vtable returned by `self.vtable()` is guaranteed to match the
        //    data in the `AllocData`.
        // 2. Guaranteed by the caller
        // 3. Guaranteed by the caller
        unsafe { vtable.deallocate(self, block, layout) }
    }
}

#[cfg(test)]
mod tests {
    use core::{alloc::Layout, cell::Cell};

    use super::*;

    struct PassThrough;
    impl AllocHandler<()> for PassThrough {
        fn allocate(_state: &(), layout: Layout) -> Option<NonNull<u8>> {
            // SAFETY: callers never request zero-size layouts.
            NonNull::new(unsafe { alloc::alloc::alloc(layout) })
        }

        unsafe fn deallocate(_state: &(), ptr: NonNull<u8>, layout: Layout) {
            // SAFETY: the pointer came from `alloc::alloc::alloc` with this
            // layout.
            unsafe { alloc::alloc::dealloc(ptr.as_ptr(), layout) }
        }
    }

    struct Metered;
    impl AllocHandler<Cell<usize>> for Metered {
        fn allocate(state: &Cell<usize>, layout: Layout) -> Option<NonNull<u8>> {
            // SAFETY: callers never request zero-size layouts.
            let ptr = NonNull::new(unsafe { alloc::alloc::alloc(layout) })?;
            state.set(state.get() + 1);
            Some(ptr)
        }

        unsafe fn deallocate(state: &Cell<usize>, ptr: NonNull<u8>, layout: Layout) {
            state.set(state.get() - 1);
            // SAFETY: the pointer came from `alloc::alloc::alloc` with this
            // layout.
            unsafe { alloc::alloc::dealloc(ptr.as_ptr(), layout) }
        }
    }

    #[test]
    fn test_raw_alloc_size() {
        assert_eq!(
            core::mem::size_of::<RawAlloc>(),
            core::mem::size_of::<usize>()
        );
        assert_eq!(
            core::mem::size_of::<Option<RawAlloc>>(),
            core::mem::size_of::<usize>()
        );
        assert_eq!(
            core::mem::size_of::<RawAllocRef<'_>>(),
            core::mem::size_of::<usize>()
        );
        assert_eq!(
            core::mem::size_of::<Option<RawAllocRef<'_>>>(),
            core::mem::size_of::<usize>()
        );
    }

    #[test]
    fn test_raw_alloc_identity() {
        let first = RawAlloc::new::<(), PassThrough>(());
        let second = RawAlloc::new::<(), PassThrough>(());

        assert!(first.as_ref().ptr_eq(first.as_ref()));
        assert!(!first.as_ref().ptr_eq(second.as_ref()));

        let cloned = first.as_ref().clone_arc();
        assert!(cloned.as_ref().ptr_eq(first.as_ref()));
    }

    #[test]
    fn test_raw_alloc_clone_counts() {
        let record = RawAlloc::new::<(), PassThrough>(());
        assert_eq!(record.as_ref().strong_count(), 1);

        let cloned = record.as_ref().clone_arc();
        assert_eq!(record.as_ref().strong_count(), 2);
        assert_eq!(cloned.as_ref().strong_count(), 2);

        core::mem::drop(cloned);
        assert_eq!(record.as_ref().strong_count(), 1);
    }

    #[test]
    fn test_raw_alloc_type_info() {
        let record = RawAlloc::new::<Cell<usize>, Metered>(Cell::new(0));
        let reference = record.as_ref();

        assert_eq!(reference.state_type_id(), TypeId::of::<Cell<usize>>());
        assert_eq!(reference.state_handler_type_id(), TypeId::of::<Metered>());
        assert_eq!(
            reference.state_type_name(),
            core::any::type_name::<Cell<usize>>()
        );
        // SAFETY: the record was built with `Cell<usize>` state.
        let state = unsafe { reference.state_downcast_unchecked::<Cell<usize>>() };
        assert_eq!(state.get(), 0);
    }

    #[test]
    fn test_raw_alloc_round_trip() {
        let record = RawAlloc::new::<Cell<usize>, Metered>(Cell::new(0));
        let reference = record.as_ref();
        let layout = Layout::from_size_align(64, 8).unwrap();

        // SAFETY: the layout has nonzero size.
        let block = unsafe { reference.allocate(layout) }.unwrap();
        // SAFETY: the record was built with `Cell<usize>` state.
        let live = unsafe { reference.state_downcast_unchecked::<Cell<usize>>() };
        assert_eq!(live.get(), 1);

        // SAFETY: the block came from `allocate` on this record with this
        // layout and is not used afterwards.
        unsafe { reference.deallocate(block, layout) };
        assert_eq!(live.get(), 0);
    }

    #[test]
    fn test_send_sync() {
        static_assertions::assert_not_impl_any!(RawAlloc: Send, Sync);
        static_assertions::assert_not_impl_any!(RawAllocRef<'_>: Send, Sync);
    }
}
