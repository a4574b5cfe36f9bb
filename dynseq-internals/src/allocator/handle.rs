//! The allocator handle passed on every allocating container call.
//!
//! An [`AllocRef`] is a `Copy` value that is either a borrow of an allocator
//! record or the global case. Containers never store one; the embedding
//! application keeps the record (if any) alive and passes a fresh handle on
//! each call. Freeing memory through a handle requires a handle identical to
//! the one that allocated it, which is what
//! [`is_identical`](AllocRef::is_identical) decides.

use core::{alloc::Layout, ptr::NonNull};

use crate::allocator::raw::RawAllocRef;

/// Allocator handle: a borrow of an allocator record, or the global
/// allocator.
///
/// The global case allocates through [`alloc::alloc::alloc`] and
/// [`alloc::alloc::dealloc`]; the record case dispatches through the record's
/// handler. Two handles are interchangeable for ownership transfer iff they
/// are [`is_identical`](AllocRef::is_identical).
#[derive(Clone, Copy)]
pub struct AllocRef<'a> {
    /// The borrowed record, or `None` for the global allocator.
    record: Option<RawAllocRef<'a>>,
}

impl AllocRef<'static> {
    /// The handle for the global allocator.
    #[inline]
    pub const fn global() -> Self {
        Self { record: None }
    }
}

impl<'a> AllocRef<'a> {
    /// Whether this handle is the global allocator.
    #[inline]
    pub fn is_global(self) -> bool {
        self.record.is_none()
    }

    /// The borrowed record, or `None` for the global allocator.
    #[inline]
    pub fn record(self) -> Option<RawAllocRef<'a>> {
        self.record
    }

    /// Whether two handles denote the same allocator.
    ///
    /// True when both are the global allocator, or when both borrow the same
    /// record. Identical handles are interchangeable: memory allocated through
    /// one may be freed through the other.
    #[inline]
    pub fn is_identical(self, other: AllocRef<'_>) -> bool {
        match (self.record, other.record) {
            (None, None) => true,
            (Some(a), Some(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Allocates a block for `layout`, or `None` when the allocator cannot
    /// serve the request.
    ///
    /// Zero-size layouts are refused and return `None`; handlers never observe
    /// them.
    #[inline]
    pub fn allocate(self, layout: Layout) -> Option<NonNull<u8>> {
        if layout.size() == 0 {
            return None;
        }
        match self.record {
            // SAFETY:
            // 1. The layout size was checked to be nonzero above.
            Some(record) => unsafe { record.allocate(layout) },
            // SAFETY: The layout size was checked to be nonzero above, which
            // is what `alloc::alloc::alloc` requires.
            None => NonNull::new(unsafe { alloc::alloc::alloc(layout) }),
        }
    }

    /// Returns a block to the allocator.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `block` was returned by [`AllocRef::allocate`] on a handle identical
    ///    to this one, with this same `layout`
    /// 2. `block` is not used after this call
    #[inline]
    pub unsafe fn deallocate(self, block: NonNull<u8>, layout: Layout) {
        match self.record {
            // SAFETY:
            // 1. Guaranteed by the caller: the block came from an identical
            //    handle, hence from this record, with this layout.
            // 2. Guaranteed by the caller
            Some(record) => unsafe { record.deallocate(block, layout) },
            // SAFETY: The block came from `alloc::alloc::alloc` with this
            // layout (an identical handle is also global), guaranteed by the
            // caller.
            None => unsafe { alloc::alloc::dealloc(block.as_ptr(), layout) },
        }
    }
}

impl<'a> From<RawAllocRef<'a>> for AllocRef<'a> {
    #[inline]
    fn from(record: RawAllocRef<'a>) -> Self {
        Self {
            record: Some(record),
        }
    }
}

impl core::fmt::Debug for AllocRef<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.record {
            Some(record) => write!(f, "AllocRef({})", record.state_type_name()),
            None => f.write_str("AllocRef(global)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use super::*;
    use crate::{allocator::raw::RawAlloc, handlers::AllocHandler};

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
    fn global_handles_are_identical() {
        assert!(AllocRef::global().is_global());
        assert!(AllocRef::global().is_identical(AllocRef::global()));
    }

    #[test]
    fn record_handles_follow_the_record() {
        let first = RawAlloc::new::<Cell<usize>, Metered>(Cell::new(0));
        let second = RawAlloc::new::<Cell<usize>, Metered>(Cell::new(0));

        let first_handle = AllocRef::from(first.as_ref());
        let second_handle = AllocRef::from(second.as_ref());

        assert!(first_handle.is_identical(AllocRef::from(first.as_ref())));
        assert!(!first_handle.is_identical(second_handle));
        assert!(!first_handle.is_identical(AllocRef::global()));
        assert!(!first_handle.is_global());
    }

    #[test]
    fn zero_size_requests_are_refused() {
        let layout = Layout::from_size_align(0, 1).unwrap();
        assert!(AllocRef::global().allocate(layout).is_none());

        let record = RawAlloc::new::<Cell<usize>, Metered>(Cell::new(0));
        assert!(AllocRef::from(record.as_ref()).allocate(layout).is_none());
    }

    #[test]
    fn round_trips_through_both_cases() {
        let layout = Layout::from_size_align(48, 16).unwrap();

        let block = AllocRef::global().allocate(layout).unwrap();
        // SAFETY: the block came from this handle with this layout.
        unsafe { AllocRef::global().deallocate(block, layout) };

        let record = RawAlloc::new::<Cell<usize>, Metered>(Cell::new(0));
        let handle = AllocRef::from(record.as_ref());
        let block = handle.allocate(layout).unwrap();
        // SAFETY: the record was built with `Cell<usize>` state.
        let live = unsafe { record.as_ref().state_downcast_unchecked::<Cell<usize>>() };
        assert_eq!(live.get(), 1);
        // SAFETY: the block came from this handle with this layout.
        unsafe { handle.deallocate(block, layout) };
        assert_eq!(live.get(), 0);
    }

    #[test]
    fn test_send_sync() {
        static_assertions::assert_not_impl_any!(AllocRef<'_>: Send, Sync);
    }
}
