//! An owned, shareable allocator record.
//!
//! [`SharedAlloc`] owns one strong reference to a reference-counted
//! `(state, handler)` record and hands out the borrowed [`AllocRef`] handles
//! the container operations take. Containers never store a handle; keeping
//! every handle derived from one `SharedAlloc` (or a clone of it) gives them
//! all the same identity, which is what lets storage allocated through one
//! handle be freed through another.
//!
//! The module is named `shared_alloc` rather than `alloc` so it does not
//! shadow the [`alloc`] crate.

use core::marker::PhantomData;

use dynseq_internals::{AllocRef, RawAlloc, handlers::AllocHandler};

/// An owned allocator record with state type `S`.
///
/// Cloning is cheap and shares the record, so clones have the same identity.
/// The record and its state are dropped with the last clone.
///
/// # Examples
///
/// ```
/// use core::{alloc::Layout, ptr::NonNull, sync::atomic::{AtomicUsize, Ordering}};
///
/// use dynseq::{SharedAlloc, handlers::AllocHandler};
///
/// struct Metered;
///
/// impl AllocHandler<AtomicUsize> for Metered {
///     fn allocate(state: &AtomicUsize, layout: Layout) -> Option<NonNull<u8>> {
///         state.fetch_add(1, Ordering::Relaxed);
///         // SAFETY: callers never request zero-size layouts.
///         NonNull::new(unsafe { std::alloc::alloc(layout) })
///     }
///
///     unsafe fn deallocate(state: &AtomicUsize, ptr: NonNull<u8>, layout: Layout) {
///         state.fetch_sub(1, Ordering::Relaxed);
///         // SAFETY: the pointer came from `std::alloc::alloc` with this layout.
///         unsafe { std::alloc::dealloc(ptr.as_ptr(), layout) }
///     }
/// }
///
/// let shared = SharedAlloc::new::<Metered>(AtomicUsize::new(0));
/// let clone = shared.clone();
/// assert!(shared.ptr_eq(&clone));
/// assert!(shared.handle().is_identical(clone.handle()));
/// assert_eq!(shared.strong_count(), 2);
/// ```
pub struct SharedAlloc<S: 'static> {
    /// # Safety
    ///
    /// The record's state is an `S`, established at construction and never
    /// changed.
    raw: RawAlloc,
    /// Marker tying the wrapper to its state type.
    _state: PhantomData<S>,
}

impl<S: 'static> SharedAlloc<S> {
    /// Creates a record from `state`, dispatching through the handler `H`.
    pub fn new<H: AllocHandler<S>>(state: S) -> Self {
        Self {
            raw: RawAlloc::new::<S, H>(state),
            _state: PhantomData,
        }
    }

    /// A borrowed handle denoting this record.
    ///
    /// Handles from `self` and from clones of `self` are
    /// [`is_identical`](AllocRef::is_identical).
    #[inline]
    pub fn handle(&self) -> AllocRef<'_> {
        AllocRef::from(self.raw.as_ref())
    }

    /// Shared access to the record's state.
    #[inline]
    pub fn state(&self) -> &S {
        // SAFETY: The record was built with `S` state in `new`, per the
        // invariant on the `raw` field.
        unsafe { self.raw.as_ref().state_downcast_unchecked::<S>() }
    }

    /// Whether two wrappers share one record, and hence one identity.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.raw.as_ref().ptr_eq(other.raw.as_ref())
    }

    /// Number of live clones of this record.
    #[inline]
    pub fn strong_count(&self) -> usize {
        self.raw.as_ref().strong_count()
    }
}

impl<S: 'static> Clone for SharedAlloc<S> {
    fn clone(&self) -> Self {
        Self {
            raw: self.raw.as_ref().clone_arc(),
            _state: PhantomData,
        }
    }
}

impl<S: 'static> core::fmt::Debug for SharedAlloc<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "SharedAlloc({})", self.raw.as_ref().state_type_name())
    }
}
