//! Handlers that define the allocation behavior behind an allocator record.
//!
//! This module provides the trait for implementing custom allocators that the
//! containers draw storage from. A handler is stateless dispatch: it pairs a
//! state type `S` (the allocator's own bookkeeping, an arena, a pool, a
//! counter) with the functions that carve blocks out of it.

use core::{alloc::Layout, ptr::NonNull};

/// Trait for implementing a custom allocation strategy over a state type `S`.
///
/// An allocator record erases `S` behind a vtable built from this trait; the
/// containers then allocate and free through the record without knowing its
/// concrete type.
///
/// # When to Implement
///
/// Implement this trait to back containers with anything other than the global
/// allocator: arenas, pools, instrumented allocators in tests. Containers used
/// without a record fall back to the global allocator directly, so no handler
/// is needed for the default case.
///
/// # Contract
///
/// - [`allocate`](AllocHandler::allocate) returns a block of at least
///   `layout.size()` bytes aligned to `layout.align()`, or `None` when the
///   request cannot be served. Returning `None` is the only failure channel;
///   handlers must not panic for ordinary exhaustion.
/// - A returned block stays valid until it is passed to
///   [`deallocate`](AllocHandler::deallocate) with the same layout.
/// - Zero-size layouts are never requested; handlers may assume
///   `layout.size() > 0`.
///
/// # Examples
///
/// ```
/// use core::{alloc::Layout, cell::Cell, ptr::NonNull};
///
/// use dynseq_internals::handlers::AllocHandler;
///
/// /// Allocator state that counts live blocks.
/// struct Metered {
///     live: Cell<usize>,
/// }
///
/// struct MeteredHandler;
///
/// impl AllocHandler<Metered> for MeteredHandler {
///     fn allocate(state: &Metered, layout: Layout) -> Option<NonNull<u8>> {
///         // SAFETY: zero-size layouts are never requested through this trait.
///         let ptr = NonNull::new(unsafe { std::alloc::alloc(layout) })?;
///         state.live.set(state.live.get() + 1);
///         Some(ptr)
///     }
///
///     unsafe fn deallocate(state: &Metered, ptr: NonNull<u8>, layout: Layout) {
///         state.live.set(state.live.get() - 1);
///         // SAFETY: the pointer came from `allocate` above with this layout.
///         unsafe { std::alloc::dealloc(ptr.as_ptr(), layout) }
///     }
/// }
/// ```
pub trait AllocHandler<S>: 'static {
    /// Allocates a block for `layout`, or `None` when the request cannot be
    /// served.
    ///
    /// The block must hold `layout.size()` bytes, be aligned to
    /// `layout.align()`, and stay valid until passed to
    /// [`deallocate`](AllocHandler::deallocate). `layout.size()` is always
    /// nonzero.
    fn allocate(state: &S, layout: Layout) -> Option<NonNull<u8>>;

    /// Returns a block to the allocator.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `ptr` was returned by [`allocate`](AllocHandler::allocate) on this
    ///    same state with this same `layout`
    /// 2. `ptr` is not used after this call
    ///
    /// Implementations may rely on both points.
    unsafe fn deallocate(state: &S, ptr: NonNull<u8>, layout: Layout);
}
