//! The contiguous vector engine.
//!
//! [`Vector`] is three pointers over one allocation: `[first, last)` holds the
//! live elements and `[last, end)` is uninitialized spare capacity. The
//! element type is not a compile-time parameter; every type-aware operation
//! takes the [`TypeDesc`] that describes the elements, and every allocating
//! operation takes the [`AllocRef`] the storage came from. The vector stores
//! neither.
//!
//! # Calling discipline
//!
//! One descriptor and one allocator identity drive a vector for its entire
//! lifetime: the descriptor passed to every call must describe the elements,
//! and the handle passed to every allocating call must be identical to the
//! one the current storage came from. The operations are `unsafe fn`s whose
//! contracts restate exactly this; `debug_assert!` covers what is checkable.
//!
//! # Failure guarantees
//!
//! Fallible operations return `Result<_, CapacityError>` and keep the vector
//! valid on failure. Reallocating paths build the new contents in a fresh
//! buffer before the old one is touched, so prior contents survive a refused
//! allocation. The one exception is the identity-adopting path of
//! [`copy_assign_from`](Vector::copy_assign_from), which must free the old
//! storage through the old identity first and documents its weaker guarantee.
//!
//! # Aliasing
//!
//! Single-element inserts accept a value pointer aliasing the vector's own
//! elements: mid-range inserts stage the value through an [`AllocFrame`] so
//! the tail shift cannot slide storage out from under it, and reallocating
//! inserts construct the new element before the old buffer is disturbed.
//! [`insert_fill`](Vector::insert_fill) re-aims an aliasing fill pointer
//! after the tail shift instead. The bulk `assign_*` operations require their
//! sources disjoint from the vector's storage.

mod iter;

use core::{alloc::Layout, ptr::NonNull};

use dynseq_internals::{AllocFrame, AllocRef, TypeDesc, range};

use crate::{errors::CapacityError, policy::AllocPropagation};

pub use self::iter::Elements;

/// Type-erased contiguous sequence.
///
/// An empty vector with no storage is all-null; [`Vector::new`] is `const`
/// and allocation-free. There is no `Drop`: storage is returned explicitly
/// with [`Vector::destroy`], because dropping would need the descriptor and
/// the allocator handle the vector deliberately does not store.
///
/// # Examples
///
/// ```
/// use core::ptr::NonNull;
///
/// use dynseq::{AllocRef, TypeDesc, Vector};
///
/// let desc = TypeDesc::of::<u32>().unwrap();
/// let alloc = AllocRef::global();
/// let mut numbers = Vector::new();
///
/// for n in [1u32, 2, 3] {
///     // SAFETY: `desc` describes `u32` and is used for every call on this
///     // vector; `alloc` is the handle for all of its storage; `n` is a live
///     // `u32` outside the vector.
///     unsafe {
///         numbers
///             .push_copy(&desc, alloc, NonNull::from(&n).cast())
///             .unwrap()
///     };
/// }
/// assert_eq!(numbers.len(&desc), 3);
///
/// let collected: Vec<u32> = numbers
///     .elements(&desc)
///     // SAFETY: the iterator yields pointers to live `u32` elements.
///     .map(|slot| unsafe { slot.cast::<u32>().read() })
///     .collect();
/// assert_eq!(collected, [1, 2, 3]);
///
/// // SAFETY: same descriptor and handle as every prior call.
/// unsafe { numbers.destroy(&desc, alloc) };
/// ```
#[repr(C)]
#[allow(
    missing_copy_implementations,
    reason = "exclusively owns its storage; duplicating the fields would alias it"
)]
pub struct Vector {
    /// Start of the allocation.
    ///
    /// # Safety
    ///
    /// The following invariants hold whenever no method of this type is
    /// executing:
    ///
    /// 1. Either all three pointers are null (no storage), or `first` points
    ///    to an allocation of `end - first` bytes obtained from a single
    ///    allocator identity, aligned for the element type, with
    ///    `first <= last <= end`.
    /// 2. `[first, last)` holds initialized elements; `[last, end)` is
    ///    uninitialized.
    /// 3. `last - first` and `end - first` are exact multiples of the element
    ///    size of the one descriptor used with this vector.
    first: *mut u8,
    /// One past the live elements. See `first` for the invariants.
    last: *mut u8,
    /// One past the allocation. See `first` for the invariants.
    end: *mut u8,
}

impl Vector {
    /// Creates an empty vector with no storage.
    #[inline]
    pub const fn new() -> Self {
        Self {
            first: core::ptr::null_mut(),
            last: core::ptr::null_mut(),
            end: core::ptr::null_mut(),
        }
    }

    /// Number of live elements.
    #[inline]
    pub fn len(&self, desc: &TypeDesc) -> usize {
        desc.elements_of(self.last.addr() - self.first.addr())
    }

    /// Whether the vector holds no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.first == self.last
    }

    /// Number of elements the current storage can hold.
    #[inline]
    pub fn capacity(&self, desc: &TypeDesc) -> usize {
        desc.elements_of(self.end.addr() - self.first.addr())
    }

    /// Largest length any vector of this element type can reach.
    #[inline]
    pub fn max_len(desc: &TypeDesc) -> usize {
        desc.max_len()
    }

    /// Pointer to the first element, or `None` without storage.
    #[inline]
    pub fn first_ptr(&self) -> Option<NonNull<u8>> {
        NonNull::new(self.first)
    }

    /// Pointer to the element at `index`.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `desc` is this vector's descriptor
    /// 2. `index` is below [`Vector::len`]
    #[inline]
    pub unsafe fn get(&self, desc: &TypeDesc, index: usize) -> NonNull<u8> {
        debug_assert!(index < self.len(desc));
        // SAFETY: `index < len` implies a nonzero length, hence storage.
        let base = unsafe { self.base() };
        // SAFETY: The offset stays below `last`, inside the allocation.
        unsafe { base.add(desc.byte_len(index)) }
    }

    /// Destroys all elements, keeping the storage.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `desc` is this vector's descriptor
    pub unsafe fn clear(&mut self, desc: &TypeDesc) {
        let len = self.len(desc);
        if len == 0 {
            return;
        }
        // SAFETY: Nonzero length implies storage.
        let base = unsafe { self.base() };
        // SAFETY:
        // 1. Guaranteed by the caller
        // 2. The live range holds `len` initialized elements; `last` is
        //    pulled back below, so they are not used again.
        unsafe { range::destroy_n(desc, base, len) };
        self.last = self.first;
    }

    /// Removes the final element.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `desc` is this vector's descriptor
    /// 2. The vector is not empty
    pub unsafe fn pop(&mut self, desc: &TypeDesc) {
        debug_assert!(!self.is_empty());
        // SAFETY: The vector is nonempty, so one element below `last` stays
        // within the allocation.
        self.last = unsafe { self.last.sub(desc.size()) };
        // SAFETY: Nonempty, hence storage, hence non-null.
        let slot = unsafe { NonNull::new_unchecked(self.last) };
        // SAFETY:
        // 1. Guaranteed by the caller
        // 2. The slot holds the removed element; `last` already excludes it,
        //    so it is not used again.
        unsafe { desc.destroy_in_place(slot) };
    }

    /// Exchanges the entire contents and storage of two vectors.
    ///
    /// Both vectors must be driven by the same descriptor and their storage
    /// must come from identical allocator handles; otherwise later calls will
    /// free through the wrong identity.
    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        core::mem::swap(self, other);
    }

    /// Destroys all elements and returns the storage, leaving the vector
    /// all-null.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `desc` is this vector's descriptor
    /// 2. `alloc` is identical to the handle the storage came from
    pub unsafe fn destroy(&mut self, desc: &TypeDesc, alloc: AllocRef<'_>) {
        // SAFETY:
        // 1. Guaranteed by the caller
        unsafe { self.clear(desc) };
        if self.capacity(desc) != 0 {
            // SAFETY: Nonzero capacity implies storage.
            let base = unsafe { self.base() };
            // SAFETY: Nonzero capacity, and `desc` is the descriptor.
            let layout = unsafe { self.storage_layout(desc) };
            // SAFETY:
            // 1. The storage came from an identical handle with this layout
            //    (caller obligation 2 and the field invariants).
            // 2. The fields are nulled below, so the block is not used again.
            unsafe { alloc.deallocate(base, layout) };
        }
        *self = Self::new();
    }

    /// Grows the storage to hold at least `n` elements, exactly `n` when that
    /// requires reallocating.
    ///
    /// Already-sufficient capacity is kept. Unchanged on failure.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `desc` is this vector's descriptor
    /// 2. `alloc` is identical to the handle the storage came from
    pub unsafe fn reserve(
        &mut self,
        desc: &TypeDesc,
        alloc: AllocRef<'_>,
        n: usize,
    ) -> Result<(), CapacityError> {
        if n <= self.capacity(desc) {
            return Ok(());
        }
        let fresh = Self::allocate_block(desc, alloc, n)?;
        let len = self.len(desc);
        if len != 0 {
            // SAFETY: Nonzero length implies storage.
            let base = unsafe { self.base() };
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. The live elements are consumed out of the old buffer, which
            //    is freed without touching them again.
            // 3. The fresh block has room for `len` elements and is disjoint
            //    from the old buffer.
            unsafe { range::uninit_relocate_n(desc, fresh, base, len) };
        }
        // SAFETY:
        // 1. Guaranteed by the caller
        // 2. Guaranteed by the caller
        // 3. The old storage holds no live elements; they were relocated out.
        // 4. `fresh` holds `len` elements with room for `n`.
        unsafe { self.replace_storage(desc, alloc, 0, fresh, len, n) };
        Ok(())
    }

    /// Reallocates down to exactly the current length; frees everything when
    /// empty.
    ///
    /// No-op when there is no spare capacity. Unchanged on failure.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `desc` is this vector's descriptor
    /// 2. `alloc` is identical to the handle the storage came from
    pub unsafe fn shrink_to_fit(
        &mut self,
        desc: &TypeDesc,
        alloc: AllocRef<'_>,
    ) -> Result<(), CapacityError> {
        let len = self.len(desc);
        if len == self.capacity(desc) {
            return Ok(());
        }
        if len == 0 {
            // SAFETY: Spare capacity exists, so there is storage.
            let base = unsafe { self.base() };
            // SAFETY: As above, and `desc` is the descriptor.
            let layout = unsafe { self.storage_layout(desc) };
            // SAFETY:
            // 1. The storage came from an identical handle with this layout.
            // 2. The fields are nulled below.
            unsafe { alloc.deallocate(base, layout) };
            *self = Self::new();
            return Ok(());
        }
        let fresh = Self::allocate_block(desc, alloc, len)?;
        // SAFETY: Nonzero length implies storage.
        let base = unsafe { self.base() };
        // SAFETY:
        // 1. Guaranteed by the caller
        // 2. The live elements are consumed out of the old buffer, which is
        //    freed without touching them again.
        // 3. The fresh block holds exactly `len` elements, disjoint from the
        //    old buffer.
        unsafe { range::uninit_relocate_n(desc, fresh, base, len) };
        // SAFETY:
        // 1. Guaranteed by the caller
        // 2. Guaranteed by the caller
        // 3. The old storage holds no live elements; they were relocated out.
        // 4. `fresh` holds `len` elements with room for exactly `len`.
        unsafe { self.replace_storage(desc, alloc, 0, fresh, len, len) };
        Ok(())
    }

    /// Replaces the contents with `n` copies of `*value`.
    ///
    /// Prior contents are retained on failure.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `desc` is this vector's descriptor
    /// 2. `alloc` is identical to the handle the storage came from
    /// 3. `value` points to an initialized element outside this vector's
    ///    storage
    pub unsafe fn assign_fill(
        &mut self,
        desc: &TypeDesc,
        alloc: AllocRef<'_>,
        n: usize,
        value: NonNull<u8>,
    ) -> Result<(), CapacityError> {
        let len = self.len(desc);
        if n > self.capacity(desc) {
            let new_cap = self.grown_capacity(desc, n)?;
            let fresh = Self::allocate_block(desc, alloc, new_cap)?;
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. The fresh block has room for `n` elements, holding none.
            // 3. `value` is outside it (caller obligation 3, and the block is
            //    brand new).
            unsafe { range::uninit_fill_n(desc, fresh, n, value) };
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. Guaranteed by the caller
            // 3. All `len` prior elements are still live in the old storage.
            // 4. `fresh` holds `n` elements with room for `new_cap`.
            unsafe { self.replace_storage(desc, alloc, len, fresh, n, new_cap) };
            return Ok(());
        }
        if len < n {
            // Overwrite the live range, construct the rest into the spare.
            // SAFETY: `n` fits the capacity and is nonzero, hence storage.
            let base = unsafe { self.base() };
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. The live range holds `len` initialized elements.
            // 3. Guaranteed by the caller (obligation 3)
            unsafe { range::fill_n(desc, base, len, value) };
            // SAFETY: `len` elements stay within the allocation.
            let tail = unsafe { base.add(desc.byte_len(len)) };
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. `[last, first + n)` is uninitialized spare within the
            //    allocation.
            // 3. Guaranteed by the caller (obligation 3)
            unsafe { range::uninit_fill_n(desc, tail, n - len, value) };
            // SAFETY: `n` elements fit the allocation.
            self.last = unsafe { base.as_ptr().add(desc.byte_len(n)) };
        } else if len != 0 {
            // Overwrite the first `n`, destroy the rest.
            // SAFETY: Nonzero length implies storage.
            let base = unsafe { self.base() };
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. The first `n` slots hold initialized elements.
            // 3. Guaranteed by the caller (obligation 3)
            unsafe { range::fill_n(desc, base, n, value) };
            // SAFETY: `n <= len` elements stay within the allocation.
            let tail = unsafe { base.add(desc.byte_len(n)) };
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. The trailing `len - n` elements are initialized; `last` is
            //    pulled back below, so they are not used again.
            unsafe { range::destroy_n(desc, tail, len - n) };
            self.last = tail.as_ptr();
        }
        Ok(())
    }

    /// Replaces the contents with copies of the `n` elements at `src`.
    ///
    /// Prior contents are retained on failure.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `desc` is this vector's descriptor
    /// 2. `alloc` is identical to the handle the storage came from
    /// 3. `src` points to `n` initialized elements disjoint from this
    ///    vector's storage
    pub unsafe fn assign_copy_n(
        &mut self,
        desc: &TypeDesc,
        alloc: AllocRef<'_>,
        src: NonNull<u8>,
        n: usize,
    ) -> Result<(), CapacityError> {
        let len = self.len(desc);
        if n > self.capacity(desc) {
            let new_cap = self.grown_capacity(desc, n)?;
            let fresh = Self::allocate_block(desc, alloc, new_cap)?;
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. The fresh block has room for `n` elements, holding none, and
            //    is disjoint from `src`.
            // 3. Guaranteed by the caller (obligation 3)
            unsafe { range::uninit_copy_n(desc, fresh, src, n) };
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. Guaranteed by the caller
            // 3. All `len` prior elements are still live in the old storage.
            // 4. `fresh` holds `n` elements with room for `new_cap`.
            unsafe { self.replace_storage(desc, alloc, len, fresh, n, new_cap) };
            return Ok(());
        }
        if len < n {
            // SAFETY: `n` fits the capacity and is nonzero, hence storage.
            let base = unsafe { self.base() };
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. The live range holds `len` initialized elements.
            // 3. The first `len` source elements are initialized and disjoint
            //    from our storage (caller obligation 3).
            unsafe { range::copy_n(desc, base, src, len) };
            // SAFETY: `len` elements stay within the allocation.
            let dst_tail = unsafe { base.add(desc.byte_len(len)) };
            // SAFETY: `len < n` source elements exist past the first `len`.
            let src_tail = unsafe { src.add(desc.byte_len(len)) };
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. `[last, first + n)` is uninitialized spare, disjoint from
            //    the source range.
            // 3. The remaining source elements are initialized.
            unsafe { range::uninit_copy_n(desc, dst_tail, src_tail, n - len) };
            // SAFETY: `n` elements fit the allocation.
            self.last = unsafe { base.as_ptr().add(desc.byte_len(n)) };
        } else if len != 0 {
            // SAFETY: Nonzero length implies storage.
            let base = unsafe { self.base() };
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. The first `n` slots hold initialized elements.
            // 3. Guaranteed by the caller (obligation 3)
            unsafe { range::copy_n(desc, base, src, n) };
            // SAFETY: `n <= len` elements stay within the allocation.
            let tail = unsafe { base.add(desc.byte_len(n)) };
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. The trailing `len - n` elements are initialized; `last` is
            //    pulled back below, so they are not used again.
            unsafe { range::destroy_n(desc, tail, len - n) };
            self.last = tail.as_ptr();
        }
        Ok(())
    }

    /// Replaces the contents by relocating the `n` elements at `src` into the
    /// vector, consuming them.
    ///
    /// On failure nothing is consumed and prior contents are retained.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `desc` is this vector's descriptor
    /// 2. `alloc` is identical to the handle the storage came from
    /// 3. `src` points to `n` initialized elements disjoint from this
    ///    vector's storage; on success they are consumed (their slots end
    ///    uninitialized) and must not be used or destroyed again
    pub unsafe fn assign_move_n(
        &mut self,
        desc: &TypeDesc,
        alloc: AllocRef<'_>,
        src: NonNull<u8>,
        n: usize,
    ) -> Result<(), CapacityError> {
        let len = self.len(desc);
        if n > self.capacity(desc) {
            let new_cap = self.grown_capacity(desc, n)?;
            let fresh = Self::allocate_block(desc, alloc, new_cap)?;
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. Guaranteed by the caller (obligation 3)
            // 3. The fresh block has room for `n` elements, holding none,
            //    disjoint from `src`.
            unsafe { range::uninit_relocate_n(desc, fresh, src, n) };
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. Guaranteed by the caller
            // 3. All `len` prior elements are still live in the old storage.
            // 4. `fresh` holds `n` elements with room for `new_cap`.
            unsafe { self.replace_storage(desc, alloc, len, fresh, n, new_cap) };
            return Ok(());
        }
        if len < n {
            // SAFETY: `n` fits the capacity and is nonzero, hence storage.
            let base = unsafe { self.base() };
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. The live range holds `len` initialized elements.
            // 3. The first `len` source elements are initialized, disjoint
            //    from our storage, and consumed per caller obligation 3.
            unsafe { range::move_n(desc, base, src, len) };
            // SAFETY: `len` elements stay within the allocation.
            let dst_tail = unsafe { base.add(desc.byte_len(len)) };
            // SAFETY: `len < n` source elements exist past the first `len`.
            let src_tail = unsafe { src.add(desc.byte_len(len)) };
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. The remaining source elements are initialized and consumed
            //    per caller obligation 3.
            // 3. `[last, first + n)` is uninitialized spare, disjoint from
            //    the source range.
            unsafe { range::uninit_relocate_n(desc, dst_tail, src_tail, n - len) };
            // SAFETY: `n` elements fit the allocation.
            self.last = unsafe { base.as_ptr().add(desc.byte_len(n)) };
        } else if len != 0 {
            // SAFETY: Nonzero length implies storage.
            let base = unsafe { self.base() };
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. The first `n` slots hold initialized elements.
            // 3. Guaranteed by the caller (obligation 3)
            unsafe { range::move_n(desc, base, src, n) };
            // SAFETY: `n <= len` elements stay within the allocation.
            let tail = unsafe { base.add(desc.byte_len(n)) };
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. The trailing `len - n` elements are initialized; `last` is
            //    pulled back below, so they are not used again.
            unsafe { range::destroy_n(desc, tail, len - n) };
            self.last = tail.as_ptr();
        }
        Ok(())
    }

    /// Inserts `n` copies of `*value` before position `at`, returning the
    /// address of the first inserted element.
    ///
    /// `value` may point at one of this vector's own elements; the fill
    /// pointer is re-aimed when the tail shift moves it. With `n == 0`
    /// nothing happens and the address of position `at` is returned (dangling
    /// for a vector without storage).
    ///
    /// Prior contents are retained on failure.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `desc` is this vector's descriptor
    /// 2. `alloc` is identical to the handle the storage came from
    /// 3. `at` is at most [`Vector::len`]
    /// 4. `value` points to an initialized element
    pub unsafe fn insert_fill(
        &mut self,
        desc: &TypeDesc,
        alloc: AllocRef<'_>,
        at: usize,
        n: usize,
        value: NonNull<u8>,
    ) -> Result<NonNull<u8>, CapacityError> {
        let len = self.len(desc);
        debug_assert!(at <= len);
        if n == 0 {
            return Ok(match NonNull::new(self.first) {
                // SAFETY: `at <= len`, so the position is in bounds.
                Some(base) => unsafe { base.add(desc.byte_len(at)) },
                None => NonNull::dangling(),
            });
        }
        let spare = self.capacity(desc) - len;
        if n > spare {
            let total = len.checked_add(n).ok_or(CapacityError::Overflow)?;
            let new_cap = self.grown_capacity(desc, total)?;
            let fresh = Self::allocate_block(desc, alloc, new_cap)?;
            // SAFETY: `at + n <= new_cap` elements fit the fresh block.
            let gap = unsafe { fresh.add(desc.byte_len(at)) };
            // The fills go in first: an aliasing `value` is read while the
            // old buffer is still intact.
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. The gap has room for `n` elements, holding none.
            // 3. `value` is initialized (caller obligation 4) and outside the
            //    brand-new block.
            unsafe { range::uninit_fill_n(desc, gap, n, value) };
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. Guaranteed by the caller
            // 3. `fresh` holds `n` elements at `[at, at + n)` with room for
            //    `new_cap` in total.
            // 4. Guaranteed by the caller (obligation 3)
            unsafe { self.commit_grown_insert(desc, alloc, fresh, at, n, new_cap) };
            return Ok(gap);
        }
        // SAFETY: Spare capacity for `n >= 1` elements implies storage.
        let base = unsafe { self.base() };
        // SAFETY: `at <= len`, in bounds.
        let gap = unsafe { base.add(desc.byte_len(at)) };
        let tail = len - at;
        if tail != 0 {
            // SAFETY: `at + n + tail = len + n` fits the capacity.
            let dst = unsafe { gap.add(desc.byte_len(n)) };
            if n < tail {
                // The old and new tail ranges overlap: walk back to front.
                // SAFETY:
                // 1. Guaranteed by the caller
                // 2. The tail holds `tail` initialized elements, consumed
                //    here and re-established by the fill below or by their
                //    relocated copies.
                // 3. `dst` is above `gap` within the allocation; each slot is
                //    consumed before it is written.
                unsafe { range::uninit_relocate_backward_n(desc, dst, gap, tail) };
            } else {
                // Disjoint ranges: the gap covers the whole tail.
                // SAFETY:
                // 1. Guaranteed by the caller
                // 2. As above.
                // 3. The destination starts at or past the old `last`, so the
                //    ranges are disjoint and the destination is spare.
                unsafe { range::uninit_relocate_n(desc, dst, gap, tail) };
            }
        }
        let value_addr = value.addr().get();
        let value = if value_addr >= gap.addr().get() && value_addr < self.last.addr() {
            // The value was one of the shifted tail elements and now lives
            // `n` slots up.
            // SAFETY: The relocated element is within the allocation.
            unsafe { value.add(desc.byte_len(n)) }
        } else {
            value
        };
        // SAFETY:
        // 1. Guaranteed by the caller
        // 2. `[gap, gap + n)` is uninitialized: the tail was relocated out of
        //    it, or it was spare to begin with.
        // 3. `value` is initialized and outside the gap; an aliasing pointer
        //    was re-aimed above.
        unsafe { range::uninit_fill_n(desc, gap, n, value) };
        // SAFETY: `len + n` elements fit the allocation.
        self.last = unsafe { base.as_ptr().add(desc.byte_len(len + n)) };
        Ok(gap)
    }

    /// Inserts a copy of `*value` before position `at`, returning its slot.
    ///
    /// `value` may point at one of this vector's own elements: an end insert
    /// reads it before anything moves, a reallocating insert reads it while
    /// the old buffer is intact, and a mid insert stages the copy through an
    /// [`AllocFrame`] before the tail shifts.
    ///
    /// Prior contents are retained on failure.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `desc` is this vector's descriptor
    /// 2. `alloc` is identical to the handle the storage came from
    /// 3. `at` is at most [`Vector::len`]
    /// 4. `value` points to an initialized element
    pub unsafe fn insert_one_copy(
        &mut self,
        desc: &TypeDesc,
        alloc: AllocRef<'_>,
        at: usize,
        value: NonNull<u8>,
    ) -> Result<NonNull<u8>, CapacityError> {
        let len = self.len(desc);
        debug_assert!(at <= len);
        if len == self.capacity(desc) {
            let (fresh, gap, new_cap) = self.grown_buffer_for_one(desc, alloc, at)?;
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. `value` is initialized; an aliasing pointer reads the old
            //    buffer, which is still intact.
            // 3. The gap is writable storage in the brand-new block, aligned,
            //    not overlapping `*value`.
            unsafe { desc.copy_construct(gap, value) };
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. Guaranteed by the caller
            // 3. `fresh` holds one element at `at` with room for `new_cap`.
            // 4. Guaranteed by the caller (obligation 3)
            unsafe { self.commit_grown_insert(desc, alloc, fresh, at, 1, new_cap) };
            return Ok(gap);
        }
        if at == len {
            // SAFETY: Spare capacity implies storage.
            let slot = unsafe { NonNull::new_unchecked(self.last) };
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. Guaranteed by the caller (obligation 4)
            // 3. The slot is the first spare slot: writable, aligned, outside
            //    the live range `*value` may point into.
            unsafe { desc.copy_construct(slot, value) };
            // SAFETY: One more element fits the spare capacity.
            self.last = unsafe { self.last.add(desc.size()) };
            return Ok(slot);
        }
        let mut frame = AllocFrame::acquire(desc, alloc).ok_or(CapacityError::AllocFailed)?;
        let staged = frame.slot();
        // SAFETY:
        // 1. Guaranteed by the caller
        // 2. Guaranteed by the caller (obligation 4)
        // 3. The staging slot is writable storage outside the vector.
        unsafe { desc.copy_construct(staged, value) };
        // SAFETY:
        // 1. Guaranteed by the caller
        // 2. `at < len`, spare capacity exists, and the staged element is
        //    initialized in frame storage.
        Ok(unsafe { self.place_staged(desc, at, staged) })
    }

    /// Inserts `*value` before position `at` by move, returning its slot.
    ///
    /// The value is taken by move construction: afterwards, if the
    /// descriptor declares a move callback the source holds a constructed,
    /// moved-from element the caller still owns; otherwise its bytes were
    /// transferred and the source must be treated as uninitialized. On
    /// failure the value is untouched.
    ///
    /// `value` may point at one of this vector's own elements only when the
    /// descriptor declares a move callback; the moved-from husk then remains
    /// an element of the vector.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `desc` is this vector's descriptor
    /// 2. `alloc` is identical to the handle the storage came from
    /// 3. `at` is at most [`Vector::len`]
    /// 4. `value` points to an initialized element; if it points into this
    ///    vector's storage, the descriptor declares a move callback
    pub unsafe fn insert_one_move(
        &mut self,
        desc: &TypeDesc,
        alloc: AllocRef<'_>,
        at: usize,
        value: NonNull<u8>,
    ) -> Result<NonNull<u8>, CapacityError> {
        let len = self.len(desc);
        debug_assert!(at <= len);
        if len == self.capacity(desc) {
            let (fresh, gap, new_cap) = self.grown_buffer_for_one(desc, alloc, at)?;
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. `value` is initialized; an aliasing pointer reads the old
            //    buffer intact, and the husk it leaves is a constructed
            //    element there (caller obligation 4).
            // 3. The gap is writable storage in the brand-new block, aligned,
            //    not overlapping `*value`.
            unsafe { desc.move_construct(gap, value) };
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. Guaranteed by the caller
            // 3. `fresh` holds one element at `at` with room for `new_cap`.
            // 4. Guaranteed by the caller (obligation 3)
            unsafe { self.commit_grown_insert(desc, alloc, fresh, at, 1, new_cap) };
            return Ok(gap);
        }
        if at == len {
            // SAFETY: Spare capacity implies storage.
            let slot = unsafe { NonNull::new_unchecked(self.last) };
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. Guaranteed by the caller (obligation 4)
            // 3. The slot is the first spare slot: writable, aligned, outside
            //    the live range `*value` may point into.
            unsafe { desc.move_construct(slot, value) };
            // SAFETY: One more element fits the spare capacity.
            self.last = unsafe { self.last.add(desc.size()) };
            return Ok(slot);
        }
        let mut frame = AllocFrame::acquire(desc, alloc).ok_or(CapacityError::AllocFailed)?;
        let staged = frame.slot();
        // SAFETY:
        // 1. Guaranteed by the caller
        // 2. Guaranteed by the caller (obligation 4); an aliasing source is
        //    left as a constructed husk, which the tail shift below moves
        //    like any element.
        // 3. The staging slot is writable storage outside the vector.
        unsafe { desc.move_construct(staged, value) };
        // SAFETY:
        // 1. Guaranteed by the caller
        // 2. `at < len`, spare capacity exists, and the staged element is
        //    initialized in frame storage.
        Ok(unsafe { self.place_staged(desc, at, staged) })
    }

    /// Appends a copy of `*value`; see [`Vector::insert_one_copy`].
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `desc` is this vector's descriptor
    /// 2. `alloc` is identical to the handle the storage came from
    /// 3. `value` points to an initialized element
    #[inline]
    pub unsafe fn push_copy(
        &mut self,
        desc: &TypeDesc,
        alloc: AllocRef<'_>,
        value: NonNull<u8>,
    ) -> Result<NonNull<u8>, CapacityError> {
        let len = self.len(desc);
        // SAFETY:
        // 1. Guaranteed by the caller
        // 2. Guaranteed by the caller
        // 3. The length is a valid position.
        // 4. Guaranteed by the caller (obligation 3)
        unsafe { self.insert_one_copy(desc, alloc, len, value) }
    }

    /// Appends `*value` by move; see [`Vector::insert_one_move`] for how the
    /// source is left.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `desc` is this vector's descriptor
    /// 2. `alloc` is identical to the handle the storage came from
    /// 3. `value` points to an initialized element; if it points into this
    ///    vector's storage, the descriptor declares a move callback
    #[inline]
    pub unsafe fn push(
        &mut self,
        desc: &TypeDesc,
        alloc: AllocRef<'_>,
        value: NonNull<u8>,
    ) -> Result<NonNull<u8>, CapacityError> {
        let len = self.len(desc);
        // SAFETY:
        // 1. Guaranteed by the caller
        // 2. Guaranteed by the caller
        // 3. The length is a valid position.
        // 4. Guaranteed by the caller (obligation 3)
        unsafe { self.insert_one_move(desc, alloc, len, value) }
    }

    /// Removes the element at `at`. The element after it is then at `at`.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `desc` is this vector's descriptor
    /// 2. `at` is below [`Vector::len`]
    #[inline]
    pub unsafe fn erase(&mut self, desc: &TypeDesc, at: usize) {
        // SAFETY:
        // 1. Guaranteed by the caller
        // 2. `at < len` makes `[at, at + 1)` a valid range.
        unsafe { self.erase_range(desc, at, at + 1) };
    }

    /// Removes the elements in `[from, to)`; `erase_range(x, x)` is a no-op.
    ///
    /// The erased run is destroyed and the tail relocated down over it; the
    /// vacated trailing slots become uninitialized spare.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `desc` is this vector's descriptor
    /// 2. `from <= to` and `to` is at most [`Vector::len`]
    pub unsafe fn erase_range(&mut self, desc: &TypeDesc, from: usize, to: usize) {
        let len = self.len(desc);
        debug_assert!(from <= to && to <= len);
        let count = to - from;
        if count == 0 {
            return;
        }
        // SAFETY: A nonempty erase range implies live elements, hence
        // storage.
        let base = unsafe { self.base() };
        // SAFETY: `from < len`, in bounds.
        let gap = unsafe { base.add(desc.byte_len(from)) };
        // SAFETY:
        // 1. Guaranteed by the caller
        // 2. The erased run holds `count` initialized elements; the tail is
        //    relocated over them (or `last` pulled back), so they are not
        //    used again.
        unsafe { range::destroy_n(desc, gap, count) };
        let tail = len - to;
        if tail != 0 {
            // SAFETY: `to < len`, in bounds.
            let src = unsafe { base.add(desc.byte_len(to)) };
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. The tail holds `tail` initialized elements, consumed here;
            //    their old slots become spare past the new `last`.
            // 3. `gap` is below `src` within the allocation; each slot is
            //    destroyed or consumed before it is written.
            unsafe { range::uninit_relocate_n(desc, gap, src, tail) };
        }
        // SAFETY: `from + tail <= len` elements fit the allocation.
        self.last = unsafe { base.as_ptr().add(desc.byte_len(from + tail)) };
    }

    /// Resizes to exactly `n` elements, filling new slots with copies of
    /// `*value`.
    ///
    /// `value` may point at one of this vector's own elements: growth
    /// constructs the fills before relocating anything, and in-place
    /// extension constructs only into spare slots. Unchanged on failure.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `desc` is this vector's descriptor
    /// 2. `alloc` is identical to the handle the storage came from
    /// 3. `value` points to an initialized element
    pub unsafe fn resize_fill(
        &mut self,
        desc: &TypeDesc,
        alloc: AllocRef<'_>,
        n: usize,
        value: NonNull<u8>,
    ) -> Result<(), CapacityError> {
        let len = self.len(desc);
        if n <= len {
            if n < len {
                // SAFETY: Nonzero length implies storage.
                let base = unsafe { self.base() };
                // SAFETY: `n < len`, in bounds.
                let tail = unsafe { base.add(desc.byte_len(n)) };
                // SAFETY:
                // 1. Guaranteed by the caller
                // 2. The trailing `len - n` elements are initialized; `last`
                //    is pulled back below, so they are not used again.
                unsafe { range::destroy_n(desc, tail, len - n) };
                self.last = tail.as_ptr();
            }
            return Ok(());
        }
        if n <= self.capacity(desc) {
            // SAFETY: `n >= 1` fits the capacity, hence storage.
            let base = unsafe { self.base() };
            // SAFETY: `len < n <= capacity`, in bounds.
            let tail = unsafe { base.add(desc.byte_len(len)) };
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. `[last, first + n)` is uninitialized spare.
            // 3. `value` is initialized and outside the spare range, even
            //    when it points at a live element.
            unsafe { range::uninit_fill_n(desc, tail, n - len, value) };
            // SAFETY: `n` elements fit the allocation.
            self.last = unsafe { base.as_ptr().add(desc.byte_len(n)) };
            return Ok(());
        }
        let new_cap = self.grown_capacity(desc, n)?;
        let fresh = Self::allocate_block(desc, alloc, new_cap)?;
        // SAFETY: `n <= new_cap` elements fit the fresh block.
        let fill_start = unsafe { fresh.add(desc.byte_len(len)) };
        // The fills go in first: an aliasing `value` is read while the old
        // buffer is still intact.
        // SAFETY:
        // 1. Guaranteed by the caller
        // 2. The fresh block's tail has room for `n - len` elements, holding
        //    none.
        // 3. `value` is initialized and outside the brand-new block.
        unsafe { range::uninit_fill_n(desc, fill_start, n - len, value) };
        if len != 0 {
            // SAFETY: Nonzero length implies storage.
            let base = unsafe { self.base() };
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. The live elements are consumed out of the old buffer, which
            //    is freed without touching them again.
            // 3. The fresh block's head has room for `len` elements, disjoint
            //    from the old buffer.
            unsafe { range::uninit_relocate_n(desc, fresh, base, len) };
        }
        // SAFETY:
        // 1. Guaranteed by the caller
        // 2. Guaranteed by the caller
        // 3. The old storage holds no live elements; they were relocated out.
        // 4. `fresh` holds `n` elements with room for `new_cap`.
        unsafe { self.replace_storage(desc, alloc, 0, fresh, n, new_cap) };
        Ok(())
    }

    /// Replaces the contents with copies of `source`'s elements.
    ///
    /// With [`AllocPropagation::Propagate`] and differing identities the
    /// vector adopts the source identity: the old storage can only be freed
    /// through the old identity, so it is freed first, and a failure after
    /// that point leaves the vector valid but empty (weak guarantee).
    /// Otherwise this assigns with the retained identity and prior contents
    /// survive failure.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `desc` is the descriptor of both vectors
    /// 2. `dst_alloc` is identical to the handle this vector's storage came
    ///    from, and `src_alloc` to the handle `source`'s storage came from
    pub unsafe fn copy_assign_from<'a>(
        &mut self,
        source: &Vector,
        desc: &TypeDesc,
        dst_alloc: &mut AllocRef<'a>,
        src_alloc: AllocRef<'a>,
        propagation: AllocPropagation,
    ) -> Result<(), CapacityError> {
        let n = source.len(desc);
        if propagation == AllocPropagation::Propagate && !dst_alloc.is_identical(src_alloc) {
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. Guaranteed by the caller (obligation 2, old identity)
            unsafe { self.destroy(desc, *dst_alloc) };
            *dst_alloc = src_alloc;
            if n == 0 {
                return Ok(());
            }
            let fresh = Self::allocate_block(desc, src_alloc, n)?;
            // SAFETY: `source` has `n >= 1` elements, hence storage.
            let src_base = unsafe { source.base() };
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. The fresh block has room for `n` elements, holding none,
            //    disjoint from `source`'s storage.
            // 3. `source`'s live range holds `n` initialized elements.
            unsafe { range::uninit_copy_n(desc, fresh, src_base, n) };
            // SAFETY: `fresh` holds `n` elements with room for exactly `n`,
            // allocated through the adopted identity.
            unsafe { self.install(desc, fresh, n, n) };
            return Ok(());
        }
        if n == 0 {
            // SAFETY:
            // 1. Guaranteed by the caller
            unsafe { self.clear(desc) };
            return Ok(());
        }
        // SAFETY: `source` has `n >= 1` elements, hence storage.
        let src_base = unsafe { source.base() };
        // SAFETY:
        // 1. Guaranteed by the caller
        // 2. Guaranteed by the caller (obligation 2)
        // 3. `source` is a distinct vector, so its live range is disjoint
        //    from this vector's storage.
        unsafe { self.assign_copy_n(desc, *dst_alloc, src_base, n) }
    }

    /// Takes `source`'s contents.
    ///
    /// When propagating or when the identities are already identical this is
    /// a pointer steal: the old contents are destroyed, the source's storage
    /// is adopted wholesale, and the source is left all-null, with no
    /// per-element work. Otherwise every element is moved individually
    /// through this vector's retained identity; on success the source is
    /// left empty (its storage kept), and on failure both vectors are
    /// unchanged.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `desc` is the descriptor of both vectors
    /// 2. `dst_alloc` is identical to the handle this vector's storage came
    ///    from, and `src_alloc` to the handle `source`'s storage came from
    pub unsafe fn move_assign_from<'a>(
        &mut self,
        source: &mut Vector,
        desc: &TypeDesc,
        dst_alloc: &mut AllocRef<'a>,
        src_alloc: AllocRef<'a>,
        propagation: AllocPropagation,
    ) -> Result<(), CapacityError> {
        if propagation == AllocPropagation::Propagate || dst_alloc.is_identical(src_alloc) {
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. Guaranteed by the caller (obligation 2, old identity)
            unsafe { self.destroy(desc, *dst_alloc) };
            *self = Self {
                first: source.first,
                last: source.last,
                end: source.end,
            };
            *source = Self::new();
            if propagation == AllocPropagation::Propagate {
                *dst_alloc = src_alloc;
            }
            return Ok(());
        }
        let n = source.len(desc);
        if n == 0 {
            // SAFETY:
            // 1. Guaranteed by the caller
            unsafe { self.clear(desc) };
            return Ok(());
        }
        // SAFETY: `source` has `n >= 1` elements, hence storage.
        let src_base = unsafe { source.base() };
        // SAFETY:
        // 1. Guaranteed by the caller
        // 2. Guaranteed by the caller (obligation 2)
        // 3. `source` is a distinct vector with disjoint storage; its
        //    elements are consumed on success and its length is zeroed below.
        unsafe { self.assign_move_n(desc, *dst_alloc, src_base, n)? };
        source.last = source.first;
        Ok(())
    }

    /// A cursor at the first element.
    #[inline]
    pub fn begin(&self) -> Cursor {
        Cursor {
            ptr: self.first,
            #[cfg(debug_assertions)]
            owner: self,
        }
    }

    /// A cursor one past the final element.
    #[inline]
    pub fn end(&self) -> Cursor {
        Cursor {
            ptr: self.last,
            #[cfg(debug_assertions)]
            owner: self,
        }
    }

    /// Iterates over pointers to the live elements.
    ///
    /// The iterator is safe to drive; reading through the yielded pointers is
    /// the caller's `unsafe`. `desc` must be this vector's descriptor for the
    /// pointers to be meaningful.
    #[inline]
    pub fn elements(&self, desc: &TypeDesc) -> Elements<'_> {
        Elements::over(self, desc)
    }

    /// The start of the storage as `NonNull`.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. The vector has storage (nonzero capacity)
    #[inline]
    unsafe fn base(&self) -> NonNull<u8> {
        debug_assert!(!self.first.is_null());
        // SAFETY: Storage implies a non-null `first` (field invariants).
        unsafe { NonNull::new_unchecked(self.first) }
    }

    /// Layout of the current allocation.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `desc` is this vector's descriptor
    /// 2. The vector has storage
    #[inline]
    unsafe fn storage_layout(&self, desc: &TypeDesc) -> Layout {
        let bytes = self.end.addr() - self.first.addr();
        debug_assert!(bytes != 0);
        // SAFETY: The allocation was made with this size and alignment, which
        // satisfied the layout rules then.
        unsafe { Layout::from_size_align_unchecked(bytes, desc.align()) }
    }

    /// Points the fields at a fresh allocation of `cap` elements holding
    /// `len`.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `base` points to an allocation of exactly `cap` elements of `desc`,
    ///    aligned for them, with the first `len` initialized
    /// 2. The prior storage has been released or is released without these
    ///    fields
    #[inline]
    unsafe fn install(&mut self, desc: &TypeDesc, base: NonNull<u8>, len: usize, cap: usize) {
        self.first = base.as_ptr();
        // SAFETY: `len <= cap` elements fit the allocation.
        self.last = unsafe { base.as_ptr().add(desc.byte_len(len)) };
        // SAFETY: `cap` elements are exactly the allocation.
        self.end = unsafe { base.as_ptr().add(desc.byte_len(cap)) };
    }

    /// Destroys `live` remaining old elements, frees the old storage, and
    /// installs the fresh block.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `desc` is this vector's descriptor
    /// 2. `alloc` is identical to the handle the old storage came from
    /// 3. Exactly `live` elements remain initialized in the old storage, at
    ///    its front (zero when they were relocated out)
    /// 4. `base` points to a fresh allocation of exactly `cap` elements with
    ///    the first `len` initialized
    unsafe fn replace_storage(
        &mut self,
        desc: &TypeDesc,
        alloc: AllocRef<'_>,
        live: usize,
        base: NonNull<u8>,
        len: usize,
        cap: usize,
    ) {
        if live != 0 {
            // SAFETY: Live elements imply storage.
            let old = unsafe { self.base() };
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. The `live` elements are initialized (caller obligation 3)
            //    and their storage is freed below.
            unsafe { range::destroy_n(desc, old, live) };
        }
        if self.capacity(desc) != 0 {
            // SAFETY: Nonzero capacity implies storage.
            let old = unsafe { self.base() };
            // SAFETY: As above, and `desc` is the descriptor.
            let layout = unsafe { self.storage_layout(desc) };
            // SAFETY:
            // 1. The old storage came from an identical handle with this
            //    layout.
            // 2. The fields are redirected below, so it is not used again.
            unsafe { alloc.deallocate(old, layout) };
        }
        // SAFETY:
        // 1. Guaranteed by the caller (obligation 4)
        // 2. The old storage was released above.
        unsafe { self.install(desc, base, len, cap) };
    }

    /// Allocates a fresh block for exactly `count` elements.
    fn allocate_block(
        desc: &TypeDesc,
        alloc: AllocRef<'_>,
        count: usize,
    ) -> Result<NonNull<u8>, CapacityError> {
        debug_assert!(count != 0);
        let layout = desc.array_layout(count).ok_or(CapacityError::Overflow)?;
        alloc.allocate(layout).ok_or(CapacityError::AllocFailed)
    }

    /// Picks the capacity for a growth to at least `requested` elements: one
    /// and a half times the current capacity, clamped to the element maximum
    /// and raised to `requested`.
    pub(crate) fn grown_capacity(
        &self,
        desc: &TypeDesc,
        requested: usize,
    ) -> Result<usize, CapacityError> {
        let max_len = desc.max_len();
        if requested > max_len {
            return Err(CapacityError::Overflow);
        }
        let cap = self.capacity(desc);
        Ok(requested.max((cap + cap / 2).min(max_len)))
    }

    /// Allocates a grown buffer for one more element, returning the block,
    /// the gap slot at `at`, and the chosen capacity. The vector is not
    /// touched.
    fn grown_buffer_for_one(
        &self,
        desc: &TypeDesc,
        alloc: AllocRef<'_>,
        at: usize,
    ) -> Result<(NonNull<u8>, NonNull<u8>, usize), CapacityError> {
        let len = self.len(desc);
        let total = len.checked_add(1).ok_or(CapacityError::Overflow)?;
        let new_cap = self.grown_capacity(desc, total)?;
        let fresh = Self::allocate_block(desc, alloc, new_cap)?;
        // SAFETY: `at <= len < new_cap` elements fit the fresh block.
        let gap = unsafe { fresh.add(desc.byte_len(at)) };
        Ok((fresh, gap, new_cap))
    }

    /// Relocates the flanks `[0, at)` and `[at, len)` around the `filled`
    /// elements already constructed in `fresh`, then replaces the storage.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `desc` is this vector's descriptor
    /// 2. `alloc` is identical to the handle the old storage came from
    /// 3. `fresh` is an allocation of exactly `new_cap` elements, aligned,
    ///    with `filled` elements constructed at `[at, at + filled)` and room
    ///    for the current length around them
    /// 4. `at` is at most the current length
    unsafe fn commit_grown_insert(
        &mut self,
        desc: &TypeDesc,
        alloc: AllocRef<'_>,
        fresh: NonNull<u8>,
        at: usize,
        filled: usize,
        new_cap: usize,
    ) {
        let len = self.len(desc);
        let tail = len - at;
        if at != 0 {
            // SAFETY: A nonzero length implies storage.
            let base = unsafe { self.base() };
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. The prefix holds `at` initialized elements, consumed out of
            //    the old buffer, which is freed without touching them again.
            // 3. The fresh block's head has room for `at` elements, disjoint
            //    from the old buffer.
            unsafe { range::uninit_relocate_n(desc, fresh, base, at) };
        }
        if tail != 0 {
            // SAFETY: A nonzero length implies storage.
            let base = unsafe { self.base() };
            // SAFETY: `at < len`, in bounds.
            let src = unsafe { base.add(desc.byte_len(at)) };
            // SAFETY: `at + filled + tail <= new_cap`, in bounds.
            let dst = unsafe { fresh.add(desc.byte_len(at + filled)) };
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. The suffix holds `tail` initialized elements, consumed out
            //    of the old buffer, which is freed without touching them
            //    again.
            // 3. The fresh block has room for them past the filled gap,
            //    disjoint from the old buffer.
            unsafe { range::uninit_relocate_n(desc, dst, src, tail) };
        }
        // SAFETY:
        // 1. Guaranteed by the caller
        // 2. Guaranteed by the caller
        // 3. The old storage holds no live elements; they were relocated out.
        // 4. `fresh` holds `len + filled` elements with room for `new_cap`.
        unsafe { self.replace_storage(desc, alloc, 0, fresh, len + filled, new_cap) };
    }

    /// Shifts the tail at `at` up one slot and relocates the staged element
    /// into the gap, returning the gap slot.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `desc` is this vector's descriptor
    /// 2. `at` is at most the length, at least one slot of spare capacity
    ///    exists, and `staged` points to an initialized element in storage
    ///    outside the vector; it is consumed
    unsafe fn place_staged(
        &mut self,
        desc: &TypeDesc,
        at: usize,
        staged: NonNull<u8>,
    ) -> NonNull<u8> {
        let len = self.len(desc);
        // SAFETY: Spare capacity implies storage.
        let base = unsafe { self.base() };
        // SAFETY: `at <= len`, in bounds.
        let gap = unsafe { base.add(desc.byte_len(at)) };
        let tail = len - at;
        if tail != 0 {
            // SAFETY: `len + 1` elements fit the capacity.
            let dst = unsafe { gap.add(desc.size()) };
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. The tail holds `tail` initialized elements, consumed here;
            //    their relocated copies re-establish all but the gap slot.
            // 3. `dst` is one slot above `gap` within the allocation; walking
            //    back to front consumes each slot before it is written.
            unsafe { range::uninit_relocate_backward_n(desc, dst, gap, tail) };
        }
        // SAFETY:
        // 1. Guaranteed by the caller
        // 2. `staged` is initialized and consumed per the caller; its frame
        //    releases only storage.
        // 3. The gap slot is uninitialized (tail shifted out, or it was the
        //    first spare slot), aligned, not overlapping the staging storage.
        unsafe { desc.relocate(gap, staged) };
        // SAFETY: One more element fits the spare capacity.
        self.last = unsafe { self.last.add(desc.size()) };
        gap
    }
}

impl Default for Vector {
    fn default() -> Self {
        Self::new()
    }
}

/// Position within a [`Vector`], one word in release builds.
///
/// Cursors are plain positions: copying them is free, and they do not borrow
/// the vector. Any operation that moves elements or reallocates invalidates
/// every cursor into the vector; using an invalidated cursor is undefined
/// behavior. Debug builds record the owning vector and verify it where they
/// can.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cursor {
    /// Address of the designated element, or one past the final element.
    ptr: *mut u8,
    /// The vector this cursor positions into, for debug verification.
    #[cfg(debug_assertions)]
    owner: *const Vector,
}

impl Cursor {
    /// Moves the cursor `delta` elements forward, or backward when negative.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. The cursor is valid: its vector is live, unmoved, and has not
    ///    relocated its elements since the cursor was made; `desc` is that
    ///    vector's descriptor
    /// 2. The resulting position stays within the live range or one past it
    pub unsafe fn advance(&mut self, desc: &TypeDesc, delta: isize) {
        let byte_delta = delta.wrapping_mul(desc.size() as isize);
        self.ptr = self.ptr.wrapping_offset(byte_delta);
        #[cfg(debug_assertions)]
        {
            // SAFETY: The owner is live and unmoved (caller obligation 1).
            let owner = unsafe { &*self.owner };
            debug_assert!(owner.owns_position(desc, self.ptr));
        }
    }

    /// Signed element distance from `self` to `other`.
    ///
    /// Both cursors must position into the same vector and `desc` must be its
    /// descriptor; otherwise the result is meaningless (debug builds assert
    /// the shared owner).
    pub fn distance_to(self, desc: &TypeDesc, other: Cursor) -> isize {
        #[cfg(debug_assertions)]
        debug_assert!(core::ptr::eq(self.owner, other.owner));
        let bytes = (other.ptr.addr() as isize).wrapping_sub(self.ptr.addr() as isize);
        desc.elements_of_signed(bytes)
    }

    /// The element this cursor designates.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. The cursor is valid (see [`Cursor::advance`]) and `desc` is its
    ///    vector's descriptor
    /// 2. The cursor designates a live element, not the one-past-the-end
    ///    position
    pub unsafe fn get(self, desc: &TypeDesc) -> NonNull<u8> {
        #[cfg(debug_assertions)]
        {
            // SAFETY: The owner is live and unmoved (caller obligation 1).
            let owner = unsafe { &*self.owner };
            debug_assert!(owner.owns_position(desc, self.ptr));
            debug_assert!(self.ptr.addr() < owner.last.addr());
        }
        #[cfg(not(debug_assertions))]
        let _ = desc;
        // SAFETY: A live element has a non-null address (caller obligation
        // 2).
        unsafe { NonNull::new_unchecked(self.ptr) }
    }
}

#[cfg(debug_assertions)]
impl Vector {
    /// Whether `ptr` is an element position of this vector, including one
    /// past the end.
    fn owns_position(&self, desc: &TypeDesc, ptr: *mut u8) -> bool {
        let addr = ptr.addr();
        addr >= self.first.addr()
            && addr <= self.last.addr()
            && (addr - self.first.addr()) % desc.size() == 0
    }
}
