//! Runtime type descriptor.
//!
//! A [`TypeDesc`] is the complete runtime record of one element type: its
//! size and alignment, the precomputed [`Reciprocal`] of its stride, and the
//! optional [`TypeOps`] callbacks. Containers receive a descriptor on every
//! type-aware call instead of a compile-time type parameter; the descriptor
//! owns nothing and is shared read-only.
//!
//! This module encapsulates the descriptor's fields so the validation
//! performed by [`TypeDesc::define_with`] cannot be bypassed. Every other
//! component may therefore rely on the record's invariants: the size is
//! nonzero, a multiple of the alignment, at most `isize::MAX`, and the
//! reciprocal matches it.
//!
//! # Relocation protocol
//!
//! Moving an element to a new address composes with destruction in exactly one
//! of three ways, chosen by which callbacks the descriptor declares:
//!
//! - a declared move callback constructs the destination and leaves the source
//!   constructed (moved-from); the engine destroys the source afterwards;
//! - otherwise a declared copy callback constructs the destination and the
//!   engine destroys the source afterwards;
//! - with neither, the bytes themselves transfer and the source becomes
//!   uninitialized without any destructor call.
//!
//! The third form is what makes descriptors built by [`TypeOps::for_type`]
//! correct for every Rust type: Rust values relocate by byte transfer, and
//! running a destructor on a byte-moved-out slot would be a double drop.

mod ops;

use core::{alloc::Layout, ptr::NonNull};

pub use ops::{CopyFn, DropFn, EqualFn, HashFn, LessFn, MoveFn, TypeOps};

use crate::recip::Reciprocal;

/// Byte written over destroyed storage in debug builds when no destructor is
/// declared, to make use-after-destroy bugs loud.
const SCRIBBLE: u8 = 0xDD;

/// Error from validating a descriptor definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum DescriptorError {
    /// The element size was zero, not a multiple of the alignment, or above
    /// `isize::MAX`.
    #[error("element size must be nonzero, a multiple of the alignment, and at most isize::MAX")]
    InvalidSize,
    /// The element alignment was zero or not a power of two.
    #[error("element alignment must be a nonzero power of two")]
    InvalidAlignment,
}

/// Runtime record of one element type.
///
/// Immutable once defined; see the module docs for the invariants
/// [`TypeDesc::define_with`] establishes.
#[derive(Clone, Copy, Debug)]
pub struct TypeDesc {
    /// Element size in bytes; also the array stride (validation requires it to
    /// be a multiple of the alignment).
    size: usize,
    /// Log2 of the element alignment.
    align_log2: u8,
    /// Reciprocal of `size`, computed at definition time.
    recip: Reciprocal,
    /// Optional lifecycle and comparison callbacks.
    ops: TypeOps,
    /// Whether a move callback is declared, cached for the relocation branch.
    uses_move: bool,
}

impl TypeDesc {
    /// Defines a descriptor for a trivial type: no callbacks, byte copies and
    /// byte moves throughout, destruction a no-op.
    pub const fn define(size: usize, align: usize) -> Result<Self, DescriptorError> {
        Self::define_with(size, align, TypeOps::new())
    }

    /// Defines a descriptor with the given callback table.
    ///
    /// Validates that `align` is a power of two and that `size` is nonzero, a
    /// multiple of `align`, and at most `isize::MAX`, then computes the
    /// reciprocal of the stride.
    pub const fn define_with(
        size: usize,
        align: usize,
        ops: TypeOps,
    ) -> Result<Self, DescriptorError> {
        if !align.is_power_of_two() {
            return Err(DescriptorError::InvalidAlignment);
        }
        if size == 0 || size % align != 0 || size > isize::MAX as usize {
            return Err(DescriptorError::InvalidSize);
        }
        Ok(Self {
            size,
            align_log2: align.trailing_zeros() as u8,
            recip: Reciprocal::compute(size),
            ops,
            uses_move: ops.move_fn().is_some(),
        })
    }

    /// Defines a descriptor for the Rust type `T`.
    ///
    /// Layout comes from `T`, a destructor is registered iff `T` needs one,
    /// and relocation is by byte transfer. Fails with
    /// [`DescriptorError::InvalidSize`] for zero-sized types, which the
    /// containers cannot hold.
    pub const fn of<T: 'static>() -> Result<Self, DescriptorError> {
        Self::define_with(size_of::<T>(), align_of::<T>(), TypeOps::for_type::<T>())
    }

    /// Element size in bytes.
    #[inline]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Element alignment in bytes.
    #[inline]
    pub const fn align(&self) -> usize {
        1 << self.align_log2
    }

    /// Log2 of the element alignment.
    #[inline]
    pub const fn align_log2(&self) -> u8 {
        self.align_log2
    }

    /// Whether relocation routes through a declared move callback (and must
    /// therefore destroy its sources).
    #[inline]
    pub const fn uses_move(&self) -> bool {
        self.uses_move
    }

    /// Largest element count any allocation can hold, `isize::MAX / size`.
    #[inline]
    pub const fn max_len(&self) -> usize {
        self.recip.divide(isize::MAX as usize, self.size)
    }

    /// Converts a byte distance into an element count via the reciprocal.
    ///
    /// `bytes` must be an exact multiple of the element size (debug-checked).
    #[inline]
    pub fn elements_of(&self, bytes: usize) -> usize {
        debug_assert_eq!(self.recip.remainder(bytes, self.size), 0);
        self.recip.divide(bytes, self.size)
    }

    /// Signed variant of [`TypeDesc::elements_of`] for iterator distances.
    #[inline]
    pub fn elements_of_signed(&self, bytes: isize) -> isize {
        debug_assert_eq!(self.recip.remainder(bytes.unsigned_abs(), self.size), 0);
        self.recip.divide_signed(bytes, self.size)
    }

    /// Byte length of `count` elements.
    ///
    /// `count` must not exceed [`TypeDesc::max_len`] (debug-checked); the
    /// product then cannot overflow.
    #[inline]
    pub const fn byte_len(&self, count: usize) -> usize {
        debug_assert!(count <= self.max_len());
        count * self.size
    }

    /// Layout of an array of `count` elements, or `None` when `count` exceeds
    /// [`TypeDesc::max_len`].
    ///
    /// The count is compared against the maximum before the stride multiply,
    /// so the byte size can neither overflow nor exceed `isize::MAX`.
    #[inline]
    pub fn array_layout(&self, count: usize) -> Option<Layout> {
        if count > self.max_len() {
            return None;
        }
        Layout::from_size_align(count * self.size, self.align()).ok()
    }

    /// Copy-constructs the element at `src` into the uninitialized slot `dst`,
    /// through the copy callback or by byte copy when none is declared.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. This descriptor correctly describes the elements at `src` and `dst`
    /// 2. `src` points to an initialized element
    /// 3. `dst` points to writable storage for one element, aligned to
    ///    [`TypeDesc::align`], not overlapping `*src`
    #[inline]
    pub unsafe fn copy_construct(&self, dst: NonNull<u8>, src: NonNull<u8>) {
        match self.ops.copy_fn() {
            // SAFETY: The callback was registered for this descriptor's
            // element type. Its requirements are upheld:
            // 1. Guaranteed by the caller (obligation 2)
            // 2. Guaranteed by the caller (obligation 3)
            Some(callback) => unsafe { callback(dst, src) },
            // SAFETY: `src` is readable and `dst` writable for `size` bytes
            // without overlap, guaranteed by the caller.
            None => unsafe {
                core::ptr::copy_nonoverlapping(src.as_ptr(), dst.as_ptr(), self.size)
            },
        }
    }

    /// Move-constructs from `src` into the uninitialized slot `dst`, through
    /// the move callback or by byte transfer when none is declared.
    ///
    /// Afterwards, if this descriptor [`uses_move`](TypeDesc::uses_move) the
    /// source is constructed but moved-from and must still be destroyed;
    /// otherwise its bytes have been transferred and it must be treated as
    /// uninitialized.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. This descriptor correctly describes the elements at `src` and `dst`
    /// 2. `src` points to an initialized element
    /// 3. `dst` points to writable storage for one element, aligned to
    ///    [`TypeDesc::align`], not overlapping `*src`
    #[inline]
    pub unsafe fn move_construct(&self, dst: NonNull<u8>, src: NonNull<u8>) {
        match self.ops.move_fn() {
            // SAFETY: The callback was registered for this descriptor's
            // element type. Its requirements are upheld:
            // 1. Guaranteed by the caller (obligation 2)
            // 2. Guaranteed by the caller (obligation 3)
            Some(callback) => unsafe { callback(dst, src) },
            // SAFETY: `src` is readable and `dst` writable for `size` bytes
            // without overlap, guaranteed by the caller.
            None => unsafe {
                core::ptr::copy_nonoverlapping(src.as_ptr(), dst.as_ptr(), self.size)
            },
        }
    }

    /// Relocates the element at `src` into the uninitialized slot `dst`
    /// following the protocol in the module docs. In every case `*src` is
    /// uninitialized when this returns.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. This descriptor correctly describes the elements at `src` and `dst`
    /// 2. `src` points to an initialized element that is not used again until
    ///    re-initialized
    /// 3. `dst` points to writable storage for one element, aligned to
    ///    [`TypeDesc::align`], not overlapping `*src`
    #[inline]
    pub unsafe fn relocate(&self, dst: NonNull<u8>, src: NonNull<u8>) {
        if self.uses_move {
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. Guaranteed by the caller
            // 3. Guaranteed by the caller
            unsafe { self.move_construct(dst, src) };
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. The move callback left the source constructed (moved-from),
            //    and the caller will not touch it again.
            unsafe { self.destroy_in_place(src) };
        } else if self.ops.copy_fn().is_some() {
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. Guaranteed by the caller
            // 3. Guaranteed by the caller
            unsafe { self.copy_construct(dst, src) };
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. The copy left the source untouched, and the caller will not
            //    use it again.
            unsafe { self.destroy_in_place(src) };
        } else {
            // Byte transfer: ownership moves with the bytes, so the source
            // must not see a destructor call.
            // SAFETY: `src` is readable and `dst` writable for `size` bytes
            // without overlap, guaranteed by the caller.
            unsafe {
                core::ptr::copy_nonoverlapping(src.as_ptr(), dst.as_ptr(), self.size)
            };
        }
    }

    /// Destroys the element in `slot`, through the destructor callback or (in
    /// debug builds) by scribbling the storage when none is declared.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. This descriptor correctly describes the element at `slot`
    /// 2. `slot` points to an initialized element that is not used again until
    ///    re-initialized
    #[inline]
    pub unsafe fn destroy_in_place(&self, slot: NonNull<u8>) {
        match self.ops.drop_fn() {
            // SAFETY: The callback was registered for this descriptor's
            // element type. Its requirement is upheld:
            // 1. Guaranteed by the caller (obligation 2)
            Some(callback) => unsafe { callback(slot) },
            None => {
                if cfg!(debug_assertions) {
                    // SAFETY: `slot` is writable for `size` bytes, guaranteed
                    // by the caller; the element is trivially destructible so
                    // overwriting it is harmless.
                    unsafe { slot.as_ptr().write_bytes(SCRIBBLE, self.size) };
                }
            }
        }
    }

    /// Compares two elements through the equality callback, or `None` when the
    /// type declares none.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. This descriptor correctly describes the elements at `a` and `b`
    /// 2. `a` and `b` both point to initialized elements
    #[inline]
    pub unsafe fn try_equal(&self, a: NonNull<u8>, b: NonNull<u8>) -> Option<bool> {
        let callback = self.ops.equal_fn()?;
        // SAFETY: The callback was registered for this descriptor's element
        // type; both pointers reference initialized elements per the caller.
        Some(unsafe { callback(a, b) })
    }

    /// Orders two elements through the less-than callback, or `None` when the
    /// type declares none.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. This descriptor correctly describes the elements at `a` and `b`
    /// 2. `a` and `b` both point to initialized elements
    #[inline]
    pub unsafe fn try_less(&self, a: NonNull<u8>, b: NonNull<u8>) -> Option<bool> {
        let callback = self.ops.less_fn()?;
        // SAFETY: The callback was registered for this descriptor's element
        // type; both pointers reference initialized elements per the caller.
        Some(unsafe { callback(a, b) })
    }

    /// Hashes one element through the hash callback, or `None` when the type
    /// declares none.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. This descriptor correctly describes the element at `slot`
    /// 2. `slot` points to an initialized element
    #[inline]
    pub unsafe fn try_hash(&self, slot: NonNull<u8>) -> Option<u64> {
        let callback = self.ops.hash_fn()?;
        // SAFETY: The callback was registered for this descriptor's element
        // type; `slot` references an initialized element per the caller.
        Some(unsafe { callback(slot) })
    }
}
