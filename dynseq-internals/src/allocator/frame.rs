//! Staging storage for one element.
//!
//! An [`AllocFrame`] provides a slot that survives a container rearranging its
//! own storage, which is what makes self-aliasing single-element inserts work:
//! the element is constructed into the frame first, the container shifts or
//! reallocates, and the element is then relocated from the frame into its
//! final slot.
//!
//! Small elements stage in an inline buffer and never touch the allocator;
//! larger ones spill into a single allocation that the frame releases when
//! dropped, on every exit path.

use core::{alloc::Layout, mem::MaybeUninit, ptr::NonNull};

use crate::{allocator::handle::AllocRef, desc::TypeDesc};

/// Byte capacity of the inline staging buffer.
const INLINE_LEN: usize = 64;

/// Alignment of the inline staging buffer.
const INLINE_ALIGN: usize = 16;

/// Inline staging storage.
#[repr(C, align(16))]
struct InlineBuf {
    /// The staging bytes; validity is tracked by the frame's user.
    bytes: MaybeUninit<[u8; INLINE_LEN]>,
}

/// Storage for exactly one element, inline when it fits and allocated
/// otherwise.
///
/// The frame releases only storage: a value constructed in the slot must be
/// relocated out or destroyed by the user before the frame is dropped.
pub struct AllocFrame<'a> {
    /// Inline storage, used when the element layout fits [`INLINE_LEN`] and
    /// [`INLINE_ALIGN`].
    inline: InlineBuf,
    /// The spilled allocation, when the element layout does not fit inline.
    ///
    /// # Safety
    ///
    /// When `Some`, the block was allocated through `alloc` with `layout` and
    /// is owned by this frame until dropped.
    spill: Option<NonNull<u8>>,
    /// Layout of one element, used to release the spill.
    layout: Layout,
    /// The allocator the spill came from and returns to.
    alloc: AllocRef<'a>,
}

impl<'a> AllocFrame<'a> {
    /// Acquires staging storage for one element of `desc`.
    ///
    /// Returns `None` when the element does not fit inline and the allocator
    /// refuses the request; no storage is held in that case.
    pub fn acquire(desc: &TypeDesc, alloc: AllocRef<'a>) -> Option<Self> {
        let layout = desc.array_layout(1)?;
        let spill = if desc.size() <= INLINE_LEN && desc.align() <= INLINE_ALIGN {
            None
        } else {
            Some(alloc.allocate(layout)?)
        };
        Some(Self {
            inline: InlineBuf {
                bytes: MaybeUninit::uninit(),
            },
            spill,
            layout,
            alloc,
        })
    }

    /// The staging slot: writable storage for one element, aligned for it.
    ///
    /// The pointer stays valid until the frame is dropped.
    #[inline]
    pub fn slot(&mut self) -> NonNull<u8> {
        match self.spill {
            Some(block) => block,
            None => NonNull::from(&mut self.inline).cast::<u8>(),
        }
    }
}

impl core::ops::Drop for AllocFrame<'_> {
    #[inline]
    fn drop(&mut self) {
        if let Some(block) = self.spill {
            // SAFETY:
            // 1. The block was allocated in `acquire` through this same handle
            //    with this same layout.
            // 2. The frame is being dropped, so the block is not used again.
            unsafe { self.alloc.deallocate(block, self.layout) };
        }
    }
}
