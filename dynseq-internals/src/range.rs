//! Counted algorithms over typed byte ranges.
//!
//! Everything here walks a range element by element, advancing byte pointers
//! by the descriptor's stride and dispatching each step through the
//! descriptor's callbacks (or their byte-level fallbacks). The engines compose
//! these loops; no other code iterates erased storage.
//!
//! # The two families
//!
//! The *assigning* family ([`fill_n`], [`copy_n`], [`move_n`]) overwrites live
//! elements, destroying each destination slot before constructing into it.
//! The *uninitialized* family ([`uninit_fill_n`], [`uninit_copy_n`],
//! [`uninit_relocate_n`], [`uninit_relocate_backward_n`]) constructs into raw
//! storage.
//!
//! # Sources are consumed by relocation
//!
//! [`move_n`] and both relocate loops follow the descriptor's relocation
//! protocol, which always leaves source slots uninitialized: moved (and
//! destroyed), copied (and destroyed), or transferred as raw bytes. Callers
//! must not destroy consumed sources again. This uniform postcondition is what
//! keeps destructor-bearing elements registered without a move callback from
//! being dropped twice.
//!
//! # Overlap
//!
//! Relocation within one buffer picks the direction that consumes each slot
//! before writing it: [`uninit_relocate_n`] shifts down (destination below
//! source), [`uninit_relocate_backward_n`] shifts up (destination above
//! source). The assigning loops require disjoint ranges.

use core::ptr::NonNull;

use crate::desc::TypeDesc;

/// Destroys `count` elements starting at `first`.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. `desc` correctly describes the elements in the range
/// 2. `first` points to `count` initialized elements that are not used again
///    until re-initialized
pub unsafe fn destroy_n(desc: &TypeDesc, first: NonNull<u8>, count: usize) {
    let size = desc.size();
    let mut slot = first;
    for _ in 0..count {
        // SAFETY:
        // 1. Guaranteed by the caller
        // 2. The slot is one of the caller's `count` initialized elements and
        //    is not used again.
        unsafe { desc.destroy_in_place(slot) };
        // SAFETY: The next slot stays within the caller's range (or one past
        // its end on the final step).
        slot = unsafe { slot.add(size) };
    }
}

/// Overwrites `count` live elements at `dst` with copies of `*value`.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. `desc` correctly describes the elements involved
/// 2. `dst` points to `count` initialized elements
/// 3. `value` points to an initialized element outside the destination range
pub unsafe fn fill_n(desc: &TypeDesc, dst: NonNull<u8>, count: usize, value: NonNull<u8>) {
    let size = desc.size();
    let mut slot = dst;
    for _ in 0..count {
        // SAFETY:
        // 1. Guaranteed by the caller
        // 2. The slot holds one of the caller's initialized elements and is
        //    re-initialized immediately below.
        unsafe { desc.destroy_in_place(slot) };
        // SAFETY:
        // 1. Guaranteed by the caller
        // 2. `value` is initialized and outside the destination range, so the
        //    destroy above did not touch it.
        // 3. The slot is writable storage for one element and does not overlap
        //    `*value`.
        unsafe { desc.copy_construct(slot, value) };
        // SAFETY: The next slot stays within the caller's range (or one past
        // its end on the final step).
        slot = unsafe { slot.add(size) };
    }
}

/// Overwrites `count` live elements at `dst` with copies of the elements at
/// `src`.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. `desc` correctly describes the elements involved
/// 2. `dst` points to `count` initialized elements
/// 3. `src` points to `count` initialized elements, disjoint from the
///    destination range
pub unsafe fn copy_n(desc: &TypeDesc, dst: NonNull<u8>, src: NonNull<u8>, count: usize) {
    let size = desc.size();
    let mut dst_slot = dst;
    let mut src_slot = src;
    for _ in 0..count {
        // SAFETY:
        // 1. Guaranteed by the caller
        // 2. The slot holds one of the caller's initialized elements and is
        //    re-initialized immediately below.
        unsafe { desc.destroy_in_place(dst_slot) };
        // SAFETY:
        // 1. Guaranteed by the caller
        // 2. The source slot is initialized and disjoint from the destination
        //    range, so the destroy above did not touch it.
        // 3. The destination slot is writable storage for one element, not
        //    overlapping the source.
        unsafe { desc.copy_construct(dst_slot, src_slot) };
        // SAFETY: The next slot stays within the caller's range (or one past
        // its end on the final step).
        dst_slot = unsafe { dst_slot.add(size) };
        // SAFETY: As above, for the source range.
        src_slot = unsafe { src_slot.add(size) };
    }
}

/// Overwrites `count` live elements at `dst` by relocating the elements at
/// `src` into them, consuming the sources.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. `desc` correctly describes the elements involved
/// 2. `dst` points to `count` initialized elements
/// 3. `src` points to `count` initialized elements, disjoint from the
///    destination range; the call consumes them (their slots end
///    uninitialized) and they must not be used or destroyed again
pub unsafe fn move_n(desc: &TypeDesc, dst: NonNull<u8>, src: NonNull<u8>, count: usize) {
    let size = desc.size();
    let mut dst_slot = dst;
    let mut src_slot = src;
    for _ in 0..count {
        // SAFETY:
        // 1. Guaranteed by the caller
        // 2. The slot holds one of the caller's initialized elements and is
        //    re-initialized immediately below.
        unsafe { desc.destroy_in_place(dst_slot) };
        // SAFETY:
        // 1. Guaranteed by the caller
        // 2. The source slot is initialized, disjoint from the destination
        //    range, and not used again per the caller.
        // 3. The destination slot was destroyed above, so it is writable
        //    storage for one element, not overlapping the source.
        unsafe { desc.relocate(dst_slot, src_slot) };
        // SAFETY: The next slot stays within the caller's range (or one past
        // its end on the final step).
        dst_slot = unsafe { dst_slot.add(size) };
        // SAFETY: As above, for the source range.
        src_slot = unsafe { src_slot.add(size) };
    }
}

/// Constructs `count` copies of `*value` into the uninitialized range at
/// `dst`.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. `desc` correctly describes the elements involved
/// 2. `dst` points to writable, aligned storage for `count` elements within
///    one allocation, holding no live elements
/// 3. `value` points to an initialized element outside the destination range
pub unsafe fn uninit_fill_n(desc: &TypeDesc, dst: NonNull<u8>, count: usize, value: NonNull<u8>) {
    let size = desc.size();
    let mut slot = dst;
    for _ in 0..count {
        // SAFETY:
        // 1. Guaranteed by the caller
        // 2. `value` is initialized and outside the destination range.
        // 3. The slot is writable storage for one element, not overlapping
        //    `*value`.
        unsafe { desc.copy_construct(slot, value) };
        // SAFETY: The next slot stays within the caller's range (or one past
        // its end on the final step).
        slot = unsafe { slot.add(size) };
    }
}

/// Constructs copies of the `count` elements at `src` into the uninitialized
/// range at `dst`.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. `desc` correctly describes the elements involved
/// 2. `dst` points to writable, aligned storage for `count` elements within
///    one allocation, holding no live elements, disjoint from the source range
/// 3. `src` points to `count` initialized elements
pub unsafe fn uninit_copy_n(desc: &TypeDesc, dst: NonNull<u8>, src: NonNull<u8>, count: usize) {
    let size = desc.size();
    let mut dst_slot = dst;
    let mut src_slot = src;
    for _ in 0..count {
        // SAFETY:
        // 1. Guaranteed by the caller
        // 2. The source slot is initialized.
        // 3. The destination slot is writable storage for one element,
        //    disjoint from the source range.
        unsafe { desc.copy_construct(dst_slot, src_slot) };
        // SAFETY: The next slot stays within the caller's range (or one past
        // its end on the final step).
        dst_slot = unsafe { dst_slot.add(size) };
        // SAFETY: As above, for the source range.
        src_slot = unsafe { src_slot.add(size) };
    }
}

/// Relocates `count` elements from `src` into the storage at `dst`, front to
/// back, consuming the sources.
///
/// Use this direction for downward shifts within one buffer: each overlapping
/// destination slot has already been consumed as a source by the time it is
/// written.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. `desc` correctly describes the elements involved
/// 2. `src` points to `count` initialized elements; the call consumes them
///    (their slots end uninitialized) and they must not be used or destroyed
///    again
/// 3. `dst` points to writable, aligned storage for `count` elements within
///    one allocation, and each destination slot is uninitialized when written:
///    the ranges are disjoint, or `dst` is at a lower address than `src`
pub unsafe fn uninit_relocate_n(desc: &TypeDesc, dst: NonNull<u8>, src: NonNull<u8>, count: usize) {
    let size = desc.size();
    let mut dst_slot = dst;
    let mut src_slot = src;
    for _ in 0..count {
        // SAFETY:
        // 1. Guaranteed by the caller
        // 2. The source slot is initialized and not used again per the caller.
        // 3. The destination slot is uninitialized when written (disjoint
        //    ranges, or already consumed as a source in an earlier step) and
        //    does not overlap this step's source.
        unsafe { desc.relocate(dst_slot, src_slot) };
        // SAFETY: The next slot stays within the caller's range (or one past
        // its end on the final step).
        dst_slot = unsafe { dst_slot.add(size) };
        // SAFETY: As above, for the source range.
        src_slot = unsafe { src_slot.add(size) };
    }
}

/// Relocates `count` elements from `src` into the storage at `dst`, back to
/// front, consuming the sources.
///
/// Use this direction for upward shifts within one buffer: each overlapping
/// destination slot has already been consumed as a source by the time it is
/// written.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. `desc` correctly describes the elements involved
/// 2. `src` points to `count` initialized elements; the call consumes them
///    (their slots end uninitialized) and they must not be used or destroyed
///    again
/// 3. `dst` points to writable, aligned storage for `count` elements within
///    one allocation, and each destination slot is uninitialized when written:
///    the ranges are disjoint, or `dst` is at a higher address than `src`
pub unsafe fn uninit_relocate_backward_n(
    desc: &TypeDesc,
    dst: NonNull<u8>,
    src: NonNull<u8>,
    count: usize,
) {
    let size = desc.size();
    let bytes = desc.byte_len(count);
    // SAFETY: One past the end of the destination range is in bounds of its
    // allocation.
    let mut dst_slot = unsafe { dst.add(bytes) };
    // SAFETY: One past the end of the source range is in bounds of its
    // allocation.
    let mut src_slot = unsafe { src.add(bytes) };
    for _ in 0..count {
        // SAFETY: The previous slot stays within the caller's range.
        dst_slot = unsafe { dst_slot.sub(size) };
        // SAFETY: As above, for the source range.
        src_slot = unsafe { src_slot.sub(size) };
        // SAFETY:
        // 1. Guaranteed by the caller
        // 2. The source slot is initialized and not used again per the caller.
        // 3. The destination slot is uninitialized when written (disjoint
        //    ranges, or already consumed as a source in an earlier step) and
        //    does not overlap this step's source.
        unsafe { desc.relocate(dst_slot, src_slot) };
    }
}

#[cfg(test)]
mod tests {
    use alloc::{string::String, vec::Vec};
    use core::{
        mem::MaybeUninit,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    fn base_of<T>(buffer: &mut [MaybeUninit<T>]) -> NonNull<u8> {
        NonNull::new(buffer.as_mut_ptr()).unwrap().cast()
    }

    #[test]
    fn fill_and_destroy_round_trip() {
        let desc = TypeDesc::of::<u64>().unwrap();
        let mut buffer = [MaybeUninit::<u64>::uninit(); 8];
        let base = base_of(&mut buffer);
        let value: u64 = 7;

        unsafe {
            uninit_fill_n(&desc, base, 8, NonNull::from(&value).cast());
            for slot in &buffer {
                assert_eq!(slot.assume_init(), 7);
            }
            let replacement: u64 = 9;
            fill_n(&desc, base, 3, NonNull::from(&replacement).cast());
            assert_eq!(buffer[0].assume_init(), 9);
            assert_eq!(buffer[2].assume_init(), 9);
            assert_eq!(buffer[3].assume_init(), 7);
            destroy_n(&desc, base, 8);
        }
    }

    #[test]
    fn copy_between_disjoint_ranges() {
        let desc = TypeDesc::of::<u32>().unwrap();
        let source: [u32; 4] = [1, 2, 3, 4];
        let mut buffer = [MaybeUninit::<u32>::uninit(); 4];
        let base = base_of(&mut buffer);

        unsafe {
            uninit_copy_n(&desc, base, NonNull::from(&source).cast(), 4);
        }
        for (slot, expected) in buffer.iter().zip(source) {
            // SAFETY: the copy above initialized every slot.
            assert_eq!(unsafe { slot.assume_init() }, expected);
        }
    }

    #[test]
    fn relocate_shifts_down_within_one_buffer() {
        // Overlapping by three of five slots, as an erase-at-the-front does.
        let desc = TypeDesc::of::<String>().unwrap();
        let mut buffer: [MaybeUninit<String>; 5] = [
            MaybeUninit::new(String::from("a")),
            MaybeUninit::new(String::from("b")),
            MaybeUninit::new(String::from("c")),
            MaybeUninit::new(String::from("d")),
            MaybeUninit::new(String::from("e")),
        ];
        let base = base_of(&mut buffer);

        unsafe {
            // Destroy the first slot, then relocate the remaining four down.
            destroy_n(&desc, base, 1);
            uninit_relocate_n(&desc, base, base.add(desc.size()), 4);

            let survivors: Vec<String> = (0..4)
                .map(|i| base.add(desc.byte_len(i)).cast::<String>().read())
                .collect();
            assert_eq!(survivors, ["b", "c", "d", "e"]);
        }
    }

    #[test]
    fn relocate_shifts_up_within_one_buffer() {
        let desc = TypeDesc::of::<String>().unwrap();
        let mut buffer: [MaybeUninit<String>; 5] = [
            MaybeUninit::new(String::from("a")),
            MaybeUninit::new(String::from("b")),
            MaybeUninit::new(String::from("c")),
            MaybeUninit::uninit(),
            MaybeUninit::uninit(),
        ];
        let base = base_of(&mut buffer);

        unsafe {
            // Shift the three live elements up by two, into the spare slots.
            uninit_relocate_backward_n(&desc, base.add(desc.byte_len(2)), base, 3);

            let survivors: Vec<String> = (2..5)
                .map(|i| base.add(desc.byte_len(i)).cast::<String>().read())
                .collect();
            assert_eq!(survivors, ["a", "b", "c"]);
        }
    }

    #[test]
    fn move_n_consumes_sources_without_double_drop() {
        static DROPS: AtomicUsize = AtomicUsize::new(0);

        struct Tracked {
            _value: u64,
        }
        impl Drop for Tracked {
            fn drop(&mut self) {
                DROPS.fetch_add(1, Ordering::Relaxed);
            }
        }
        let tracked = || MaybeUninit::new(Tracked { _value: 1 });

        let desc = TypeDesc::of::<Tracked>().unwrap();
        let mut destination = [tracked(), tracked()];
        let mut source = [tracked(), tracked()];
        let dst = base_of(&mut destination);
        let src = base_of(&mut source);

        unsafe {
            // Overwriting drops the two destination elements; the sources are
            // consumed without running their destructors.
            move_n(&desc, dst, src, 2);
            assert_eq!(DROPS.load(Ordering::Relaxed), 2);

            destroy_n(&desc, dst, 2);
        }
        assert_eq!(DROPS.load(Ordering::Relaxed), 4);
    }
}
