//! The byte-string layer over the vector engine.
//!
//! [`ZString`] is a [`Vector`] of bytes driven by one fixed `u8` descriptor,
//! plus a terminator discipline: one spare slot past the live range always
//! holds 0, never counted in the length, re-established by every mutator.
//! The buffer is therefore always usable as a C string through
//! [`ZString::as_ptr`].
//!
//! Positions and counts are clamped the way reference string types clamp
//! them, so the mutating operations have no out-of-range undefined behavior;
//! what keeps them `unsafe` is only the allocator identity discipline
//! inherited from the vector. The borrow rules do the aliasing work: a
//! `&[u8]` argument can never overlap the string's own buffer while `&mut
//! self` is held.

use core::{fmt, ptr::NonNull};

use dynseq_internals::{AllocRef, TypeDesc};

use crate::{errors::CapacityError, vector::Vector};

/// The `u8` element descriptor every string shares.
static BYTE_DESC: TypeDesc = match TypeDesc::of::<u8>() {
    Ok(desc) => desc,
    Err(_) => panic!("a byte descriptor is always definable"),
};

/// The image of a string that was never given storage: just a terminator.
static EMPTY: [u8; 1] = [0];

/// Zero-terminated byte string over the vector engine.
///
/// The null state ([`ZString::new`]) holds no storage; the accessors then
/// borrow a shared static terminator. The first mutation allocates.
///
/// # Examples
///
/// ```
/// use dynseq::{AllocRef, ZString};
///
/// let alloc = AllocRef::global();
/// let mut greeting = ZString::new();
///
/// // SAFETY: `alloc` is the handle for all of this string's storage.
/// unsafe { greeting.assign(alloc, b"hello world").unwrap() };
/// assert_eq!(greeting.len(), 11);
/// assert_eq!(greeting.find(b"world", 0), Some(6));
/// assert_eq!(greeting.as_bytes_with_nul().last(), Some(&0));
///
/// // SAFETY: same handle as every prior call.
/// unsafe { greeting.destroy(alloc) };
/// ```
#[repr(transparent)]
pub struct ZString {
    /// The byte buffer.
    ///
    /// # Safety
    ///
    /// The following invariants hold whenever no method of this type is
    /// executing: either the vector is all-null, or its capacity exceeds its
    /// length and the spare byte directly past the live range holds 0. Only
    /// [`BYTE_DESC`] is ever passed to it.
    vec: Vector,
}

impl ZString {
    /// Creates an empty string with no storage.
    #[inline]
    pub const fn new() -> Self {
        Self { vec: Vector::new() }
    }

    /// The shared descriptor driving every string's buffer.
    #[inline]
    pub fn descriptor() -> &'static TypeDesc {
        &BYTE_DESC
    }

    /// Number of content bytes, excluding the terminator.
    #[inline]
    pub fn len(&self) -> usize {
        self.vec.len(&BYTE_DESC)
    }

    /// Whether the string holds no content bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vec.is_empty()
    }

    /// Content bytes the current storage can hold, keeping the terminator
    /// slot reserved.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.vec.capacity(&BYTE_DESC).saturating_sub(1)
    }

    /// The content bytes, terminator excluded.
    pub fn as_bytes(&self) -> &[u8] {
        match self.vec.first_ptr() {
            // SAFETY: The live range holds `len` initialized bytes, borrowed
            // for as long as `self`.
            Some(base) => unsafe { core::slice::from_raw_parts(base.as_ptr(), self.len()) },
            None => &[],
        }
    }

    /// The content bytes followed by the terminator.
    pub fn as_bytes_with_nul(&self) -> &[u8] {
        match self.vec.first_ptr() {
            // SAFETY: The live range plus the sealed terminator slot are
            // initialized (type invariant).
            Some(base) => unsafe { core::slice::from_raw_parts(base.as_ptr(), self.len() + 1) },
            None => &EMPTY,
        }
    }

    /// Pointer to the zero-terminated buffer, usable as a C string.
    pub fn as_ptr(&self) -> *const u8 {
        match self.vec.first_ptr() {
            Some(base) => base.as_ptr(),
            None => EMPTY.as_ptr(),
        }
    }

    /// Frees the storage, leaving the null state.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `alloc` is identical to the handle the storage came from
    pub unsafe fn destroy(&mut self, alloc: AllocRef<'_>) {
        // SAFETY:
        // 1. `BYTE_DESC` is the one descriptor ever used with the buffer.
        // 2. Guaranteed by the caller
        unsafe { self.vec.destroy(&BYTE_DESC, alloc) };
    }

    /// Replaces the whole content with `bytes`.
    ///
    /// Unchanged on failure.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `alloc` is identical to the handle the storage came from
    pub unsafe fn assign(
        &mut self,
        alloc: AllocRef<'_>,
        bytes: &[u8],
    ) -> Result<(), CapacityError> {
        let len = self.len();
        // SAFETY:
        // 1. Guaranteed by the caller
        unsafe { self.replace(alloc, 0, len, bytes) }
    }

    /// Inserts `bytes` before position `pos`, clamped to the length.
    ///
    /// Unchanged on failure.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `alloc` is identical to the handle the storage came from
    pub unsafe fn insert(
        &mut self,
        alloc: AllocRef<'_>,
        pos: usize,
        bytes: &[u8],
    ) -> Result<(), CapacityError> {
        // SAFETY:
        // 1. Guaranteed by the caller
        unsafe { self.replace(alloc, pos, 0, bytes) }
    }

    /// Appends one byte.
    ///
    /// Unchanged on failure.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `alloc` is identical to the handle the storage came from
    pub unsafe fn push_byte(&mut self, alloc: AllocRef<'_>, byte: u8) -> Result<(), CapacityError> {
        let len = self.len();
        // SAFETY:
        // 1. Guaranteed by the caller
        unsafe { self.grow_for(alloc, len + 1)? };
        // SAFETY:
        // 1. `BYTE_DESC` is the one descriptor ever used with the buffer.
        // 2. Guaranteed by the caller
        // 3. The byte lives on the stack, outside the buffer.
        unsafe { self.vec.push_copy(&BYTE_DESC, alloc, NonNull::from(&byte).cast())? };
        // SAFETY: The buffer was grown for the new length plus the
        // terminator.
        unsafe { self.seal() };
        Ok(())
    }

    /// Removes `count` bytes at `pos`; both are clamped to the content.
    pub fn erase(&mut self, pos: usize, count: usize) {
        let len = self.len();
        let pos = pos.min(len);
        let count = count.min(len - pos);
        if count == 0 {
            return;
        }
        // SAFETY:
        // 1. `BYTE_DESC` is the one descriptor ever used with the buffer.
        // 2. The clamped range lies within the length.
        unsafe { self.vec.erase_range(&BYTE_DESC, pos, pos + count) };
        // SAFETY: The erase vacated at least one spare byte past the new
        // live range.
        unsafe { self.seal() };
    }

    /// Replaces the `count` bytes at `pos` with `bytes`; position and count
    /// are clamped to the content.
    ///
    /// The buffer is grown to the final size up front, so failure leaves the
    /// string unchanged.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `alloc` is identical to the handle the storage came from
    pub unsafe fn replace(
        &mut self,
        alloc: AllocRef<'_>,
        pos: usize,
        count: usize,
        bytes: &[u8],
    ) -> Result<(), CapacityError> {
        let len = self.len();
        let pos = pos.min(len);
        let count = count.min(len - pos);
        let n = bytes.len();
        let total = (len - count).checked_add(n).ok_or(CapacityError::Overflow)?;
        if total == 0 && self.vec.capacity(&BYTE_DESC) == 0 {
            return Ok(());
        }
        // SAFETY:
        // 1. Guaranteed by the caller
        unsafe { self.grow_for(alloc, total)? };
        let tail = len - pos - count;
        if n > count {
            let zero: u8 = 0;
            // Extend to the final size first; the capacity is already there,
            // so this stays in place.
            // SAFETY:
            // 1. `BYTE_DESC` is the one descriptor ever used with the
            //    buffer.
            // 2. Guaranteed by the caller
            // 3. The fill byte lives on the stack, outside the buffer.
            unsafe {
                self.vec
                    .resize_fill(&BYTE_DESC, alloc, total, NonNull::from(&zero).cast())?
            };
            if tail != 0 {
                // SAFETY: `total >= 1`, so storage exists.
                let base = unsafe { self.base() };
                // SAFETY: `pos + count + tail == len <= total`, in bounds.
                let src = unsafe { base.as_ptr().add(pos + count) };
                // SAFETY: `pos + n + tail == total`, in bounds.
                let dst = unsafe { base.as_ptr().add(pos + n) };
                // SAFETY: Both ranges lie within the live bytes; `copy`
                // permits the overlap.
                unsafe { core::ptr::copy(src, dst, tail) };
            }
        } else if n < count {
            if tail != 0 {
                // SAFETY: `len >= 1`, so storage exists.
                let base = unsafe { self.base() };
                // SAFETY: `pos + count + tail == len`, in bounds.
                let src = unsafe { base.as_ptr().add(pos + count) };
                // SAFETY: `pos + n < pos + count`, in bounds.
                let dst = unsafe { base.as_ptr().add(pos + n) };
                // SAFETY: Both ranges lie within the live bytes; `copy`
                // permits the overlap.
                unsafe { core::ptr::copy(src, dst, tail) };
            }
            // SAFETY:
            // 1. `BYTE_DESC` is the one descriptor ever used with the
            //    buffer.
            // 2. `total <= len`, a valid erase range.
            unsafe { self.vec.erase_range(&BYTE_DESC, total, len) };
        }
        if n != 0 {
            // SAFETY: `total >= n >= 1`, so storage exists.
            let base = unsafe { self.base() };
            // SAFETY: `pos + n <= total`, in bounds.
            let dst = unsafe { base.as_ptr().add(pos) };
            // SAFETY: The borrow rules keep `bytes` disjoint from this
            // string's own buffer.
            unsafe { core::ptr::copy_nonoverlapping(bytes.as_ptr(), dst, n) };
        }
        // SAFETY: The buffer was grown for `total` plus the terminator.
        unsafe { self.seal() };
        Ok(())
    }

    /// Position of the first occurrence of `needle` at or after `from`.
    ///
    /// An empty needle is found at `from` whenever `from` is within the
    /// content; a `from` past the end finds nothing.
    pub fn find(&self, needle: &[u8], from: usize) -> Option<usize> {
        let bytes = self.as_bytes();
        if from > bytes.len() {
            return None;
        }
        if needle.is_empty() {
            return Some(from);
        }
        if needle.len() > bytes.len() - from {
            return None;
        }
        let last_start = bytes.len() - needle.len();
        (from..=last_start).find(|&i| &bytes[i..i + needle.len()] == needle)
    }

    /// Position of the first occurrence of `byte` at or after `from`.
    pub fn find_byte(&self, byte: u8, from: usize) -> Option<usize> {
        let bytes = self.as_bytes();
        if from > bytes.len() {
            return None;
        }
        bytes[from..].iter().position(|&b| b == byte).map(|i| from + i)
    }

    /// A freshly allocated string holding the `count` bytes at `pos`, both
    /// clamped to the content.
    ///
    /// The returned string's storage belongs to `alloc`, which must
    /// accompany it from here on.
    pub fn substring(
        &self,
        alloc: AllocRef<'_>,
        pos: usize,
        count: usize,
    ) -> Result<ZString, CapacityError> {
        let bytes = self.as_bytes();
        let pos = pos.min(bytes.len());
        let count = count.min(bytes.len() - pos);
        let mut out = ZString::new();
        // SAFETY:
        // 1. The fresh string has no storage; `alloc` becomes its identity
        //    here.
        unsafe { out.assign(alloc, &bytes[pos..pos + count])? };
        Ok(out)
    }

    /// Copies content bytes starting at `pos` into `out`, without the
    /// terminator, returning how many were copied.
    pub fn copy_to(&self, pos: usize, out: &mut [u8]) -> usize {
        let bytes = self.as_bytes();
        let pos = pos.min(bytes.len());
        let count = out.len().min(bytes.len() - pos);
        out[..count].copy_from_slice(&bytes[pos..pos + count]);
        count
    }

    /// Grows the buffer to hold `total` content bytes plus the terminator,
    /// applying the vector's growth policy.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `alloc` is identical to the handle the storage came from
    unsafe fn grow_for(&mut self, alloc: AllocRef<'_>, total: usize) -> Result<(), CapacityError> {
        let needed = total.checked_add(1).ok_or(CapacityError::Overflow)?;
        if needed <= self.vec.capacity(&BYTE_DESC) {
            return Ok(());
        }
        let target = self.vec.grown_capacity(&BYTE_DESC, needed)?;
        // SAFETY:
        // 1. `BYTE_DESC` is the one descriptor ever used with the buffer.
        // 2. Guaranteed by the caller
        unsafe { self.vec.reserve(&BYTE_DESC, alloc, target) }
    }

    /// Writes the terminator into the spare slot past the content.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. The buffer exists, with at least one spare byte past the live
    ///    range
    unsafe fn seal(&mut self) {
        let len = self.len();
        debug_assert!(self.vec.capacity(&BYTE_DESC) > len);
        // SAFETY: Storage exists (caller obligation 1).
        let base = unsafe { self.base() };
        // SAFETY: The spare slot at `len` is within the allocation.
        let slot = unsafe { base.add(len) };
        // SAFETY: The slot is writable spare storage owned by the buffer.
        unsafe { slot.write(0) };
    }

    /// Start of the buffer.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. The string has storage
    unsafe fn base(&self) -> NonNull<u8> {
        debug_assert!(self.vec.capacity(&BYTE_DESC) != 0);
        match self.vec.first_ptr() {
            Some(base) => base,
            None => NonNull::dangling(),
        }
    }
}

impl Default for ZString {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for ZString {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for ZString {}

impl PartialEq<[u8]> for ZString {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_bytes() == other
    }
}

impl PartialEq<&[u8]> for ZString {
    fn eq(&self, other: &&[u8]) -> bool {
        self.as_bytes() == *other
    }
}

impl fmt::Debug for ZString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ZString(b\"{}\")", self.as_bytes().escape_ascii())
    }
}

#[cfg(test)]
#[allow(clippy::undocumented_unsafe_blocks, clippy::multiple_unsafe_ops_per_block)]
mod tests {
    use dynseq_internals::AllocRef;

    use super::*;

    #[test]
    fn null_state_reads_as_empty() {
        let string = ZString::new();
        assert!(string.is_empty());
        assert_eq!(string.capacity(), 0);
        assert_eq!(string.as_bytes(), b"");
        assert_eq!(string.as_bytes_with_nul(), b"\0");
        unsafe {
            assert_eq!(*string.as_ptr(), 0);
        }
    }

    #[test]
    fn assign_keeps_the_terminator() {
        let alloc = AllocRef::global();
        let mut string = ZString::new();

        unsafe {
            string.assign(alloc, b"hello").unwrap();
            assert_eq!(string.len(), 5);
            assert_eq!(string.as_bytes(), b"hello");
            assert_eq!(string.as_bytes_with_nul(), b"hello\0");
            assert!(string.capacity() >= 5);

            string.assign(alloc, b"a longer replacement text").unwrap();
            assert_eq!(string.as_bytes_with_nul(), b"a longer replacement text\0");

            string.assign(alloc, b"").unwrap();
            assert_eq!(string.as_bytes_with_nul(), b"\0");

            string.destroy(alloc);
        }
    }

    #[test]
    fn insert_mid_string() {
        let alloc = AllocRef::global();
        let mut string = ZString::new();

        unsafe {
            string.assign(alloc, b"0123456789ABCDE").unwrap();
            string.insert(alloc, 7, b"ABCD").unwrap();

            assert_eq!(string.len(), 19);
            assert_eq!(&string.as_bytes()[7..11], b"ABCD");
            assert_eq!(string.as_bytes(), b"0123456ABCD789ABCDE");
            assert_eq!(string.as_bytes_with_nul().last(), Some(&0));

            string.destroy(alloc);
        }
    }

    #[test]
    fn erase_clamps_position_and_count() {
        let alloc = AllocRef::global();
        let mut string = ZString::new();

        unsafe {
            string.assign(alloc, b"abcdef").unwrap();
            string.erase(4, 1000);
            assert_eq!(string.as_bytes(), b"abcd");
            string.erase(10, 3);
            assert_eq!(string.as_bytes(), b"abcd");
            string.erase(0, 0);
            assert_eq!(string.as_bytes(), b"abcd");
            string.erase(0, 4);
            assert_eq!(string.as_bytes_with_nul(), b"\0");

            string.destroy(alloc);
        }
    }

    #[test]
    fn replace_grows_and_shrinks() {
        let alloc = AllocRef::global();
        let mut string = ZString::new();

        unsafe {
            string.assign(alloc, b"abcdef").unwrap();
            string.replace(alloc, 2, 2, b"XYZ").unwrap();
            assert_eq!(string.as_bytes(), b"abXYZef");

            string.replace(alloc, 2, 3, b"-").unwrap();
            assert_eq!(string.as_bytes(), b"ab-ef");
            assert_eq!(string.as_bytes_with_nul(), b"ab-ef\0");

            string.destroy(alloc);
        }
    }

    #[test]
    fn find_matches_reference_semantics() {
        let alloc = AllocRef::global();
        let mut string = ZString::new();

        unsafe {
            string.assign(alloc, b"abracadabra").unwrap();

            assert_eq!(string.find(b"abra", 0), Some(0));
            assert_eq!(string.find(b"abra", 1), Some(7));
            assert_eq!(string.find(b"abra", 8), None);
            assert_eq!(string.find(b"", 4), Some(4));
            assert_eq!(string.find(b"", 11), Some(11));
            assert_eq!(string.find(b"", 12), None);
            assert_eq!(string.find_byte(b'c', 0), Some(4));
            assert_eq!(string.find_byte(b'z', 0), None);
            assert_eq!(string.find_byte(b'a', 20), None);

            string.destroy(alloc);
        }
    }

    #[test]
    fn substring_and_copy_out() {
        let alloc = AllocRef::global();
        let mut string = ZString::new();

        unsafe {
            string.assign(alloc, b"hello world").unwrap();

            let mut world = string.substring(alloc, 6, 100).unwrap();
            assert_eq!(world.as_bytes_with_nul(), b"world\0");

            let mut buffer = [0u8; 4];
            assert_eq!(string.copy_to(6, &mut buffer), 4);
            assert_eq!(&buffer, b"worl");
            assert_eq!(string.copy_to(100, &mut buffer), 0);

            world.destroy(alloc);
            string.destroy(alloc);
        }
    }

    #[test]
    fn push_byte_amortizes() {
        let alloc = AllocRef::global();
        let mut string = ZString::new();

        unsafe {
            for b in b'a'..=b'z' {
                string.push_byte(alloc, b).unwrap();
            }
            assert_eq!(string.len(), 26);
            assert_eq!(string.as_bytes(), b"abcdefghijklmnopqrstuvwxyz");
            assert_eq!(string.as_bytes_with_nul().last(), Some(&0));

            string.destroy(alloc);
        }
    }

    #[test]
    fn equality_is_by_content() {
        let alloc = AllocRef::global();
        let mut left = ZString::new();
        let mut right = ZString::new();

        unsafe {
            left.assign(alloc, b"same").unwrap();
            right.assign(alloc, b"same").unwrap();
            assert_eq!(left, right);
            assert_eq!(left, b"same"[..]);

            right.push_byte(alloc, b'!').unwrap();
            assert_ne!(left, right);

            left.destroy(alloc);
            right.destroy(alloc);
        }
    }
}
