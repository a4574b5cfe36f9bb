//! Safe iteration over a [`Vector`]'s elements.

use core::{iter::FusedIterator, marker::PhantomData, ptr::NonNull};

use dynseq_internals::TypeDesc;

use super::Vector;

/// Iterator over pointers to a [`Vector`]'s live elements.
///
/// Yields one `NonNull<u8>` per element, front to back, or back to front
/// through [`DoubleEndedIterator`]. Driving the iterator is safe; reading
/// through the yielded pointers is the caller's `unsafe`, under the element
/// type the vector's descriptor describes.
#[derive(Clone, Debug)]
#[allow(
    missing_copy_implementations,
    reason = "implicit copies would silently re-yield elements"
)]
pub struct Elements<'a> {
    /// Next element from the front.
    front: *mut u8,
    /// One past the next element from the back.
    back: *mut u8,
    /// Element stride in bytes.
    stride: usize,
    /// Elements not yet yielded from either side.
    remaining: usize,
    /// Keeps the vector borrowed while positions into it are handed out.
    _vector: PhantomData<&'a Vector>,
}

impl<'a> Elements<'a> {
    /// Iterator over `vector`'s live range under `desc`.
    pub(super) fn over(vector: &'a Vector, desc: &TypeDesc) -> Self {
        Self {
            front: vector.first,
            back: vector.last,
            stride: desc.size(),
            remaining: vector.len(desc),
            _vector: PhantomData,
        }
    }
}

impl Iterator for Elements<'_> {
    type Item = NonNull<u8>;

    fn next(&mut self) -> Option<NonNull<u8>> {
        if self.remaining == 0 {
            return None;
        }
        // A consistent vector cannot pair a live element with null storage;
        // `NonNull::new` avoids trusting that here.
        let item = NonNull::new(self.front)?;
        self.remaining -= 1;
        self.front = self.front.wrapping_add(self.stride);
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl DoubleEndedIterator for Elements<'_> {
    fn next_back(&mut self) -> Option<NonNull<u8>> {
        if self.remaining == 0 {
            return None;
        }
        let candidate = self.back.wrapping_sub(self.stride);
        let item = NonNull::new(candidate)?;
        self.back = candidate;
        self.remaining -= 1;
        Some(item)
    }
}

impl ExactSizeIterator for Elements<'_> {
    fn len(&self) -> usize {
        self.remaining
    }
}

impl FusedIterator for Elements<'_> {}

#[cfg(test)]
#[allow(clippy::undocumented_unsafe_blocks, clippy::multiple_unsafe_ops_per_block)]
mod tests {
    use alloc::vec::Vec;

    use dynseq_internals::AllocRef;

    use super::*;

    #[test]
    fn walks_both_directions() {
        let desc = TypeDesc::of::<u32>().unwrap();
        let alloc = AllocRef::global();
        let mut vector = Vector::new();

        unsafe {
            for n in [1u32, 2, 3, 4] {
                vector.push_copy(&desc, alloc, NonNull::from(&n).cast()).unwrap();
            }

            let forward: Vec<u32> = vector
                .elements(&desc)
                .map(|slot| slot.cast::<u32>().read())
                .collect();
            assert_eq!(forward, [1, 2, 3, 4]);

            let backward: Vec<u32> = vector
                .elements(&desc)
                .rev()
                .map(|slot| slot.cast::<u32>().read())
                .collect();
            assert_eq!(backward, [4, 3, 2, 1]);

            vector.destroy(&desc, alloc);
        }
    }

    #[test]
    fn meets_in_the_middle() {
        let desc = TypeDesc::of::<u8>().unwrap();
        let alloc = AllocRef::global();
        let mut vector = Vector::new();

        unsafe {
            for n in [10u8, 20, 30] {
                vector.push_copy(&desc, alloc, NonNull::from(&n).cast()).unwrap();
            }

            let mut elements = vector.elements(&desc);
            assert_eq!(elements.len(), 3);
            assert_eq!(elements.next().map(|s| s.cast::<u8>().read()), Some(10));
            assert_eq!(elements.next_back().map(|s| s.cast::<u8>().read()), Some(30));
            assert_eq!(elements.next().map(|s| s.cast::<u8>().read()), Some(20));
            assert_eq!(elements.next(), None);
            assert_eq!(elements.next_back(), None);

            vector.destroy(&desc, alloc);
        }
    }

    #[test]
    fn empty_vector_yields_nothing() {
        let desc = TypeDesc::of::<u64>().unwrap();
        let vector = Vector::new();
        assert_eq!(vector.elements(&desc).count(), 0);
    }
}
