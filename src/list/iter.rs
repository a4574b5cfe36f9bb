//! Safe iteration over a [`List`]'s elements.

use core::{iter::FusedIterator, marker::PhantomData, ptr::NonNull};

use dynseq_internals::TypeDesc;

use super::{List, NodeHeader};

/// Iterator over pointers to a [`List`]'s element payloads.
///
/// Yields one `NonNull<u8>` per element, front to back, or back to front
/// through [`DoubleEndedIterator`]. Driving the iterator is safe; reading
/// through the yielded pointers is the caller's `unsafe`, under the element
/// type the list's descriptor describes.
#[derive(Clone, Debug)]
#[allow(
    missing_copy_implementations,
    reason = "implicit copies would silently re-yield elements"
)]
pub struct ListElements<'a> {
    /// Next node from the front.
    front: *mut NodeHeader,
    /// Node most recently yielded from the back, or the sentinel.
    back: *mut NodeHeader,
    /// Payload offset within a node.
    offset: usize,
    /// Elements not yet yielded from either side.
    remaining: usize,
    /// Keeps the list borrowed while positions into it are handed out.
    _list: PhantomData<&'a List>,
}

impl<'a> ListElements<'a> {
    /// Iterator over `list`'s chain under `desc`.
    pub(super) fn over(list: &'a List, desc: &TypeDesc) -> Self {
        let front = match NonNull::new(list.sentinel) {
            // SAFETY: A non-null sentinel is a live header (list field
            // invariants).
            Some(sentinel) => unsafe { (*sentinel.as_ptr()).next },
            None => core::ptr::null_mut(),
        };
        Self {
            front,
            back: list.sentinel,
            offset: List::payload_offset(desc),
            remaining: list.len(),
            _list: PhantomData,
        }
    }
}

impl Iterator for ListElements<'_> {
    type Item = NonNull<u8>;

    fn next(&mut self) -> Option<NonNull<u8>> {
        if self.remaining == 0 {
            return None;
        }
        let node = NonNull::new(self.front)?;
        self.remaining -= 1;
        // SAFETY: With elements remaining the node is a live payload node,
        // and the borrow keeps the chain in place.
        self.front = unsafe { (*node.as_ptr()).next };
        NonNull::new(node.as_ptr().cast::<u8>().wrapping_add(self.offset))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl DoubleEndedIterator for ListElements<'_> {
    fn next_back(&mut self) -> Option<NonNull<u8>> {
        if self.remaining == 0 {
            return None;
        }
        let anchor = NonNull::new(self.back)?;
        // SAFETY: With elements remaining, the node before `back` is a live
        // payload node, and the borrow keeps the chain in place.
        let node = unsafe { (*anchor.as_ptr()).prev };
        let node = NonNull::new(node)?;
        self.back = node.as_ptr();
        self.remaining -= 1;
        NonNull::new(node.as_ptr().cast::<u8>().wrapping_add(self.offset))
    }
}

impl ExactSizeIterator for ListElements<'_> {
    fn len(&self) -> usize {
        self.remaining
    }
}

impl FusedIterator for ListElements<'_> {}

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
        let mut list = List::construct(alloc).unwrap();

        unsafe {
            for n in [1u32, 2, 3] {
                list.push_back(&desc, alloc, NonNull::from(&n).cast()).unwrap();
            }

            let forward: Vec<u32> = list
                .elements(&desc)
                .map(|slot| slot.cast::<u32>().read())
                .collect();
            assert_eq!(forward, [1, 2, 3]);

            let backward: Vec<u32> = list
                .elements(&desc)
                .rev()
                .map(|slot| slot.cast::<u32>().read())
                .collect();
            assert_eq!(backward, [3, 2, 1]);

            list.destroy(&desc, alloc);
        }
    }

    #[test]
    fn meets_in_the_middle() {
        let desc = TypeDesc::of::<u16>().unwrap();
        let alloc = AllocRef::global();
        let mut list = List::construct(alloc).unwrap();

        unsafe {
            for n in [10u16, 20, 30] {
                list.push_back(&desc, alloc, NonNull::from(&n).cast()).unwrap();
            }

            let mut elements = list.elements(&desc);
            assert_eq!(elements.len(), 3);
            assert_eq!(elements.next().map(|s| s.cast::<u16>().read()), Some(10));
            assert_eq!(elements.next_back().map(|s| s.cast::<u16>().read()), Some(30));
            assert_eq!(elements.next().map(|s| s.cast::<u16>().read()), Some(20));
            assert_eq!(elements.next(), None);
            assert_eq!(elements.next_back(), None);

            list.destroy(&desc, alloc);
        }
    }

    #[test]
    fn null_state_yields_nothing() {
        let desc = TypeDesc::of::<u64>().unwrap();
        let list = List::new();
        assert_eq!(list.elements(&desc).count(), 0);
    }
}
