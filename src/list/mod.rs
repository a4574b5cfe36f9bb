//! The sentinel-circular doubly-linked list engine.
//!
//! [`List`] is a heap-allocated header-only sentinel node plus a length. The
//! sentinel's `next`/`prev` wrap to itself when the list is empty; every
//! other node is a header immediately followed by the element payload at its
//! natural alignment. Nodes never move once constructed: every insert and
//! erase is O(1) pointer relinking, and element addresses are stable until
//! their node is erased.
//!
//! The calling discipline matches the vector engine: one [`TypeDesc`] and
//! one allocator identity drive a list for its entire lifetime, passed into
//! every call that needs them. A list is *constructed* once
//! [`List::construct`] has allocated its sentinel; [`List::destroy`] returns
//! everything and leaves the null state [`List::new`] starts from.
//!
//! Bulk insertion builds a detached chain first and splices it in whole, so
//! a failed node allocation rolls back to an unchanged list. Assignment
//! follows the same propagation matrix as the vector, with one structural
//! difference: the sentinel belongs to the list's own identity, so the cheap
//! move path either splices payload nodes across sentinels (identical
//! handles) or steals the source wholesale, sentinel included (adopted
//! identity).

mod iter;

use core::{alloc::Layout, ptr::NonNull};

use dynseq_internals::{AllocRef, TypeDesc};

use crate::{errors::CapacityError, policy::AllocPropagation};

pub use self::iter::ListElements;

/// Links of one chain node. The payload, when present, follows in memory.
#[repr(C)]
struct NodeHeader {
    /// Towards the back of the list; the final node wraps to the sentinel.
    next: *mut NodeHeader,
    /// Towards the front of the list; the first node wraps to the sentinel.
    prev: *mut NodeHeader,
}

/// Type-erased doubly-linked list.
///
/// # Examples
///
/// ```
/// use core::ptr::NonNull;
///
/// use dynseq::{AllocRef, List, TypeDesc};
///
/// let desc = TypeDesc::of::<i64>().unwrap();
/// let alloc = AllocRef::global();
/// let mut list = List::construct(alloc).unwrap();
///
/// for n in [1i64, 2, 3] {
///     // SAFETY: `desc` describes `i64` and is used for every call on this
///     // list; `alloc` is the handle for all of its nodes; `n` is a live
///     // `i64` outside the list.
///     unsafe {
///         list.insert_one_copy(&desc, alloc, list.end(), NonNull::from(&n).cast())
///             .unwrap()
///     };
/// }
/// assert_eq!(list.len(), 3);
///
/// let collected: Vec<i64> = list
///     .elements(&desc)
///     // SAFETY: the iterator yields pointers to live `i64` payloads.
///     .map(|slot| unsafe { slot.cast::<i64>().read() })
///     .collect();
/// assert_eq!(collected, [1, 2, 3]);
///
/// // SAFETY: same descriptor and handle as every prior call.
/// unsafe { list.destroy(&desc, alloc) };
/// ```
#[repr(C)]
#[allow(
    missing_copy_implementations,
    reason = "exclusively owns its chain; duplicating the fields would alias it"
)]
pub struct List {
    /// The anchor node of the circular chain.
    ///
    /// # Safety
    ///
    /// The following invariants hold whenever no method of this type is
    /// executing:
    ///
    /// 1. Either `sentinel` is null and `len` is zero (no chain), or it
    ///    points to a live header-only allocation from a single allocator
    ///    identity whose `next`/`prev` close a circular chain over `len`
    ///    payload nodes.
    /// 2. Every payload node was allocated from the same identity under the
    ///    one descriptor used with this list, and holds an initialized
    ///    element at the payload offset.
    sentinel: *mut NodeHeader,
    /// Number of payload nodes in the chain.
    len: usize,
}

impl List {
    /// Creates a list in the null state, with no sentinel.
    ///
    /// Only [`List::construct`] produces a usable list; the null state is
    /// what [`List::destroy`] leaves behind and what the stealing move path
    /// leaves its source in.
    #[inline]
    pub const fn new() -> Self {
        Self {
            sentinel: core::ptr::null_mut(),
            len: 0,
        }
    }

    /// Allocates the sentinel and returns an empty, constructed list.
    pub fn construct(alloc: AllocRef<'_>) -> Result<Self, CapacityError> {
        let block = alloc
            .allocate(Layout::new::<NodeHeader>())
            .ok_or(CapacityError::AllocFailed)?;
        let sentinel = block.cast::<NodeHeader>();
        let links = NodeHeader {
            next: sentinel.as_ptr(),
            prev: sentinel.as_ptr(),
        };
        // SAFETY: The block is freshly allocated with the header's layout:
        // writable, aligned, exclusive.
        unsafe { sentinel.write(links) };
        Ok(Self {
            sentinel: sentinel.as_ptr(),
            len: 0,
        })
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the list holds no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// A cursor at the first element, or at the end position when empty.
    ///
    /// The null state yields the same cursor as [`List::end`].
    #[inline]
    pub fn begin(&self) -> ListCursor {
        let node = match NonNull::new(self.sentinel) {
            // SAFETY: A non-null sentinel is a live header (field
            // invariants).
            Some(sentinel) => unsafe { (*sentinel.as_ptr()).next },
            None => core::ptr::null_mut(),
        };
        ListCursor { list: self, node }
    }

    /// The past-the-end cursor: the sentinel position.
    #[inline]
    pub fn end(&self) -> ListCursor {
        ListCursor {
            list: self,
            node: self.sentinel,
        }
    }

    /// Pointer to the first element.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `desc` is this list's descriptor
    /// 2. The list is not empty
    #[inline]
    pub unsafe fn front(&self, desc: &TypeDesc) -> NonNull<u8> {
        debug_assert!(!self.is_empty());
        // SAFETY: A nonempty list has a live sentinel.
        let node = unsafe { (*self.sentinel).next };
        // SAFETY: Nonempty, so `sentinel.next` is a payload node.
        let node = unsafe { NonNull::new_unchecked(node) };
        // SAFETY:
        // 1. A payload node of this list under the caller's `desc`.
        unsafe { Self::payload_of(desc, node) }
    }

    /// Pointer to the final element.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `desc` is this list's descriptor
    /// 2. The list is not empty
    #[inline]
    pub unsafe fn back(&self, desc: &TypeDesc) -> NonNull<u8> {
        debug_assert!(!self.is_empty());
        // SAFETY: A nonempty list has a live sentinel.
        let node = unsafe { (*self.sentinel).prev };
        // SAFETY: Nonempty, so `sentinel.prev` is a payload node.
        let node = unsafe { NonNull::new_unchecked(node) };
        // SAFETY:
        // 1. A payload node of this list under the caller's `desc`.
        unsafe { Self::payload_of(desc, node) }
    }

    /// Iterates over pointers to the element payloads, front to back.
    ///
    /// The iterator is safe to drive; reading through the yielded pointers
    /// is the caller's `unsafe`. `desc` must be this list's descriptor for
    /// the pointers to be meaningful.
    #[inline]
    pub fn elements(&self, desc: &TypeDesc) -> ListElements<'_> {
        ListElements::over(self, desc)
    }

    /// Destroys every element and frees its node, keeping the sentinel.
    ///
    /// No-op in the null state.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `desc` is this list's descriptor
    /// 2. `alloc` is identical to the handle the nodes came from
    pub unsafe fn clear(&mut self, desc: &TypeDesc, alloc: AllocRef<'_>) {
        let Some(sentinel) = NonNull::new(self.sentinel) else {
            return;
        };
        // SAFETY: The sentinel is live (field invariants).
        let mut node = unsafe { (*sentinel.as_ptr()).next };
        while !core::ptr::eq(node, sentinel.as_ptr()) {
            // SAFETY: A non-sentinel chain node is live (field invariants).
            let next = unsafe { (*node).next };
            // SAFETY: As above, and non-null.
            let doomed = unsafe { NonNull::new_unchecked(node) };
            // SAFETY:
            // 1. Guaranteed by the caller (obligation 1)
            // 2. `doomed` is a payload node of this list.
            let payload = unsafe { Self::payload_of(desc, doomed) };
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. The payload is initialized (field invariants) and its node
            //    is freed below.
            unsafe { desc.destroy_in_place(payload) };
            // SAFETY:
            // 1. The node was allocated by this list under `desc` through an
            //    identical handle.
            // 2. The chain is relinked without it below.
            unsafe { Self::free_node(desc, alloc, doomed) };
            node = next;
        }
        let links = NodeHeader {
            next: sentinel.as_ptr(),
            prev: sentinel.as_ptr(),
        };
        // SAFETY: The sentinel is live and exclusively ours.
        unsafe { sentinel.write(links) };
        self.len = 0;
    }

    /// Destroys every element, frees all nodes and the sentinel, and leaves
    /// the null state.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `desc` is this list's descriptor
    /// 2. `alloc` is identical to the handle the sentinel and nodes came
    ///    from
    pub unsafe fn destroy(&mut self, desc: &TypeDesc, alloc: AllocRef<'_>) {
        // SAFETY:
        // 1. Guaranteed by the caller
        // 2. Guaranteed by the caller
        unsafe { self.clear(desc, alloc) };
        if let Some(sentinel) = NonNull::new(self.sentinel) {
            // SAFETY:
            // 1. The sentinel came from an identical handle with the header
            //    layout.
            // 2. The field is nulled below, so it is not used again.
            unsafe { alloc.deallocate(sentinel.cast(), Layout::new::<NodeHeader>()) };
        }
        *self = Self::new();
    }

    /// Inserts a copy of `*value` before `at`, returning a cursor at the new
    /// element.
    ///
    /// Nodes never move, so `value` may freely point at one of this list's
    /// own elements. Unchanged on failure.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `desc` is this list's descriptor and the list is constructed
    /// 2. `alloc` is identical to the handle the nodes came from
    /// 3. `at` is a cursor of this list
    /// 4. `value` points to an initialized element
    pub unsafe fn insert_one_copy(
        &mut self,
        desc: &TypeDesc,
        alloc: AllocRef<'_>,
        at: ListCursor,
        value: NonNull<u8>,
    ) -> Result<ListCursor, CapacityError> {
        debug_assert!(core::ptr::eq(at.list, self));
        let node = Self::allocate_node(desc, alloc)?;
        // SAFETY:
        // 1. A fresh payload node under `desc`.
        let payload = unsafe { Self::payload_of(desc, node) };
        // SAFETY:
        // 1. Guaranteed by the caller
        // 2. Guaranteed by the caller (obligation 4)
        // 3. The payload slot is fresh writable storage, aligned, disjoint
        //    from `*value`.
        unsafe { desc.copy_construct(payload, value) };
        // SAFETY:
        // 1. `at.node` is a chain node of this constructed list (caller
        //    obligations 1 and 3), so it and its `prev` are adjacent.
        unsafe { self.link_before(node, at.node) };
        self.len += 1;
        Ok(ListCursor {
            list: self,
            node: node.as_ptr(),
        })
    }

    /// Inserts `*value` before `at` by move, returning a cursor at the new
    /// element.
    ///
    /// The value is taken by move construction: afterwards, if the
    /// descriptor declares a move callback the source holds a constructed,
    /// moved-from element the caller still owns; otherwise its bytes were
    /// transferred and the source must be treated as uninitialized. On
    /// failure the value is untouched.
    ///
    /// `value` may point at one of this list's own elements only when the
    /// descriptor declares a move callback; the moved-from husk then remains
    /// an element of the list.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `desc` is this list's descriptor and the list is constructed
    /// 2. `alloc` is identical to the handle the nodes came from
    /// 3. `at` is a cursor of this list
    /// 4. `value` points to an initialized element; if it points into this
    ///    list's payloads, the descriptor declares a move callback
    pub unsafe fn insert_one_move(
        &mut self,
        desc: &TypeDesc,
        alloc: AllocRef<'_>,
        at: ListCursor,
        value: NonNull<u8>,
    ) -> Result<ListCursor, CapacityError> {
        debug_assert!(core::ptr::eq(at.list, self));
        let node = Self::allocate_node(desc, alloc)?;
        // SAFETY:
        // 1. A fresh payload node under `desc`.
        let payload = unsafe { Self::payload_of(desc, node) };
        // SAFETY:
        // 1. Guaranteed by the caller
        // 2. Guaranteed by the caller (obligation 4)
        // 3. The payload slot is fresh writable storage, aligned, disjoint
        //    from `*value`.
        unsafe { desc.move_construct(payload, value) };
        // SAFETY:
        // 1. `at.node` is a chain node of this constructed list (caller
        //    obligations 1 and 3), so it and its `prev` are adjacent.
        unsafe { self.link_before(node, at.node) };
        self.len += 1;
        Ok(ListCursor {
            list: self,
            node: node.as_ptr(),
        })
    }

    /// Inserts `n` copies of `*value` before `at`, returning a cursor at the
    /// first inserted element, or `at` itself when `n == 0`.
    ///
    /// The new nodes are built as a detached chain and spliced in whole: if
    /// any node allocation fails, everything built so far is torn down and
    /// the list is unchanged.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `desc` is this list's descriptor and the list is constructed
    /// 2. `alloc` is identical to the handle the nodes came from
    /// 3. `at` is a cursor of this list
    /// 4. `value` points to an initialized element
    pub unsafe fn insert_fill(
        &mut self,
        desc: &TypeDesc,
        alloc: AllocRef<'_>,
        at: ListCursor,
        n: usize,
        value: NonNull<u8>,
    ) -> Result<ListCursor, CapacityError> {
        debug_assert!(core::ptr::eq(at.list, self));
        if n == 0 {
            return Ok(at);
        }
        let layout = Self::node_layout(desc)?;
        let mut first: *mut NodeHeader = core::ptr::null_mut();
        let mut last: *mut NodeHeader = core::ptr::null_mut();
        for _ in 0..n {
            let Some(block) = alloc.allocate(layout) else {
                // Roll the detached chain back; the list itself is
                // untouched.
                let mut node = first;
                while !node.is_null() {
                    // SAFETY: A node of the detached chain, linked below.
                    let next = unsafe { (*node).next };
                    // SAFETY: As above, and non-null.
                    let doomed = unsafe { NonNull::new_unchecked(node) };
                    // SAFETY:
                    // 1. A payload node under `desc`.
                    let payload = unsafe { Self::payload_of(desc, doomed) };
                    // SAFETY:
                    // 1. Guaranteed by the caller
                    // 2. The payload was constructed right after its
                    //    allocation; the node is freed below.
                    unsafe { desc.destroy_in_place(payload) };
                    // SAFETY:
                    // 1. Allocated with `layout` through this handle.
                    // 2. Not used again.
                    unsafe { Self::free_node(desc, alloc, doomed) };
                    node = next;
                }
                return Err(CapacityError::AllocFailed);
            };
            let node = block.cast::<NodeHeader>();
            let links = NodeHeader {
                next: core::ptr::null_mut(),
                prev: last,
            };
            // SAFETY: The block is freshly allocated with the node layout.
            unsafe { node.write(links) };
            // SAFETY:
            // 1. A fresh payload node under `desc`.
            let payload = unsafe { Self::payload_of(desc, node) };
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. Guaranteed by the caller (obligation 4)
            // 3. The payload slot is fresh writable storage, aligned,
            //    disjoint from `*value`.
            unsafe { desc.copy_construct(payload, value) };
            if last.is_null() {
                first = node.as_ptr();
            } else {
                // SAFETY: The previous chain node is live and ours.
                unsafe { (*last).next = node.as_ptr() };
            }
            last = node.as_ptr();
        }
        // SAFETY:
        // 1. `first..last` is a detached chain of `n` constructed nodes.
        // 2. `at.node` is a chain node of this constructed list (caller
        //    obligations 1 and 3).
        unsafe { self.splice_before(first, last, at.node) };
        self.len += n;
        Ok(ListCursor {
            list: self,
            node: first,
        })
    }

    /// Removes the element at `at`, returning the cursor past it.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `desc` is this list's descriptor
    /// 2. `alloc` is identical to the handle the nodes came from
    /// 3. `at` is a cursor of this list at an element, not the end position
    pub unsafe fn erase(
        &mut self,
        desc: &TypeDesc,
        alloc: AllocRef<'_>,
        at: ListCursor,
    ) -> ListCursor {
        debug_assert!(core::ptr::eq(at.list, self));
        debug_assert!(!core::ptr::eq(at.node, self.sentinel));
        // SAFETY: A payload node is live (caller obligation 3).
        let next = unsafe { (*at.node).next };
        // SAFETY: As above, and non-null.
        let doomed = unsafe { NonNull::new_unchecked(at.node) };
        // SAFETY:
        // 1. `doomed` is a payload node of this constructed list.
        unsafe { Self::unlink(doomed) };
        // SAFETY:
        // 1. A payload node of this list under the caller's `desc`.
        let payload = unsafe { Self::payload_of(desc, doomed) };
        // SAFETY:
        // 1. Guaranteed by the caller
        // 2. The payload is initialized (field invariants) and its node is
        //    freed below.
        unsafe { desc.destroy_in_place(payload) };
        // SAFETY:
        // 1. The node was allocated by this list under `desc` through an
        //    identical handle.
        // 2. It is unlinked and not used again.
        unsafe { Self::free_node(desc, alloc, doomed) };
        self.len -= 1;
        ListCursor {
            list: self,
            node: next,
        }
    }

    /// Removes the elements in `[from, to)`, returning `to`.
    ///
    /// `erase_range(x, x)` is a no-op.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `desc` is this list's descriptor
    /// 2. `alloc` is identical to the handle the nodes came from
    /// 3. `from` and `to` are cursors of this list and `to` is reachable
    ///    from `from` by following `next`
    pub unsafe fn erase_range(
        &mut self,
        desc: &TypeDesc,
        alloc: AllocRef<'_>,
        from: ListCursor,
        to: ListCursor,
    ) -> ListCursor {
        debug_assert!(core::ptr::eq(from.list, self));
        debug_assert!(core::ptr::eq(to.list, self));
        let mut cursor = from;
        while !core::ptr::eq(cursor.node, to.node) {
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. Guaranteed by the caller
            // 3. A position before `to` in the walk is an element of this
            //    list (caller obligation 3).
            cursor = unsafe { self.erase(desc, alloc, cursor) };
        }
        to
    }

    /// Appends `*value` by move, returning the new element's payload.
    ///
    /// See [`List::insert_one_move`] for how the source is left.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `desc` is this list's descriptor and the list is constructed
    /// 2. `alloc` is identical to the handle the nodes came from
    /// 3. `value` points to an initialized element; if it points into this
    ///    list's payloads, the descriptor declares a move callback
    pub unsafe fn push_back(
        &mut self,
        desc: &TypeDesc,
        alloc: AllocRef<'_>,
        value: NonNull<u8>,
    ) -> Result<NonNull<u8>, CapacityError> {
        // SAFETY: All obligations forwarded; the end cursor is ours.
        let cursor = unsafe { self.insert_one_move(desc, alloc, self.end(), value)? };
        // SAFETY: The cursor is at the freshly inserted payload node.
        let node = unsafe { NonNull::new_unchecked(cursor.node) };
        // SAFETY:
        // 1. A payload node of this list under the caller's `desc`.
        Ok(unsafe { Self::payload_of(desc, node) })
    }

    /// Prepends `*value` by move, returning the new element's payload.
    ///
    /// See [`List::insert_one_move`] for how the source is left.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `desc` is this list's descriptor and the list is constructed
    /// 2. `alloc` is identical to the handle the nodes came from
    /// 3. `value` points to an initialized element; if it points into this
    ///    list's payloads, the descriptor declares a move callback
    pub unsafe fn push_front(
        &mut self,
        desc: &TypeDesc,
        alloc: AllocRef<'_>,
        value: NonNull<u8>,
    ) -> Result<NonNull<u8>, CapacityError> {
        // SAFETY: All obligations forwarded; the begin cursor is ours.
        let cursor = unsafe { self.insert_one_move(desc, alloc, self.begin(), value)? };
        // SAFETY: The cursor is at the freshly inserted payload node.
        let node = unsafe { NonNull::new_unchecked(cursor.node) };
        // SAFETY:
        // 1. A payload node of this list under the caller's `desc`.
        Ok(unsafe { Self::payload_of(desc, node) })
    }

    /// Removes the first element.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `desc` is this list's descriptor
    /// 2. `alloc` is identical to the handle the nodes came from
    /// 3. The list is not empty
    pub unsafe fn pop_front(&mut self, desc: &TypeDesc, alloc: AllocRef<'_>) {
        debug_assert!(!self.is_empty());
        let front = self.begin();
        // SAFETY:
        // 1. Guaranteed by the caller
        // 2. Guaranteed by the caller
        // 3. A nonempty list's begin cursor is at an element.
        unsafe { self.erase(desc, alloc, front) };
    }

    /// Removes the final element.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `desc` is this list's descriptor
    /// 2. `alloc` is identical to the handle the nodes came from
    /// 3. The list is not empty
    pub unsafe fn pop_back(&mut self, desc: &TypeDesc, alloc: AllocRef<'_>) {
        debug_assert!(!self.is_empty());
        // SAFETY: A nonempty list has a live sentinel.
        let node = unsafe { (*self.sentinel).prev };
        let back = ListCursor { list: self, node };
        // SAFETY:
        // 1. Guaranteed by the caller
        // 2. Guaranteed by the caller
        // 3. A nonempty list's final node is an element.
        unsafe { self.erase(desc, alloc, back) };
    }

    /// Exchanges the entire contents of two lists.
    ///
    /// Both lists must be driven by the same descriptor and their nodes must
    /// come from identical allocator handles; otherwise later calls will
    /// free through the wrong identity.
    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        core::mem::swap(self, other);
    }

    /// Replaces the contents with copies of `source`'s elements.
    ///
    /// With [`AllocPropagation::Propagate`] and differing identities, a
    /// complete replacement list (sentinel included) is built under the
    /// source identity first, so failure leaves this list unchanged; on
    /// success the old list is destroyed through the old identity and
    /// `dst_alloc` is overwritten. Otherwise existing nodes are reused: the
    /// common prefix is reassigned in place, then the length difference is
    /// appended or erased. A failed append leaves a valid list holding the
    /// elements assigned so far.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `desc` is the descriptor of both lists and both are constructed
    /// 2. `dst_alloc` is identical to the handle this list's nodes came
    ///    from, and `src_alloc` to the handle `source`'s nodes came from
    pub unsafe fn copy_assign_from<'a>(
        &mut self,
        source: &List,
        desc: &TypeDesc,
        dst_alloc: &mut AllocRef<'a>,
        src_alloc: AllocRef<'a>,
        propagation: AllocPropagation,
    ) -> Result<(), CapacityError> {
        if propagation == AllocPropagation::Propagate && !dst_alloc.is_identical(src_alloc) {
            let mut fresh = Self::construct(src_alloc)?;
            for payload in source.elements(desc) {
                // SAFETY:
                // 1. `desc` drives `fresh`, which is constructed.
                // 2. Every `fresh` node comes from `src_alloc`.
                // 3. The end cursor is `fresh`'s own.
                // 4. The iterator yields initialized elements of `source`.
                let inserted =
                    unsafe { fresh.insert_one_copy(desc, src_alloc, fresh.end(), payload) };
                if let Err(err) = inserted {
                    // SAFETY: `fresh` was driven by `desc` and `src_alloc`
                    // throughout.
                    unsafe { fresh.destroy(desc, src_alloc) };
                    return Err(err);
                }
            }
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. Guaranteed by the caller (obligation 2, old identity)
            unsafe { self.destroy(desc, *dst_alloc) };
            *self = fresh;
            *dst_alloc = src_alloc;
            return Ok(());
        }
        let mut keep = self.begin();
        let mut from = source.begin();
        while !core::ptr::eq(keep.node, self.sentinel) && !core::ptr::eq(from.node, source.sentinel)
        {
            // SAFETY: A payload node of this list, non-null.
            let own = unsafe { NonNull::new_unchecked(keep.node) };
            // SAFETY:
            // 1. A payload node of this list under the caller's `desc`.
            let own_payload = unsafe { Self::payload_of(desc, own) };
            // SAFETY: A payload node of `source`, non-null.
            let src = unsafe { NonNull::new_unchecked(from.node) };
            // SAFETY:
            // 1. A payload node of `source` under the caller's `desc`.
            let src_payload = unsafe { Self::payload_of(desc, src) };
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. The old element is replaced by the construction below, so
            //    it is not used again.
            unsafe { desc.destroy_in_place(own_payload) };
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. `source`'s element is initialized; the two lists are
            //    distinct objects, so the slots are disjoint.
            // 3. The slot was cleared right above: writable, aligned.
            unsafe { desc.copy_construct(own_payload, src_payload) };
            // SAFETY: Chain nodes are live; both cursors stay within their
            // lists.
            keep.node = unsafe { (*keep.node).next };
            // SAFETY: As above.
            from.node = unsafe { (*from.node).next };
        }
        if core::ptr::eq(from.node, source.sentinel) {
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. Guaranteed by the caller (obligation 2)
            // 3. `keep` is a cursor of this list and the end is reachable
            //    from every position.
            unsafe { self.erase_range(desc, *dst_alloc, keep, self.end()) };
            return Ok(());
        }
        while !core::ptr::eq(from.node, source.sentinel) {
            // SAFETY: A payload node of `source`, non-null.
            let src = unsafe { NonNull::new_unchecked(from.node) };
            // SAFETY:
            // 1. A payload node of `source` under the caller's `desc`.
            let src_payload = unsafe { Self::payload_of(desc, src) };
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. Guaranteed by the caller (obligation 2)
            // 3. The end cursor is ours.
            // 4. `source`'s element is initialized.
            unsafe { self.insert_one_copy(desc, *dst_alloc, self.end(), src_payload)? };
            // SAFETY: Chain nodes are live.
            from.node = unsafe { (*from.node).next };
        }
        Ok(())
    }

    /// Takes `source`'s contents.
    ///
    /// With identical identities the payload chain is spliced across the
    /// sentinels in O(1): both lists stay constructed and the source is left
    /// empty, with no per-element work. When propagating onto a different
    /// identity the source is stolen wholesale, sentinel included: this
    /// list's old contents and sentinel are destroyed through the old
    /// identity, `dst_alloc` is overwritten, and the source is left in the
    /// null state. Otherwise every element is moved individually into
    /// this list's own nodes, existing nodes reused and the shortfall
    /// preallocated, so a failed allocation leaves both lists unchanged; on
    /// success the source is left empty and constructed.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `desc` is the descriptor of both lists and both are constructed
    /// 2. `dst_alloc` is identical to the handle this list's nodes came
    ///    from, and `src_alloc` to the handle `source`'s nodes came from
    pub unsafe fn move_assign_from<'a>(
        &mut self,
        source: &mut List,
        desc: &TypeDesc,
        dst_alloc: &mut AllocRef<'a>,
        src_alloc: AllocRef<'a>,
        propagation: AllocPropagation,
    ) -> Result<(), CapacityError> {
        if dst_alloc.is_identical(src_alloc) {
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. Guaranteed by the caller
            unsafe { self.clear(desc, *dst_alloc) };
            if !source.is_empty() {
                // SAFETY: A nonempty source has a live first payload node.
                let first = unsafe { (*source.sentinel).next };
                // SAFETY: And a live final payload node.
                let last = unsafe { (*source.sentinel).prev };
                // SAFETY:
                // 1. `first..last` is `source`'s full payload chain, about
                //    to be detached by the relink below.
                // 2. The sentinel is a chain node of this constructed list.
                unsafe { self.splice_before(first, last, self.sentinel) };
                let links = NodeHeader {
                    next: source.sentinel,
                    prev: source.sentinel,
                };
                // SAFETY: `source`'s sentinel is live; its payload nodes now
                // belong to our chain.
                unsafe { source.sentinel.write(links) };
                self.len = source.len;
                source.len = 0;
            }
            if propagation == AllocPropagation::Propagate {
                *dst_alloc = src_alloc;
            }
            return Ok(());
        }
        if propagation == AllocPropagation::Propagate {
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. Guaranteed by the caller (obligation 2, old identity)
            unsafe { self.destroy(desc, *dst_alloc) };
            *self = Self {
                sentinel: source.sentinel,
                len: source.len,
            };
            *source = Self::new();
            *dst_alloc = src_alloc;
            return Ok(());
        }
        // Retained identity, different allocators: move element by element
        // into nodes of our own. Reuse what we have and preallocate the
        // shortfall, so nothing is consumed if an allocation fails.
        let needed = source.len;
        if needed > self.len {
            let shortfall = needed - self.len;
            let layout = Self::node_layout(desc)?;
            let mut first: *mut NodeHeader = core::ptr::null_mut();
            let mut last: *mut NodeHeader = core::ptr::null_mut();
            for _ in 0..shortfall {
                let Some(block) = dst_alloc.allocate(layout) else {
                    // Roll back the payload-less chain; nothing else moved.
                    let mut node = first;
                    while !node.is_null() {
                        // SAFETY: A node of the detached chain.
                        let next = unsafe { (*node).next };
                        // SAFETY: As above, and non-null.
                        let doomed = unsafe { NonNull::new_unchecked(node) };
                        // SAFETY:
                        // 1. Allocated with `layout` through this handle.
                        // 2. Not used again.
                        unsafe { Self::free_node(desc, *dst_alloc, doomed) };
                        node = next;
                    }
                    return Err(CapacityError::AllocFailed);
                };
                let node = block.cast::<NodeHeader>();
                let links = NodeHeader {
                    next: core::ptr::null_mut(),
                    prev: last,
                };
                // SAFETY: The block is freshly allocated with the node
                // layout.
                unsafe { node.write(links) };
                if last.is_null() {
                    first = node.as_ptr();
                } else {
                    // SAFETY: The previous chain node is live and ours.
                    unsafe { (*last).next = node.as_ptr() };
                }
                last = node.as_ptr();
            }
            // The fresh nodes carry uninitialized payloads until the
            // relocation walk below fills them, still within this call.
            // SAFETY:
            // 1. `first..last` is a detached chain of `shortfall` nodes.
            // 2. The sentinel is a chain node of this constructed list.
            unsafe { self.splice_before(first, last, self.sentinel) };
        } else if self.len > needed {
            let mut excess = self.begin();
            // SAFETY: Walking `needed < len` steps from begin stays on
            // payload nodes.
            unsafe { excess.advance(needed as isize) };
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. Guaranteed by the caller (obligation 2)
            // 3. `excess` is a cursor of this list and the end is reachable
            //    from it.
            unsafe { self.erase_range(desc, *dst_alloc, excess, self.end()) };
        }
        // Destroy the payloads of the reused prefix, leaving every
        // destination slot uniformly uninitialized.
        let reused = self.len.min(needed);
        let mut node = self.begin().node;
        for _ in 0..reused {
            // SAFETY: A payload node of this list, non-null.
            let own = unsafe { NonNull::new_unchecked(node) };
            // SAFETY:
            // 1. A payload node of this list under the caller's `desc`.
            let payload = unsafe { Self::payload_of(desc, own) };
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. The slot is refilled by the relocation walk below.
            unsafe { desc.destroy_in_place(payload) };
            // SAFETY: Chain nodes are live.
            node = unsafe { (*node).next };
        }
        // Relocate every source element into our chain.
        let mut dst_node = self.begin().node;
        let mut src_node = source.begin().node;
        for _ in 0..needed {
            // SAFETY: A chain node of this list, non-null.
            let dst = unsafe { NonNull::new_unchecked(dst_node) };
            // SAFETY:
            // 1. A payload node of this list under the caller's `desc`.
            let dst_payload = unsafe { Self::payload_of(desc, dst) };
            // SAFETY: A payload node of `source`, non-null.
            let src = unsafe { NonNull::new_unchecked(src_node) };
            // SAFETY:
            // 1. A payload node of `source` under the caller's `desc`.
            let src_payload = unsafe { Self::payload_of(desc, src) };
            // SAFETY:
            // 1. Guaranteed by the caller
            // 2. `source`'s element is initialized and fully consumed; its
            //    node is freed below without another destructor call.
            // 3. The destination slot is uninitialized (destroyed or fresh),
            //    writable, aligned, in a distinct allocation.
            unsafe { desc.relocate(dst_payload, src_payload) };
            // SAFETY: Chain nodes are live.
            dst_node = unsafe { (*dst_node).next };
            // SAFETY: As above.
            src_node = unsafe { (*src_node).next };
        }
        self.len = needed;
        // The source's payload slots are consumed; free the bare nodes and
        // close its chain.
        let mut node = source.begin().node;
        while !core::ptr::eq(node, source.sentinel) {
            // SAFETY: A chain node of `source`, live until freed.
            let next = unsafe { (*node).next };
            // SAFETY: As above, and non-null.
            let doomed = unsafe { NonNull::new_unchecked(node) };
            // SAFETY:
            // 1. The node was allocated by `source` under `desc` through an
            //    identical handle (caller obligation 2).
            // 2. Its payload was relocated out; the node is not used again.
            unsafe { Self::free_node(desc, src_alloc, doomed) };
            node = next;
        }
        let links = NodeHeader {
            next: source.sentinel,
            prev: source.sentinel,
        };
        // SAFETY: `source`'s sentinel is live and exclusively its own.
        unsafe { source.sentinel.write(links) };
        source.len = 0;
        Ok(())
    }

    /// Byte offset of the payload within a node under `desc`.
    #[inline]
    fn payload_offset(desc: &TypeDesc) -> usize {
        let header = size_of::<NodeHeader>();
        let align = desc.align();
        (header + align - 1) & !(align - 1)
    }

    /// Layout of one payload node under `desc`.
    fn node_layout(desc: &TypeDesc) -> Result<Layout, CapacityError> {
        let size = Self::payload_offset(desc)
            .checked_add(desc.size())
            .ok_or(CapacityError::Overflow)?;
        let align = align_of::<NodeHeader>().max(desc.align());
        Layout::from_size_align(size, align).map_err(|_| CapacityError::Overflow)
    }

    /// Allocates one payload node block.
    fn allocate_node(
        desc: &TypeDesc,
        alloc: AllocRef<'_>,
    ) -> Result<NonNull<NodeHeader>, CapacityError> {
        let layout = Self::node_layout(desc)?;
        let block = alloc.allocate(layout).ok_or(CapacityError::AllocFailed)?;
        Ok(block.cast())
    }

    /// Frees `node`'s block.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `node` was allocated under `desc` through a handle identical to
    ///    `alloc`
    /// 2. Its payload is already destroyed or relocated out, and the node is
    ///    not used again
    unsafe fn free_node(desc: &TypeDesc, alloc: AllocRef<'_>, node: NonNull<NodeHeader>) {
        let Ok(layout) = Self::node_layout(desc) else {
            // A live node proves the layout was computable when it was
            // allocated.
            debug_assert!(false, "live node without a computable node layout");
            return;
        };
        // SAFETY:
        // 1. Allocated through an identical handle with this layout (caller
        //    obligation 1).
        // 2. Guaranteed by the caller (obligation 2)
        unsafe { alloc.deallocate(node.cast(), layout) };
    }

    /// Payload slot of `node` under `desc`.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `node` is a payload node allocated under `desc`
    #[inline]
    unsafe fn payload_of(desc: &TypeDesc, node: NonNull<NodeHeader>) -> NonNull<u8> {
        // SAFETY: The node block extends to the payload offset plus the
        // element size (caller obligation 1).
        unsafe { node.cast::<u8>().add(Self::payload_offset(desc)) }
    }

    /// Links the fresh `node` into the chain directly before `next`.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `next` is a chain node of this constructed list
    unsafe fn link_before(&mut self, node: NonNull<NodeHeader>, next: *mut NodeHeader) {
        // SAFETY: `next` is a live chain node (caller obligation 1).
        let prev = unsafe { (*next).prev };
        let links = NodeHeader { next, prev };
        // SAFETY: The node block is writable and exclusively ours.
        unsafe { node.write(links) };
        // SAFETY: `prev` is a live chain node adjacent to `next`.
        unsafe { (*prev).next = node.as_ptr() };
        // SAFETY: As obligation 1.
        unsafe { (*next).prev = node.as_ptr() };
    }

    /// Splices the detached chain `first..last` (inclusive) into this list
    /// directly before `next`.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `first..last` is a non-empty, internally linked chain detached
    ///    from any list (or about to be detached by these relinks)
    /// 2. `next` is a chain node of this constructed list
    unsafe fn splice_before(
        &mut self,
        first: *mut NodeHeader,
        last: *mut NodeHeader,
        next: *mut NodeHeader,
    ) {
        // SAFETY: `next` is a live chain node (caller obligation 2).
        let prev = unsafe { (*next).prev };
        // SAFETY: `first` is a live node of the spliced chain.
        unsafe { (*first).prev = prev };
        // SAFETY: `last` is a live node of the spliced chain.
        unsafe { (*last).next = next };
        // SAFETY: `prev` is a live chain node adjacent to `next`.
        unsafe { (*prev).next = first };
        // SAFETY: As obligation 2.
        unsafe { (*next).prev = last };
    }

    /// Unlinks `node` from its chain; the node itself is untouched.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `node` is a payload node of a constructed list
    unsafe fn unlink(node: NonNull<NodeHeader>) {
        // SAFETY: The node is live (caller obligation 1).
        let links = unsafe { node.read() };
        // SAFETY: Its neighbors are live chain nodes.
        unsafe { (*links.prev).next = links.next };
        // SAFETY: As above.
        unsafe { (*links.next).prev = links.prev };
    }

    /// Whether `node` is a position of this list: the sentinel or any chain
    /// node.
    #[cfg(debug_assertions)]
    fn owns_node(&self, node: *mut NodeHeader) -> bool {
        if self.sentinel.is_null() {
            return node.is_null();
        }
        if core::ptr::eq(node, self.sentinel) {
            return true;
        }
        // SAFETY: The sentinel is live (field invariants).
        let mut walk = unsafe { (*self.sentinel).next };
        while !core::ptr::eq(walk, self.sentinel) {
            if core::ptr::eq(walk, node) {
                return true;
            }
            // SAFETY: A non-sentinel chain node is live (field invariants).
            walk = unsafe { (*walk).next };
        }
        false
    }
}

impl Default for List {
    fn default() -> Self {
        Self::new()
    }
}

/// Position within a [`List`]: a specific node, or the sentinel for the
/// past-the-end position.
///
/// Cursors are plain positions: copying them is free, and they do not borrow
/// the list. Erasing the pointed-to node invalidates a cursor; using an
/// invalidated cursor is undefined behavior. Debug builds verify membership
/// where they can, by walking the chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListCursor {
    /// The list this cursor positions into.
    list: *const List,
    /// The designated node.
    node: *mut NodeHeader,
}

impl ListCursor {
    /// Moves the cursor `delta` positions towards the back, or towards the
    /// front when negative.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. The cursor is valid: its list is live, unmoved, and still owns the
    ///    designated node
    /// 2. Every step lands on an element or the end position; the walk must
    ///    not step past either end of the chain
    pub unsafe fn advance(&mut self, delta: isize) {
        if delta >= 0 {
            for _ in 0..delta {
                // SAFETY: The current position is a live chain node (caller
                // obligations 1 and 2).
                self.node = unsafe { (*self.node).next };
            }
        } else {
            for _ in 0..delta.unsigned_abs() {
                // SAFETY: As above.
                self.node = unsafe { (*self.node).prev };
            }
        }
        #[cfg(debug_assertions)]
        {
            // SAFETY: The list is live and unmoved (caller obligation 1).
            let owner = unsafe { &*self.list };
            debug_assert!(owner.owns_node(self.node));
        }
    }

    /// Number of forward steps from `self` to `other`.
    ///
    /// Walks the chain, O(n).
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. Both cursors are valid positions of the same live list
    /// 2. `other` is reachable from `self` by following `next` without
    ///    crossing the sentinel, or is `self`
    pub unsafe fn distance_to(self, other: ListCursor) -> usize {
        debug_assert!(core::ptr::eq(self.list, other.list));
        let mut walk = self.node;
        let mut steps = 0;
        while !core::ptr::eq(walk, other.node) {
            // SAFETY: Positions before `other` on the walk are live chain
            // nodes (caller obligations 1 and 2).
            walk = unsafe { (*walk).next };
            steps += 1;
        }
        steps
    }

    /// The element this cursor designates.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. The cursor is valid (see [`ListCursor::advance`]) and `desc` is
    ///    its list's descriptor
    /// 2. The cursor designates an element, not the end position
    pub unsafe fn get(self, desc: &TypeDesc) -> NonNull<u8> {
        #[cfg(debug_assertions)]
        {
            // SAFETY: The list is live and unmoved (caller obligation 1).
            let owner = unsafe { &*self.list };
            debug_assert!(owner.owns_node(self.node));
            debug_assert!(!core::ptr::eq(self.node, owner.sentinel));
        }
        // SAFETY: An element position is a payload node, non-null (caller
        // obligation 2).
        let node = unsafe { NonNull::new_unchecked(self.node) };
        // SAFETY:
        // 1. A payload node of the cursor's list under `desc` (caller
        //    obligations 1 and 2).
        unsafe { List::payload_of(desc, node) }
    }
}
