//! Integration tests for the dynseq crate.
//!
//! This suite drives the three engines end to end through the public surface:
//!
//! ## Vector Engine Tests (7 tests)
//! - `test_vector_growth_follows_the_policy`: Capacity grows by one and a
//!   half, every grow frees the old block, and erasure shifts the tail down
//! - `test_vector_failed_growth_leaves_elements_intact`: A refused allocation
//!   surfaces as an error without disturbing the live elements
//! - `test_vector_impossible_requests_report_overflow`: Requests past the
//!   element maximum fail up front and touch nothing
//! - `test_vector_no_op_calls_touch_no_storage`: Empty erases and empty
//!   inserts never reach the allocator
//! - `test_vector_copy_assign_keeps_identity_by_default`: Retained identity
//!   copies elementwise into the destination's own storage
//! - `test_vector_copy_assign_propagates_the_source_allocator`: Propagation
//!   rewrites the destination handle and moves its storage to the new identity
//! - `test_vector_move_assign_steals_without_element_work`: The wholesale
//!   steal runs no element callbacks and empties the source
//!
//! ## List Engine Tests (3 tests)
//! - `test_list_nodes_account_one_allocation_each`: One block per node plus
//!   the sentinel, balanced through erasure and teardown
//! - `test_list_move_assign_with_shared_record_splices`: Identical identities
//!   splice nodes across in constant time with no allocation
//! - `test_list_copy_assign_propagates_the_source_allocator`: Propagation
//!   rebuilds the list under the source identity before the old one goes
//!
//! ## String Engine Tests (1 test)
//! - `test_string_edit_and_search_round_trip`: Assign, mid-insert, search,
//!   substring, and erase over one record, terminator maintained throughout
//!
//! ## Shared Allocator Tests (1 test)
//! - `test_shared_alloc_clones_share_one_identity`: Storage allocated through
//!   one clone of a shared record is freed through another
//!
//! ## Layout Tests (1 test)
//! - `test_engine_layouts_and_auto_traits`: Size and auto-trait guarantees of
//!   the engines, cursors, and error types
//!
//! ## Differential Property Tests (1 test)
//! - `vector_tracks_the_standard_vector`: Arbitrary operation sequences keep
//!   the engine's contents identical to `Vec`

use std::{
    alloc::{Layout, alloc, dealloc},
    cell::Cell,
    mem::ManuallyDrop,
    ptr::NonNull,
    rc::Rc,
};

use dynseq::{
    AllocPropagation, AllocRef, CapacityError, Cursor, Elements, List, ListCursor, ListElements,
    RawAlloc, SharedAlloc, TypeDesc, TypeOps, Vector, ZString, handlers::AllocHandler,
};
use proptest::prelude::*;

/// Allocator state that tracks outstanding and total allocations.
struct CountingState {
    live: Cell<usize>,
    total: Cell<usize>,
}

impl CountingState {
    fn new() -> Self {
        Self {
            live: Cell::new(0),
            total: Cell::new(0),
        }
    }
}

struct CountingHandler;

impl AllocHandler<CountingState> for CountingHandler {
    fn allocate(state: &CountingState, layout: Layout) -> Option<NonNull<u8>> {
        let block = NonNull::new(unsafe { alloc(layout) })?;
        state.live.set(state.live.get() + 1);
        state.total.set(state.total.get() + 1);
        Some(block)
    }

    unsafe fn deallocate(state: &CountingState, block: NonNull<u8>, layout: Layout) {
        state.live.set(state.live.get() - 1);
        unsafe { dealloc(block.as_ptr(), layout) };
    }
}

/// Allocator state that serves a fixed number of requests and then refuses.
struct BudgetState {
    remaining: Cell<usize>,
    live: Cell<usize>,
}

impl BudgetState {
    fn new(budget: usize) -> Self {
        Self {
            remaining: Cell::new(budget),
            live: Cell::new(0),
        }
    }
}

struct BudgetHandler;

impl AllocHandler<BudgetState> for BudgetHandler {
    fn allocate(state: &BudgetState, layout: Layout) -> Option<NonNull<u8>> {
        if state.remaining.get() == 0 {
            return None;
        }
        let block = NonNull::new(unsafe { alloc(layout) })?;
        state.remaining.set(state.remaining.get() - 1);
        state.live.set(state.live.get() + 1);
        Some(block)
    }

    unsafe fn deallocate(state: &BudgetState, block: NonNull<u8>, layout: Layout) {
        state.live.set(state.live.get() - 1);
        unsafe { dealloc(block.as_ptr(), layout) };
    }
}

/// Clone and drop counters shared by every [`Tracked`] element of one test.
#[derive(Default)]
struct Counters {
    clones: Cell<usize>,
    drops: Cell<usize>,
}

/// Element type that reports its lifecycle traffic.
struct Tracked {
    value: u32,
    counters: Rc<Counters>,
}

impl Clone for Tracked {
    fn clone(&self) -> Self {
        self.counters.clones.set(self.counters.clones.get() + 1);
        Self {
            value: self.value,
            counters: Rc::clone(&self.counters),
        }
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.counters.drops.set(self.counters.drops.get() + 1);
    }
}

/// A `String` descriptor whose copies clone instead of sharing buffers.
fn string_desc() -> TypeDesc {
    TypeDesc::define_with(
        size_of::<String>(),
        align_of::<String>(),
        TypeOps::for_type::<String>().with_clone::<String>(),
    )
    .unwrap()
}

fn push_string(vector: &mut Vector, desc: &TypeDesc, alloc: AllocRef<'_>, text: &str) {
    let mut value = ManuallyDrop::new(String::from(text));
    unsafe {
        vector
            .push(desc, alloc, NonNull::from(&mut *value).cast())
            .unwrap();
    }
}

fn push_back_string(list: &mut List, desc: &TypeDesc, alloc: AllocRef<'_>, text: &str) {
    let mut value = ManuallyDrop::new(String::from(text));
    unsafe {
        list.push_back(desc, alloc, NonNull::from(&mut *value).cast())
            .unwrap();
    }
}

fn collect_strings(vector: &Vector, desc: &TypeDesc) -> Vec<String> {
    vector
        .elements(desc)
        .map(|slot| unsafe { slot.cast::<String>().as_ref().clone() })
        .collect()
}

fn collect_list_strings(list: &List, desc: &TypeDesc) -> Vec<String> {
    list.elements(desc)
        .map(|slot| unsafe { slot.cast::<String>().as_ref().clone() })
        .collect()
}

// Vector engine tests

#[test]
fn test_vector_growth_follows_the_policy() {
    let desc = TypeDesc::of::<u32>().unwrap();
    let record = RawAlloc::new::<_, CountingHandler>(CountingState::new());
    let handle = AllocRef::from(record.as_ref());
    let state = unsafe { record.as_ref().state_downcast_unchecked::<CountingState>() };

    let mut vector = Vector::new();
    assert_eq!(vector.capacity(&desc), 0);

    let mut caps = Vec::new();
    for n in 0u32..10 {
        unsafe {
            vector
                .push_copy(&desc, handle, NonNull::from(&n).cast())
                .unwrap();
        }
        let cap = vector.capacity(&desc);
        if caps.last() != Some(&cap) {
            caps.push(cap);
        }
    }
    assert_eq!(caps, [1, 2, 3, 4, 6, 9, 13]);
    assert_eq!(state.total.get(), 7);
    // Every grow freed the block it replaced.
    assert_eq!(state.live.get(), 1);

    assert_eq!(vector.len(&desc), 10);
    assert_eq!(unsafe { vector.get(&desc, 5).cast::<u32>().read() }, 5);

    unsafe { vector.erase(&desc, 0) };
    assert_eq!(vector.len(&desc), 9);
    assert_eq!(unsafe { vector.get(&desc, 0).cast::<u32>().read() }, 1);
    assert_eq!(unsafe { vector.get(&desc, 8).cast::<u32>().read() }, 9);

    unsafe { vector.destroy(&desc, handle) };
    assert_eq!(state.live.get(), 0);
}

#[test]
fn test_vector_failed_growth_leaves_elements_intact() {
    let desc = TypeDesc::of::<u32>().unwrap();
    let record = RawAlloc::new::<_, BudgetHandler>(BudgetState::new(1));
    let handle = AllocRef::from(record.as_ref());

    let mut vector = Vector::new();
    let first = 11u32;
    unsafe {
        vector
            .push_copy(&desc, handle, NonNull::from(&first).cast())
            .unwrap();
    }
    assert_eq!(vector.len(&desc), 1);

    let second = 22u32;
    let refused = unsafe { vector.push_copy(&desc, handle, NonNull::from(&second).cast()) };
    assert_eq!(refused.unwrap_err(), CapacityError::AllocFailed);

    assert_eq!(vector.len(&desc), 1);
    assert_eq!(unsafe { vector.get(&desc, 0).cast::<u32>().read() }, 11);

    unsafe { vector.destroy(&desc, handle) };
    let state = unsafe { record.as_ref().state_downcast_unchecked::<BudgetState>() };
    assert_eq!(state.live.get(), 0);
}

#[test]
fn test_vector_impossible_requests_report_overflow() {
    let desc = TypeDesc::of::<u32>().unwrap();
    let alloc = AllocRef::global();

    let mut vector = Vector::new();
    let refused = unsafe { vector.reserve(&desc, alloc, usize::MAX) };
    assert_eq!(refused.unwrap_err(), CapacityError::Overflow);
    assert_eq!(vector.capacity(&desc), 0);

    let probe = 5u32;
    let refused =
        unsafe { vector.insert_fill(&desc, alloc, 0, usize::MAX, NonNull::from(&probe).cast()) };
    assert_eq!(refused.unwrap_err(), CapacityError::Overflow);
    assert!(vector.is_empty());
}

#[test]
fn test_vector_no_op_calls_touch_no_storage() {
    let desc = TypeDesc::of::<u32>().unwrap();
    let record = RawAlloc::new::<_, CountingHandler>(CountingState::new());
    let handle = AllocRef::from(record.as_ref());
    let state = unsafe { record.as_ref().state_downcast_unchecked::<CountingState>() };

    let mut vector = Vector::new();
    let probe = 9u32;
    unsafe {
        vector.erase_range(&desc, 0, 0);
        vector
            .insert_fill(&desc, handle, 0, 0, NonNull::from(&probe).cast())
            .unwrap();
        vector.clear(&desc);
        vector.destroy(&desc, handle);
    }
    assert!(vector.is_empty());
    assert_eq!(state.total.get(), 0);
}

#[test]
fn test_vector_copy_assign_keeps_identity_by_default() {
    let desc = string_desc();
    let dst_record = RawAlloc::new::<_, CountingHandler>(CountingState::new());
    let src_record = RawAlloc::new::<_, CountingHandler>(CountingState::new());
    let mut dst_alloc = AllocRef::from(dst_record.as_ref());
    let src_alloc = AllocRef::from(src_record.as_ref());

    let mut dst = Vector::new();
    let mut src = Vector::new();
    push_string(&mut dst, &desc, dst_alloc, "old0");
    push_string(&mut dst, &desc, dst_alloc, "old1");
    for text in ["a", "b", "c"] {
        push_string(&mut src, &desc, src_alloc, text);
    }

    unsafe {
        dst.copy_assign_from(&src, &desc, &mut dst_alloc, src_alloc, AllocPropagation::Retain)
            .unwrap();
    }

    assert!(dst_alloc.is_identical(AllocRef::from(dst_record.as_ref())));
    assert_eq!(collect_strings(&dst, &desc), ["a", "b", "c"]);
    assert_eq!(collect_strings(&src, &desc), ["a", "b", "c"]);

    let dst_state = unsafe { dst_record.as_ref().state_downcast_unchecked::<CountingState>() };
    let src_state = unsafe { src_record.as_ref().state_downcast_unchecked::<CountingState>() };
    assert_eq!(dst_state.live.get(), 1);
    assert_eq!(src_state.live.get(), 1);

    unsafe { dst.destroy(&desc, dst_alloc) };
    unsafe { src.destroy(&desc, src_alloc) };
    assert_eq!(dst_state.live.get(), 0);
    assert_eq!(src_state.live.get(), 0);
}

#[test]
fn test_vector_copy_assign_propagates_the_source_allocator() {
    let desc = string_desc();
    let dst_record = RawAlloc::new::<_, CountingHandler>(CountingState::new());
    let src_record = RawAlloc::new::<_, CountingHandler>(CountingState::new());
    let mut dst_alloc = AllocRef::from(dst_record.as_ref());
    let src_alloc = AllocRef::from(src_record.as_ref());

    let mut dst = Vector::new();
    let mut src = Vector::new();
    push_string(&mut dst, &desc, dst_alloc, "old");
    for text in ["a", "b", "c"] {
        push_string(&mut src, &desc, src_alloc, text);
    }

    unsafe {
        dst.copy_assign_from(
            &src,
            &desc,
            &mut dst_alloc,
            src_alloc,
            AllocPropagation::Propagate,
        )
        .unwrap();
    }

    assert!(dst_alloc.is_identical(src_alloc));
    assert_eq!(collect_strings(&dst, &desc), ["a", "b", "c"]);
    assert_eq!(collect_strings(&src, &desc), ["a", "b", "c"]);

    let dst_state = unsafe { dst_record.as_ref().state_downcast_unchecked::<CountingState>() };
    let src_state = unsafe { src_record.as_ref().state_downcast_unchecked::<CountingState>() };
    // The old storage went back to the old identity; the replacement came
    // from the adopted one.
    assert_eq!(dst_state.live.get(), 0);
    assert_eq!(src_state.live.get(), 2);

    unsafe { dst.destroy(&desc, dst_alloc) };
    unsafe { src.destroy(&desc, src_alloc) };
    assert_eq!(src_state.live.get(), 0);
}

#[test]
fn test_vector_move_assign_steals_without_element_work() {
    let counters = Rc::new(Counters::default());
    let tracked = |value: u32| Tracked {
        value,
        counters: Rc::clone(&counters),
    };
    let ops = TypeOps::for_type::<Tracked>().with_clone::<Tracked>();
    let desc = TypeDesc::define_with(size_of::<Tracked>(), align_of::<Tracked>(), ops).unwrap();

    let dst_record = RawAlloc::new::<_, CountingHandler>(CountingState::new());
    let src_record = RawAlloc::new::<_, CountingHandler>(CountingState::new());
    let mut dst_alloc = AllocRef::from(dst_record.as_ref());
    let src_alloc = AllocRef::from(src_record.as_ref());

    let mut dst = Vector::new();
    let mut src = Vector::new();
    for value in [7, 8] {
        let mut element = ManuallyDrop::new(tracked(value));
        unsafe {
            dst.push(&desc, dst_alloc, NonNull::from(&mut *element).cast())
                .unwrap();
        }
    }
    for value in [1, 2, 3] {
        let mut element = ManuallyDrop::new(tracked(value));
        unsafe {
            src.push(&desc, src_alloc, NonNull::from(&mut *element).cast())
                .unwrap();
        }
    }
    assert_eq!(counters.clones.get(), 0);
    assert_eq!(counters.drops.get(), 0);

    unsafe {
        dst.move_assign_from(
            &mut src,
            &desc,
            &mut dst_alloc,
            src_alloc,
            AllocPropagation::Propagate,
        )
        .unwrap();
    }

    // Only the destination's old elements were destroyed; the steal itself
    // ran no element callbacks.
    assert_eq!(counters.clones.get(), 0);
    assert_eq!(counters.drops.get(), 2);
    assert!(dst_alloc.is_identical(src_alloc));
    assert!(src.is_empty());
    assert_eq!(src.capacity(&desc), 0);

    let values: Vec<u32> = dst
        .elements(&desc)
        .map(|slot| unsafe { slot.cast::<Tracked>().as_ref().value })
        .collect();
    assert_eq!(values, [1, 2, 3]);

    let dst_state = unsafe { dst_record.as_ref().state_downcast_unchecked::<CountingState>() };
    let src_state = unsafe { src_record.as_ref().state_downcast_unchecked::<CountingState>() };
    assert_eq!(dst_state.live.get(), 0);
    assert_eq!(src_state.live.get(), 1);

    unsafe { dst.destroy(&desc, dst_alloc) };
    assert_eq!(counters.drops.get(), 5);
    assert_eq!(src_state.live.get(), 0);
}

// List engine tests

#[test]
fn test_list_nodes_account_one_allocation_each() {
    let desc = TypeDesc::of::<u64>().unwrap();
    let record = RawAlloc::new::<_, CountingHandler>(CountingState::new());
    let handle = AllocRef::from(record.as_ref());
    let state = unsafe { record.as_ref().state_downcast_unchecked::<CountingState>() };

    let mut list = List::construct(handle).unwrap();
    assert_eq!(state.live.get(), 1);

    for n in 1u64..=5 {
        unsafe {
            list.push_back(&desc, handle, NonNull::from(&n).cast())
                .unwrap();
        }
    }
    assert_eq!(list.len(), 5);
    assert_eq!(state.live.get(), 6);

    let mut from = list.begin();
    unsafe { from.advance(1) };
    let mut to = list.begin();
    unsafe { to.advance(4) };
    let after = unsafe { list.erase_range(&desc, handle, from, to) };

    assert_eq!(list.len(), 2);
    assert_eq!(state.live.get(), 3);
    assert_eq!(unsafe { after.get(&desc).cast::<u64>().read() }, 5);

    let survivors: Vec<u64> = list
        .elements(&desc)
        .map(|slot| unsafe { slot.cast::<u64>().read() })
        .collect();
    assert_eq!(survivors, [1, 5]);

    unsafe { list.destroy(&desc, handle) };
    assert_eq!(state.live.get(), 0);
}

#[test]
fn test_list_move_assign_with_shared_record_splices() {
    let desc = TypeDesc::of::<u64>().unwrap();
    let shared = SharedAlloc::new::<CountingHandler>(CountingState::new());
    let mut dst_handle = shared.handle();

    let mut dst = List::construct(shared.handle()).unwrap();
    let mut src = List::construct(shared.handle()).unwrap();
    for n in [9u64, 9] {
        unsafe {
            dst.push_back(&desc, shared.handle(), NonNull::from(&n).cast())
                .unwrap();
        }
    }
    for n in 1u64..=3 {
        unsafe {
            src.push_back(&desc, shared.handle(), NonNull::from(&n).cast())
                .unwrap();
        }
    }

    let before = shared.state().total.get();
    unsafe {
        dst.move_assign_from(
            &mut src,
            &desc,
            &mut dst_handle,
            shared.handle(),
            AllocPropagation::Retain,
        )
        .unwrap();
    }
    // The nodes moved wholesale; nothing was allocated.
    assert_eq!(shared.state().total.get(), before);

    let values: Vec<u64> = dst
        .elements(&desc)
        .map(|slot| unsafe { slot.cast::<u64>().read() })
        .collect();
    assert_eq!(values, [1, 2, 3]);
    assert!(src.is_empty());

    // The emptied source stays constructed and usable.
    let extra = 4u64;
    unsafe {
        src.push_back(&desc, shared.handle(), NonNull::from(&extra).cast())
            .unwrap();
    }
    assert_eq!(src.len(), 1);

    unsafe { dst.destroy(&desc, shared.handle()) };
    unsafe { src.destroy(&desc, shared.handle()) };
    assert_eq!(shared.state().live.get(), 0);
}

#[test]
fn test_list_copy_assign_propagates_the_source_allocator() {
    let desc = string_desc();
    let dst_record = RawAlloc::new::<_, CountingHandler>(CountingState::new());
    let src_record = RawAlloc::new::<_, CountingHandler>(CountingState::new());
    let mut dst_alloc = AllocRef::from(dst_record.as_ref());
    let src_alloc = AllocRef::from(src_record.as_ref());

    let mut dst = List::construct(dst_alloc).unwrap();
    let mut src = List::construct(src_alloc).unwrap();
    push_back_string(&mut dst, &desc, dst_alloc, "old");
    for text in ["a", "b", "c"] {
        push_back_string(&mut src, &desc, src_alloc, text);
    }

    unsafe {
        dst.copy_assign_from(
            &src,
            &desc,
            &mut dst_alloc,
            src_alloc,
            AllocPropagation::Propagate,
        )
        .unwrap();
    }

    assert!(dst_alloc.is_identical(src_alloc));
    assert_eq!(collect_list_strings(&dst, &desc), ["a", "b", "c"]);
    assert_eq!(collect_list_strings(&src, &desc), ["a", "b", "c"]);

    let dst_state = unsafe { dst_record.as_ref().state_downcast_unchecked::<CountingState>() };
    let src_state = unsafe { src_record.as_ref().state_downcast_unchecked::<CountingState>() };
    // The old sentinel and node went back to the old identity; the rebuilt
    // list lives under the adopted one.
    assert_eq!(dst_state.live.get(), 0);
    assert_eq!(src_state.live.get(), 8);

    unsafe { dst.destroy(&desc, dst_alloc) };
    unsafe { src.destroy(&desc, src_alloc) };
    assert_eq!(src_state.live.get(), 0);
}

// String engine tests

#[test]
fn test_string_edit_and_search_round_trip() {
    let record = RawAlloc::new::<_, CountingHandler>(CountingState::new());
    let handle = AllocRef::from(record.as_ref());
    let state = unsafe { record.as_ref().state_downcast_unchecked::<CountingState>() };

    let mut text = ZString::new();
    unsafe {
        text.assign(handle, b"0123456789ABCDE").unwrap();
        text.insert(handle, 7, b"ABCD").unwrap();
    }
    assert_eq!(text.len(), 19);
    assert_eq!(text.as_bytes(), b"0123456ABCD789ABCDE");
    assert_eq!(text.as_bytes_with_nul().last(), Some(&0));

    assert_eq!(text.find(b"ABCD", 0), Some(7));
    assert_eq!(text.find(b"ABCD", 8), Some(14));
    assert_eq!(text.find(b"ABCD", 15), None);
    assert_eq!(text.find_byte(b'E', 0), Some(18));

    let mut tail = text.substring(handle, 14, 100).unwrap();
    assert_eq!(tail.as_bytes(), b"ABCDE");

    text.erase(7, 4);
    assert_eq!(text.as_bytes(), b"0123456789ABCDE");

    unsafe { tail.destroy(handle) };
    unsafe { text.destroy(handle) };
    assert_eq!(state.live.get(), 0);
}

// Shared allocator tests

#[test]
fn test_shared_alloc_clones_share_one_identity() {
    let desc = TypeDesc::of::<u64>().unwrap();
    let shared = SharedAlloc::new::<CountingHandler>(CountingState::new());
    let clone = shared.clone();
    assert!(shared.handle().is_identical(clone.handle()));
    assert_eq!(shared.strong_count(), 2);

    let mut vector = Vector::new();
    for n in 0u64..4 {
        unsafe {
            vector
                .push_copy(&desc, shared.handle(), NonNull::from(&n).cast())
                .unwrap();
        }
    }
    assert_eq!(shared.state().live.get(), 1);

    // Storage allocated through one clone frees through the other.
    unsafe { vector.destroy(&desc, clone.handle()) };
    assert_eq!(clone.state().live.get(), 0);
}

// Layout tests

#[test]
fn test_engine_layouts_and_auto_traits() {
    use static_assertions::{assert_eq_size, assert_impl_all, assert_not_impl_any};

    assert_eq_size!(Vector, [usize; 3]);
    assert_eq_size!(List, [usize; 2]);
    assert_eq_size!(ZString, Vector);

    assert_impl_all!(Cursor: Copy, Clone, PartialEq, Ord);
    assert_impl_all!(ListCursor: Copy, Clone, PartialEq);
    assert_impl_all!(Elements<'static>: Clone, ExactSizeIterator, DoubleEndedIterator);
    assert_impl_all!(ListElements<'static>: Clone, ExactSizeIterator, DoubleEndedIterator);
    assert_not_impl_any!(Elements<'static>: Copy);
    assert_not_impl_any!(ListElements<'static>: Copy);

    assert_impl_all!(CapacityError: Copy, PartialEq, core::error::Error, Send, Sync);
    assert_impl_all!(AllocPropagation: Copy, PartialEq, Default);

    assert_not_impl_any!(Vector: Clone, Send, Sync);
    assert_not_impl_any!(List: Clone, Send, Sync);
    assert_not_impl_any!(ZString: Clone, Send, Sync);
    assert_not_impl_any!(Cursor: Send, Sync);
    assert_not_impl_any!(ListCursor: Send, Sync);
}

// Differential property tests

/// One mutation mirrored onto both the engine and the model.
#[derive(Debug, Clone)]
enum Step {
    Push(u64),
    Pop,
    Insert(usize, u64),
    Erase(usize),
}

fn step_sequences() -> impl Strategy<Value = Vec<Step>> {
    proptest::collection::vec(
        prop_oneof![
            any::<u64>().prop_map(Step::Push),
            Just(Step::Pop),
            (any::<usize>(), any::<u64>()).prop_map(|(at, value)| Step::Insert(at, value)),
            any::<usize>().prop_map(Step::Erase),
        ],
        0..64,
    )
}

proptest! {
    #[test]
    fn vector_tracks_the_standard_vector(steps in step_sequences()) {
        let desc = TypeDesc::of::<u64>().unwrap();
        let alloc = AllocRef::global();
        let mut engine = Vector::new();
        let mut model: Vec<u64> = Vec::new();

        for step in steps {
            match step {
                Step::Push(value) => {
                    unsafe {
                        engine
                            .push_copy(&desc, alloc, NonNull::from(&value).cast())
                            .unwrap();
                    }
                    model.push(value);
                }
                Step::Pop => {
                    if !model.is_empty() {
                        unsafe { engine.pop(&desc) };
                        model.pop();
                    }
                }
                Step::Insert(at, value) => {
                    let at = at % (model.len() + 1);
                    unsafe {
                        engine
                            .insert_one_copy(&desc, alloc, at, NonNull::from(&value).cast())
                            .unwrap();
                    }
                    model.insert(at, value);
                }
                Step::Erase(at) => {
                    if !model.is_empty() {
                        let at = at % model.len();
                        unsafe { engine.erase(&desc, at) };
                        model.remove(at);
                    }
                }
            }

            let live: Vec<u64> = engine
                .elements(&desc)
                .map(|slot| unsafe { slot.cast::<u64>().read() })
                .collect();
            prop_assert_eq!(&live, &model);
        }

        unsafe { engine.destroy(&desc, alloc) };
    }
}
