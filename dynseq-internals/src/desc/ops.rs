//! Optional per-type operation table.
//!
//! A [`TypeOps`] carries the lifecycle and comparison callbacks of one element
//! type as nullable function pointers. An absent callback is a claim about the
//! type: no `copy_fn` means byte copies are valid, no `move_fn` means the type
//! is trivially relocatable, no `drop_fn` means dropping is a no-op. The
//! descriptor and the range primitives consult these fields and fall back to
//! raw byte operations when a callback is absent.
//!
//! The typed builders at the bottom of this module bind monomorphized shims
//! over a concrete Rust type, so a descriptor for a Rust element can be
//! assembled without writing any unsafe code. All builders are `const` and the
//! same `T` must be used across every builder call for one table; the engines'
//! entry points make "the descriptor matches the element type" a caller
//! obligation, which covers mismatched builder calls as well.

use core::ptr::NonNull;

use rustc_hash::FxHasher;

/// Copy-constructs the element at `src` into the uninitialized slot `dst`.
pub type CopyFn = unsafe fn(dst: NonNull<u8>, src: NonNull<u8>);

/// Move-constructs from `src` into the uninitialized slot `dst`, leaving the
/// source constructed in a moved-from state that still needs destruction.
pub type MoveFn = unsafe fn(dst: NonNull<u8>, src: NonNull<u8>);

/// Destroys the element in `slot` without freeing its storage.
pub type DropFn = unsafe fn(slot: NonNull<u8>);

/// Compares two elements for equality.
pub type EqualFn = unsafe fn(a: NonNull<u8>, b: NonNull<u8>) -> bool;

/// Strict-weak-order "less than" over two elements.
pub type LessFn = unsafe fn(a: NonNull<u8>, b: NonNull<u8>) -> bool;

/// Hashes one element to a 64-bit value.
pub type HashFn = unsafe fn(slot: NonNull<u8>) -> u64;

/// Nullable lifecycle and comparison callbacks for one element type.
///
/// Every field that is `None` declares the corresponding operation trivial;
/// see the module docs for what each absence claims about the type.
#[derive(Clone, Copy, Debug, Default)]
pub struct TypeOps {
    /// Copy constructor, or `None` when byte copies are valid.
    copy_fn: Option<CopyFn>,
    /// Move constructor, or `None` when the type relocates by byte transfer.
    move_fn: Option<MoveFn>,
    /// Destructor, or `None` when dropping is a no-op.
    drop_fn: Option<DropFn>,
    /// Equality predicate, or `None` when the type is not comparable.
    equal_fn: Option<EqualFn>,
    /// Ordering predicate, or `None` when the type is not ordered.
    less_fn: Option<LessFn>,
    /// Hash function, or `None` when the type is not hashable.
    hash_fn: Option<HashFn>,
}

impl TypeOps {
    /// Creates an empty table: every operation trivial, nothing comparable.
    pub const fn new() -> Self {
        Self {
            copy_fn: None,
            move_fn: None,
            drop_fn: None,
            equal_fn: None,
            less_fn: None,
            hash_fn: None,
        }
    }

    /// Creates the table for the Rust type `T`.
    ///
    /// Registers a destructor iff `T` needs one and leaves copy and move
    /// absent: every Rust type relocates correctly by byte transfer. Chain the
    /// `with_*` builders (with the same `T`) to register the optional
    /// capabilities.
    pub const fn for_type<T: 'static>() -> Self {
        Self {
            copy_fn: None,
            move_fn: None,
            drop_fn: if core::mem::needs_drop::<T>() {
                Some(drop_value::<T> as DropFn)
            } else {
                None
            },
            equal_fn: None,
            less_fn: None,
            hash_fn: None,
        }
    }

    /// Registers a copy constructor that clones `T`.
    pub const fn with_clone<T: Clone + 'static>(mut self) -> Self {
        self.copy_fn = Some(clone_value::<T> as CopyFn);
        self
    }

    /// Registers a move constructor that takes the source value and leaves
    /// `T::default()` behind, so the source stays valid for its destructor.
    pub const fn with_move<T: Default + 'static>(mut self) -> Self {
        self.move_fn = Some(take_value::<T> as MoveFn);
        self
    }

    /// Registers an equality predicate over `T`.
    pub const fn with_eq<T: PartialEq + 'static>(mut self) -> Self {
        self.equal_fn = Some(equal_values::<T> as EqualFn);
        self
    }

    /// Registers an ordering predicate over `T`.
    pub const fn with_ord<T: PartialOrd + 'static>(mut self) -> Self {
        self.less_fn = Some(less_values::<T> as LessFn);
        self
    }

    /// Registers a hash function over `T` backed by [`FxHasher`].
    pub const fn with_hash<T: core::hash::Hash + 'static>(mut self) -> Self {
        self.hash_fn = Some(hash_value::<T> as HashFn);
        self
    }

    /// Registers a foreign copy constructor.
    pub const fn with_copy_raw(mut self, callback: CopyFn) -> Self {
        self.copy_fn = Some(callback);
        self
    }

    /// Registers a foreign move constructor. The engines destroy move sources
    /// afterwards, so the callback must leave `*src` valid for the registered
    /// destructor.
    pub const fn with_move_raw(mut self, callback: MoveFn) -> Self {
        self.move_fn = Some(callback);
        self
    }

    /// Registers a foreign destructor.
    pub const fn with_drop_raw(mut self, callback: DropFn) -> Self {
        self.drop_fn = Some(callback);
        self
    }

    /// Registers a foreign equality predicate.
    pub const fn with_equal_raw(mut self, callback: EqualFn) -> Self {
        self.equal_fn = Some(callback);
        self
    }

    /// Registers a foreign ordering predicate.
    pub const fn with_less_raw(mut self, callback: LessFn) -> Self {
        self.less_fn = Some(callback);
        self
    }

    /// Registers a foreign hash function.
    pub const fn with_hash_raw(mut self, callback: HashFn) -> Self {
        self.hash_fn = Some(callback);
        self
    }

    /// The registered copy constructor, if any.
    #[inline]
    pub(super) const fn copy_fn(&self) -> Option<CopyFn> {
        self.copy_fn
    }

    /// The registered move constructor, if any.
    #[inline]
    pub(super) const fn move_fn(&self) -> Option<MoveFn> {
        self.move_fn
    }

    /// The registered destructor, if any.
    #[inline]
    pub(super) const fn drop_fn(&self) -> Option<DropFn> {
        self.drop_fn
    }

    /// The registered equality predicate, if any.
    #[inline]
    pub(super) const fn equal_fn(&self) -> Option<EqualFn> {
        self.equal_fn
    }

    /// The registered ordering predicate, if any.
    #[inline]
    pub(super) const fn less_fn(&self) -> Option<LessFn> {
        self.less_fn
    }

    /// The registered hash function, if any.
    #[inline]
    pub(super) const fn hash_fn(&self) -> Option<HashFn> {
        self.hash_fn
    }
}

/// Copy-constructs a `T` by cloning.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. `src` points to an initialized `T`
/// 2. `dst` points to writable, `T`-aligned storage for one `T` that does not
///    overlap `*src`
unsafe fn clone_value<T: Clone>(dst: NonNull<u8>, src: NonNull<u8>) {
    // SAFETY:
    // 1. Guaranteed by the caller
    let source: &T = unsafe { src.cast::<T>().as_ref() };
    let value = source.clone();
    // SAFETY:
    // 2. Guaranteed by the caller
    unsafe { dst.cast::<T>().write(value) }
}

/// Move-constructs a `T` by taking the source value and leaving
/// `T::default()` behind.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. `src` points to an initialized `T`
/// 2. `dst` points to writable, `T`-aligned storage for one `T` that does not
///    overlap `*src`
unsafe fn take_value<T: Default>(dst: NonNull<u8>, src: NonNull<u8>) {
    // SAFETY:
    // 1. Guaranteed by the caller
    let value = unsafe { src.cast::<T>().replace(T::default()) };
    // SAFETY:
    // 2. Guaranteed by the caller
    unsafe { dst.cast::<T>().write(value) }
}

/// Drops the `T` in `slot` in place.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. `slot` points to an initialized `T` that is not used again until it is
///    re-initialized
unsafe fn drop_value<T>(slot: NonNull<u8>) {
    // SAFETY:
    // 1. Guaranteed by the caller
    unsafe { slot.cast::<T>().drop_in_place() }
}

/// Compares two `T`s with `==`.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. `a` and `b` both point to initialized `T`s
unsafe fn equal_values<T: PartialEq>(a: NonNull<u8>, b: NonNull<u8>) -> bool {
    // SAFETY:
    // 1. Guaranteed by the caller
    let a: &T = unsafe { a.cast::<T>().as_ref() };
    // SAFETY:
    // 1. Guaranteed by the caller
    let b: &T = unsafe { b.cast::<T>().as_ref() };
    a == b
}

/// Compares two `T`s with `<`.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. `a` and `b` both point to initialized `T`s
unsafe fn less_values<T: PartialOrd>(a: NonNull<u8>, b: NonNull<u8>) -> bool {
    // SAFETY:
    // 1. Guaranteed by the caller
    let a: &T = unsafe { a.cast::<T>().as_ref() };
    // SAFETY:
    // 1. Guaranteed by the caller
    let b: &T = unsafe { b.cast::<T>().as_ref() };
    a < b
}

/// Hashes a `T` with [`FxHasher`].
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. `slot` points to an initialized `T`
unsafe fn hash_value<T: core::hash::Hash>(slot: NonNull<u8>) -> u64 {
    use core::hash::Hasher;

    // SAFETY:
    // 1. Guaranteed by the caller
    let value: &T = unsafe { slot.cast::<T>().as_ref() };
    let mut hasher = FxHasher::default();
    value.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_type_registers_drop_only_when_needed() {
        assert!(TypeOps::for_type::<u64>().drop_fn().is_none());
        assert!(TypeOps::for_type::<alloc::string::String>().drop_fn().is_some());
    }

    #[test]
    fn builders_are_usable_in_const_context() {
        const OPS: TypeOps = TypeOps::for_type::<u32>()
            .with_clone::<u32>()
            .with_eq::<u32>()
            .with_ord::<u32>()
            .with_hash::<u32>();
        assert!(OPS.copy_fn().is_some());
        assert!(OPS.move_fn().is_none());
        assert!(OPS.equal_fn().is_some());
        assert!(OPS.less_fn().is_some());
        assert!(OPS.hash_fn().is_some());
    }

    #[test]
    fn shims_round_trip_a_value() {
        use core::mem::MaybeUninit;

        let ops = TypeOps::for_type::<u32>()
            .with_clone::<u32>()
            .with_eq::<u32>()
            .with_ord::<u32>();

        let source: u32 = 0x5EED;
        let mut slot = MaybeUninit::<u32>::uninit();
        let src = NonNull::from(&source).cast::<u8>();
        let dst = NonNull::new(slot.as_mut_ptr()).unwrap().cast::<u8>();

        let copy = ops.copy_fn().unwrap();
        // SAFETY: `src` is an initialized u32 and `dst` is a disjoint
        // writable u32 slot.
        unsafe { copy(dst, src) };
        // SAFETY: the copy above initialized the slot.
        assert_eq!(unsafe { slot.assume_init() }, 0x5EED);

        let equal = ops.equal_fn().unwrap();
        // SAFETY: both pointers reference initialized u32s.
        assert!(unsafe { equal(dst, src) });
        let less = ops.less_fn().unwrap();
        // SAFETY: both pointers reference initialized u32s.
        assert!(!unsafe { less(dst, src) });
    }

    #[test]
    fn take_value_leaves_the_source_droppable() {
        use alloc::string::String;
        use core::mem::MaybeUninit;

        let ops = TypeOps::for_type::<String>().with_move::<String>();
        let mut source = String::from("payload");
        let mut slot = MaybeUninit::<String>::uninit();
        let mover = ops.move_fn().unwrap();
        let dst = NonNull::new(slot.as_mut_ptr()).unwrap().cast::<u8>();
        // SAFETY: `source` is initialized and `slot` is disjoint writable
        // storage for one String.
        unsafe { mover(dst, NonNull::from(&mut source).cast::<u8>()) };
        // SAFETY: the move above initialized the slot.
        let moved = unsafe { slot.assume_init() };
        assert_eq!(moved, "payload");
        assert_eq!(source, "");
    }
}
