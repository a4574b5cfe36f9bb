//! This module encapsulates the fields of the [`AllocData`]. Since this is the
//! only place they are visible, the type of the [`AllocVtable`] is guaranteed
//! to always be in sync with the type of the actual allocator state. This
//! follows from the fact that they are in sync when created and that the API
//! offers no way to change the [`AllocVtable`] or state type after creation.

use crate::{
    allocator::{raw::RawAllocRef, vtable::AllocVtable},
    handlers::AllocHandler,
};

/// Type-erased allocator record with vtable-based dispatch.
///
/// This struct uses `#[repr(C)]` to enable safe field access in type-erased
/// contexts, allowing access to the vtable field even when the concrete state
/// type `S` is unknown.
#[repr(C)]
pub(super) struct AllocData<S: 'static> {
    /// The vtable of this allocator record
    vtable: &'static AllocVtable,
    /// The actual allocator state
    state: S,
}

impl<S: 'static> AllocData<S> {
    /// Creates a new [`AllocData`] with the specified handler and state.
    ///
    /// This method creates the vtable for type-erased dispatch and pairs it
    /// with the allocator state.
    #[inline]
    pub(super) fn new<H: AllocHandler<S>>(state: S) -> Self {
        Self {
            vtable: AllocVtable::new::<S, H>(),
            state,
        }
    }
}

impl<'a> RawAllocRef<'a> {
    /// Returns a reference to the [`AllocVtable`] of the [`AllocData`]
    /// instance.
    #[inline]
    pub(super) fn vtable(self) -> &'static AllocVtable {
        let ptr = self.as_ptr();
        // SAFETY: We don't know the actual inner state type, but we do know
        // that it points to an instance of `AllocData<S>` for some specific
        // `S`. Since `AllocData<S>` is `#[repr(C)]`, that means that it's safe
        // to create pointers to the fields before the actual state.
        //
        // We need to take care to avoid creating an actual reference to the
        // `AllocData` itself though, as that would still be undefined behavior
        // since we don't have the right type.
        let vtable_ptr: *const &'static AllocVtable = unsafe { &raw const (*ptr).vtable };

        // SAFETY: Dereferencing the pointer and getting out the `&'static
        // AllocVtable` is valid for the same reasons
        unsafe { *vtable_ptr }
    }

    /// Accesses the inner state of the [`AllocData`] instance as a reference
    /// to the specified type.
    ///
    /// # Safety
    ///
    /// The caller must ensure that the type `S` matches the actual state type
    /// stored in the [`AllocData`].
    #[inline]
    pub unsafe fn state_downcast_unchecked<S: 'static>(self) -> &'a S {
        // SAFETY: The inner function requires that `S` matches the type
        // stored, but that is guaranteed by our caller.
        let this = unsafe { self.cast_inner::<S>() };
        &this.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_data_field_offsets() {
        use core::mem::{offset_of, size_of};

        #[repr(align(32))]
        struct LargeAlignment {
            _value: u8,
        }

        assert_eq!(offset_of!(AllocData<u8>, vtable), 0);
        assert_eq!(offset_of!(AllocData<u32>, vtable), 0);
        assert_eq!(offset_of!(AllocData<[u64; 4]>, vtable), 0);
        assert_eq!(offset_of!(AllocData<LargeAlignment>, vtable), 0);

        assert!(offset_of!(AllocData<u8>, state) >= size_of::<&'static AllocVtable>());
        assert!(offset_of!(AllocData<u32>, state) >= size_of::<&'static AllocVtable>());
        assert!(offset_of!(AllocData<[u64; 4]>, state) >= size_of::<&'static AllocVtable>());
        assert!(offset_of!(AllocData<LargeAlignment>, state) >= size_of::<&'static AllocVtable>());
    }
}
