//! Internal utility types.

/// Marker type used when type-erasing allocator state.
///
/// This zero-sized type serves as a placeholder in generic type parameters
/// when the actual concrete type has been erased. For example,
/// `AllocData<Erased>` represents an allocator record whose concrete state
/// type is unknown at the current scope.
///
/// Using a distinct marker type (rather than `()`) makes the intent clearer
/// in type signatures and error messages.
pub(crate) struct Erased;
