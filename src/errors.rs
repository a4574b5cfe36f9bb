//! Failure values reported by the container engines.
//!
//! Every fallible container operation returns `Result<_, CapacityError>` and
//! leaves the container in its prior valid state on failure, except where an
//! operation documents a weaker guarantee.

/// Error from a container operation that needed storage it could not get.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum CapacityError {
    /// The requested element count exceeds the largest count any allocation
    /// can hold for the element type.
    #[error("requested capacity exceeds the maximum for the element type")]
    Overflow,
    /// The allocator refused the request.
    #[error("the allocator could not serve the request")]
    AllocFailed,
}
