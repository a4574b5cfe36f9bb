//! Module containing the erased allocator record, handle, and staging frame

mod data;
mod frame;
mod handle;
mod raw;
mod vtable;

pub use self::{
    frame::AllocFrame,
    handle::AllocRef,
    raw::{RawAlloc, RawAllocRef},
};
