pub mod schedule;
pub mod allocator;
pub mod roster;

pub use allocator::{AllocationEngine, SharedEngine};
pub use roster::sample_doctors;
