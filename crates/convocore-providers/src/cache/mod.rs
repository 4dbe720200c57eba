//! Skeleton store adapters.

mod in_memory;
mod moka_store;

pub use in_memory::InMemorySkeletonStore;
pub use moka_store::MokaSkeletonStore;
