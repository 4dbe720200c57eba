//! Indexing sidecar repository adapters.

mod file_backed;
mod in_memory;

pub use file_backed::FileIndexingSidecar;
pub use in_memory::InMemoryIndexingSidecar;
