//! Vector store adapters.

mod in_memory;
#[cfg(feature = "vectorstore-qdrant")]
mod qdrant;

pub use in_memory::InMemoryVectorStore;
#[cfg(feature = "vectorstore-qdrant")]
pub use qdrant::QdrantVectorStore;
