//! External Provider Ports
//!
//! Ports for the external services the core's four subsystems depend on:
//! filesystem/storage I/O, text embedding, the vector store, and metrics.
//! Each has exactly one production adapter (in `convocore-providers`) plus
//! an in-memory/no-op adapter used by default and in tests.

/// In-memory skeleton store port.
pub mod cache;
/// Embedding provider port.
pub mod embedding;
/// Storage I/O port.
pub mod fs;
/// Observability metrics provider port.
pub mod metrics;
/// Vector store provider port.
pub mod vector_store;

pub use cache::SkeletonStore;
pub use embedding::EmbeddingProvider;
pub use fs::{DirEntry, FileStat, StorageIo};
pub use metrics::{MetricLabels, MetricsError, MetricsProvider, MetricsResult};
pub use vector_store::{
    CollectionInfo, MetadataMap, StoreEmbedding, StoreSearchResult, VectorStoreProvider,
};
