//!
//! Immutable value objects shared across the domain layer.

/// Provider configuration value objects (embedding, vector store, cache).
pub mod config;
/// Strong-typed identifiers.
pub mod ids;
/// Loosely-typed domain aliases.
pub mod types;

pub use config::{CacheConfig, CoreConfig, EmbeddingConfig, VectorStoreConfig};
pub use ids::{ChunkId, CollectionId, OperationId, TaskId};
pub use types::{CacheProviderKind, EmbeddingProviderKind, OperationType, VectorStoreProviderKind};
