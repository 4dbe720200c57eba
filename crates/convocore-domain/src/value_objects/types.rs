//!
//! Domain type definitions
//!
//! Type aliases for dynamic domain concepts, kept as plain `String` so the
//! set of providers can grow without touching core types.

/// System operation type identifier.
pub type OperationType = String;

/// Embedding provider identifier (e.g. `"openai"`, `"ollama"`).
pub type EmbeddingProviderKind = String;

/// Vector store provider identifier (e.g. `"qdrant"`, `"memory"`).
pub type VectorStoreProviderKind = String;

/// Cache provider identifier (e.g. `"moka"`, `"memory"`).
pub type CacheProviderKind = String;
