//! Domain Port Interfaces
//!
//! Defines all boundary contracts between the domain and external layers.
//! Ports are organized by their purpose and enable dependency injection with
//! clear separation of concerns: high-level modules (domain) define the
//! interfaces, low-level modules (`convocore-providers`) implement them.
//!
//! ## Organization
//!
//! - **providers/** — external service provider ports (storage I/O,
//!   embeddings, vector store, metrics).
//! - **repositories/** — ports for the core's own small persisted side
//!   state (the indexing sidecar).

/// External service provider ports.
pub mod providers;
/// Repository ports for data persistence.
pub mod repositories;

// ============================================================================
// Canonical re-exports — the ONE import surface for all port traits/types.
// Consumers MUST use `use convocore_domain::ports::{...};` only.
// ============================================================================

pub use providers::{
    CollectionInfo, DirEntry, EmbeddingProvider, FileStat, MetadataMap, MetricLabels,
    MetricsError, MetricsProvider, MetricsResult, SkeletonStore, StorageIo, StoreEmbedding,
    StoreSearchResult, VectorStoreProvider,
};
pub use repositories::{IndexingSidecarEntry, IndexingSidecarRepository};
