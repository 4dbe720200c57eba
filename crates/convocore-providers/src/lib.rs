//! Provider implementations for the conversation-state core.
//!
//! Each module is a concrete adapter for one domain port: real filesystem
//! I/O plus an in-memory fixture (`fs`), a `moka`-backed skeleton store
//! (`cache`), HTTP and deterministic offline embedding providers
//! (`embedding`), an in-memory vector store and an optional Qdrant backend
//! (`vector_store`), a flat-file indexing sidecar (`indexing_sidecar`), and
//! an in-process broadcast event publisher (`events`).
//! None of these types are referenced by name outside the composition root
//! and test modules; everything upstream depends on the port traits in
//! `convocore_domain::ports`.

/// Skeleton store adapters (`moka`-backed and in-memory).
pub mod cache;
/// Embedding provider adapters (HTTP and deterministic offline).
pub mod embedding;
/// Domain event publisher adapters (in-process broadcast channel).
pub mod events;
/// Storage I/O adapters (real filesystem and in-memory fixture).
pub mod fs;
/// Indexing sidecar repository adapters (flat-file and in-memory).
pub mod indexing_sidecar;
/// Observability metrics adapter (Prometheus, via the `metrics` facade).
pub mod metrics;
/// Vector store adapters (in-memory and, behind a feature flag, Qdrant).
pub mod vector_store;
