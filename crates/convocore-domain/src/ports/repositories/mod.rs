//! Repository ports for data persistence.
//!
//! The only persisted state owned outside the skeleton cache manifest
//! itself: the indexing decision service's sidecar.

/// Indexing sidecar repository port.
pub mod indexing_sidecar;

pub use indexing_sidecar::{IndexingSidecarEntry, IndexingSidecarRepository};
