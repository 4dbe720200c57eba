//! Indexing sidecar repository port.
//!
//! The indexing decision service's (E) sole persisted state: one entry per
//! task tracking when it was last indexed, under what content hash, and how
//! many attempts have been made. Deliberately separate from the skeleton
//! cache manifest (spec.md §4.E: "independent of the skeleton cache. This
//! sidecar is the sole write surface of F").

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::value_objects::ids::TaskId;

/// One task's indexing history, as tracked by the sidecar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexingSidecarEntry {
    /// When this task was last successfully indexed.
    pub last_indexed_at: DateTime<Utc>,
    /// `ConversationSkeleton::content_hash` at the time of that indexing.
    pub last_content_hash: String,
    /// Number of indexing attempts made for this task, including failures.
    pub attempts: u32,
}

/// Indexing sidecar repository port.
///
/// Implementations persist entries to a small flat file (the production
/// adapter) or hold them purely in memory (tests). Mutated only by the
/// indexing decision service and the vector indexer; every other component
/// only reads the skeleton cache, never this sidecar.
#[async_trait]
pub trait IndexingSidecarRepository: Send + Sync {
    /// Looks up the sidecar entry for a task, if one exists.
    async fn get(&self, task_id: &TaskId) -> Result<Option<IndexingSidecarEntry>>;

    /// Inserts or replaces the sidecar entry for a task.
    async fn upsert(&self, task_id: &TaskId, entry: IndexingSidecarEntry) -> Result<()>;

    /// Increments the attempt counter for a task without changing
    /// `last_indexed_at`/`last_content_hash` — used when a circuit-open or
    /// transient failure prevents a successful index.
    async fn record_attempt(&self, task_id: &TaskId) -> Result<()>;

    /// Returns every tracked entry, for the scheduler's sweep.
    async fn all(&self) -> Result<Vec<(TaskId, IndexingSidecarEntry)>>;
}
