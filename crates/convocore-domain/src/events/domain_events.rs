//! Event Publisher Domain Port
//!
//! Defines the business contract for publishing system events. This abstraction
//! enables services to publish events without coupling to specific implementations
//! (tokio broadcast, NATS, etc.).

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// System-wide event types for decoupled service communication.
///
/// These events represent domain-level occurrences that services can publish
/// and subscribe to without direct coupling to a specific transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum DomainEvent {
    /// The skeleton cache finished a rebuild (full or differential).
    SkeletonCacheRebuilt {
        /// Storage root the rebuild covered, or `None` for all roots.
        storage_root: Option<String>,
        /// Skeletons added or refreshed.
        skeletons_touched: usize,
        /// Duration in milliseconds.
        duration_ms: u64,
    },
    /// The hierarchy engine finished a parent-reconstruction pass.
    ParentsReconstructed {
        /// Skeletons whose `reconstructedParentId` changed.
        resolved: usize,
        /// Skeletons that remain unresolved after the pass.
        unresolved: usize,
    },
    /// A vector-indexing operation started.
    IndexingStarted {
        /// Collection being indexed.
        collection: String,
        /// Total number of tasks queued for this operation.
        total_tasks: usize,
    },
    /// Vector-indexing progress update.
    IndexingProgress {
        /// Collection being indexed.
        collection: String,
        /// Tasks processed so far.
        processed: usize,
        /// Total tasks queued for this operation.
        total: usize,
        /// Task currently being processed.
        current_task_id: Option<String>,
    },
    /// A vector-indexing operation completed.
    IndexingCompleted {
        /// Collection that was indexed.
        collection: String,
        /// Total chunks upserted.
        chunks: usize,
        /// Duration in milliseconds.
        duration_ms: u64,
    },
    /// The background scheduler completed a tick.
    SchedulerTick {
        /// Tasks evaluated by the indexing decision service this tick.
        evaluated: usize,
        /// Tasks for which indexing was actually triggered.
        indexed: usize,
    },
    /// A semantic search query executed.
    SearchExecuted {
        /// Search query text.
        query: String,
        /// Collection searched.
        collection: String,
        /// Number of results returned.
        results: usize,
        /// Duration in milliseconds.
        duration_ms: u64,
    },
}

/// Domain port for publishing system events.
///
/// Services use this trait to publish events that other parts of the system
/// can react to, without coupling to a specific pub/sub implementation.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event to all subscribers.
    ///
    /// Returns `Ok(())` if the event was successfully sent — not necessarily
    /// that subscribers received it, which depends on the implementation.
    async fn publish(&self, event: DomainEvent) -> Result<()>;

    /// Whether at least one subscriber is currently listening. Useful for
    /// avoiding unnecessary event construction when no one is listening.
    fn has_subscribers(&self) -> bool;
}

/// Shared event publisher for dependency injection.
pub type SharedEventPublisher = Arc<dyn EventPublisher>;
