//! Background Scheduler (component G).
//!
//! A single recurring task, built on `tokio::time::interval`, that on every
//! (non-overlapping) tick: (1) calls `C.ensureFresh`, (2) reconstructs the
//! hierarchy over any newly-unresolved skeletons, (3) walks the cache and
//! offers each skeleton to the indexing decision service, sending `INDEX`
//! decisions to the vector indexer. Exposes `pause()`/`resume()`/`trigger()`
//! to the rest of the core, backed by an `AtomicBool` and a `tokio::sync::mpsc`
//! coalescing channel rather than a bespoke signaling type.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::Utc;
use convocore_domain::error::Result;
use convocore_domain::events::{DomainEvent, SharedEventPublisher};
use convocore_domain::value_objects::CollectionId;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::conversation_parser::ConversationParser;
use crate::hierarchy_engine::HierarchyEngine;
use crate::indexing_decision_service::{IndexingDecisionService, IndexingDecision};
use crate::skeleton_cache::SkeletonCache;
use crate::vector_indexer::VectorIndexer;

/// Per-tick summary, mirrored into `DomainEvent::SchedulerTick`.
#[derive(Debug, Clone, Default)]
pub struct TickStats {
    /// Tasks the indexing decision service evaluated.
    pub evaluated: usize,
    /// Tasks for which the vector indexer actually ran.
    pub indexed: usize,
    /// Tasks deferred (circuit open / concurrency limit) to the next tick.
    pub deferred: usize,
}

/// A handle for controlling an already-spawned scheduler loop.
#[derive(Clone)]
pub struct SchedulerHandle {
    paused: Arc<AtomicBool>,
    trigger_tx: mpsc::Sender<()>,
}

impl SchedulerHandle {
    /// Suspends ticking. In-flight ticks finish; no new tick starts until
    /// [`Self::resume`].
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Resumes ticking on the next interval (or immediately, via [`Self::trigger`]).
    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Requests an out-of-band tick as soon as the loop is free, without
    /// waiting for the next interval. A best-effort request: if the
    /// scheduler is busy with the previous tick, this coalesces with it.
    pub fn trigger(&self) {
        let _ = self.trigger_tx.try_send(());
    }
}

/// Drives components D/E/F on a fixed period.
pub struct Scheduler {
    cache: Arc<SkeletonCache>,
    hierarchy_engine: HierarchyEngine,
    decision_service: IndexingDecisionService,
    indexer: VectorIndexer,
    parser: ConversationParser,
    collection: CollectionId,
    events: Option<SharedEventPublisher>,
    interval_ms: u64,
}

impl Scheduler {
    /// Builds a scheduler over the given components. `parser` re-reads task
    /// directories (via the same `StorageIo` the cache uses) to chunk
    /// message text for the vector indexer, since skeletons themselves
    /// don't retain full message bodies.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cache: Arc<SkeletonCache>,
        hierarchy_engine: HierarchyEngine,
        decision_service: IndexingDecisionService,
        indexer: VectorIndexer,
        parser: ConversationParser,
        collection: CollectionId,
        events: Option<SharedEventPublisher>,
        interval_ms: u64,
    ) -> Self {
        Self {
            cache,
            hierarchy_engine,
            decision_service,
            indexer,
            parser,
            collection,
            events,
            interval_ms,
        }
    }

    /// Runs one full tick: freshness, hierarchy reconstruction, then an
    /// indexing sweep. Called directly by tests and by the spawned loop.
    ///
    /// # Errors
    ///
    /// Surfaces only cache-unreadable or hierarchy-unreadable failures;
    /// per-task indexing failures are logged and counted, never propagated.
    pub async fn tick(&self) -> Result<TickStats> {
        let rebuild_started = Instant::now();
        let rebuilt = self.cache.ensure_fresh(None).await?;
        let candidates = self.cache.get_all().await;
        if rebuilt && let Some(events) = &self.events {
            let _ = events
                .publish(DomainEvent::SkeletonCacheRebuilt {
                    storage_root: None,
                    skeletons_touched: candidates.len(),
                    duration_ms: rebuild_started.elapsed().as_millis() as u64,
                })
                .await;
        }

        let hierarchy_stats = self.hierarchy_engine.reconstruct(&self.cache).await?;
        if let Some(events) = &self.events {
            let resolved = hierarchy_stats.exact_matches + hierarchy_stats.prefix_matches + hierarchy_stats.proximity_matches;
            let _ = events
                .publish(DomainEvent::ParentsReconstructed {
                    resolved,
                    unresolved: hierarchy_stats.unresolved,
                })
                .await;
        }

        let candidates = self.cache.get_all().await;
        if let Some(events) = &self.events {
            let _ = events
                .publish(DomainEvent::IndexingStarted {
                    collection: self.collection.to_string(),
                    total_tasks: candidates.len(),
                })
                .await;
        }

        let indexing_started = Instant::now();
        let total_candidates = candidates.len();
        let mut stats = TickStats::default();
        let mut chunks_upserted = 0usize;
        for skeleton in candidates {
            stats.evaluated += 1;
            let outcome = self
                .decision_service
                .should_index(&skeleton.task_id, &skeleton.content_hash, Utc::now())
                .await?;
            if outcome.decision != IndexingDecision::Index {
                continue;
            }

            let message_texts = self.parser.load_message_texts(Path::new(&skeleton.file_path)).await;
            match self.indexer.index_task(&skeleton, &message_texts, &self.collection).await {
                Ok(outcome) => {
                    self.decision_service
                        .mark_indexed(&skeleton.task_id, &skeleton.content_hash, Utc::now())
                        .await?;
                    stats.indexed += 1;
                    chunks_upserted += outcome.chunks;
                    if let Some(events) = &self.events {
                        let _ = events
                            .publish(DomainEvent::IndexingProgress {
                                collection: self.collection.to_string(),
                                processed: stats.indexed,
                                total: total_candidates,
                                current_task_id: Some(skeleton.task_id.to_string()),
                            })
                            .await;
                    }
                }
                Err(error) if error.is_transient() => {
                    warn!(task_id = %skeleton.task_id, %error, "indexing deferred to next tick");
                    self.decision_service.record_failed_attempt(&skeleton.task_id).await?;
                    stats.deferred += 1;
                }
                Err(error) => {
                    warn!(task_id = %skeleton.task_id, %error, "indexing failed");
                    self.decision_service.record_failed_attempt(&skeleton.task_id).await?;
                }
            }
        }

        if let Some(events) = &self.events {
            let _ = events
                .publish(DomainEvent::IndexingCompleted {
                    collection: self.collection.to_string(),
                    chunks: chunks_upserted,
                    duration_ms: indexing_started.elapsed().as_millis() as u64,
                })
                .await;
            let _ = events
                .publish(DomainEvent::SchedulerTick {
                    evaluated: stats.evaluated,
                    indexed: stats.indexed,
                })
                .await;
        }

        info!(
            evaluated = stats.evaluated,
            indexed = stats.indexed,
            deferred = stats.deferred,
            "scheduler tick complete"
        );
        Ok(stats)
    }

    /// Spawns the periodic loop on the current Tokio runtime and returns a
    /// handle for `pause`/`resume`/`trigger`. Adjacent ticks never overlap:
    /// a tick that outruns the period simply delays the next one, since the
    /// loop body awaits completion before re-arming the interval.
    pub fn spawn(self: Arc<Self>) -> SchedulerHandle {
        let paused = Arc::new(AtomicBool::new(false));
        let (trigger_tx, mut trigger_rx) = mpsc::channel::<()>(1);

        let loop_paused = Arc::clone(&paused);
        let scheduler = self;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_millis(scheduler.interval_ms));
            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = trigger_rx.recv() => {}
                }
                if loop_paused.load(Ordering::SeqCst) {
                    continue;
                }
                if let Err(error) = scheduler.tick().await {
                    warn!(%error, "scheduler tick failed");
                }
            }
        });

        SchedulerHandle { paused, trigger_tx }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy_engine::HierarchyEngineConfig;
    use crate::indexing_decision_service::IndexingDecisionConfig;
    use crate::vector_indexer::VectorIndexerConfig;
    use convocore_providers::cache::InMemorySkeletonStore;
    use convocore_providers::embedding::DeterministicEmbeddingProvider;
    use convocore_providers::fs::InMemoryStorageIo;
    use convocore_providers::indexing_sidecar::InMemoryIndexingSidecar;
    use convocore_providers::vector_store::InMemoryVectorStore;

    async fn scheduler(storage: Arc<InMemoryStorageIo>) -> Scheduler {
        let store = Arc::new(InMemorySkeletonStore::new());
        let cache = Arc::new(SkeletonCache::new(
            store,
            storage.clone(),
            std::path::PathBuf::from("/manifest.json"),
            vec!["/root".to_owned()],
        ));
        let decision_service = IndexingDecisionService::new(
            Arc::new(InMemoryIndexingSidecar::new()),
            IndexingDecisionConfig::default(),
        );
        let indexer = VectorIndexer::new(
            Arc::new(DeterministicEmbeddingProvider::new(8)),
            Arc::new(InMemoryVectorStore::new()),
            None,
            VectorIndexerConfig::default(),
        );
        Scheduler::new(
            cache,
            HierarchyEngine::new(HierarchyEngineConfig::default()),
            decision_service,
            indexer,
            ConversationParser::new(storage),
            CollectionId::from_name("test"),
            None,
            300_000,
        )
    }

    #[tokio::test]
    async fn tick_indexes_a_newly_discovered_task() {
        let storage = Arc::new(InMemoryStorageIo::new());
        storage
            .write_file(
                "/root/tasks/task-1/api_conversation_history.json",
                r#"[{"role":"user","content":"Analyze logs for errors","ts":100}]"#,
            )
            .await;
        let scheduler = scheduler(storage).await;
        let stats = scheduler.tick().await.unwrap();
        assert_eq!(stats.evaluated, 1);
        assert_eq!(stats.indexed, 1);

        // A second tick on unchanged content should index nothing further.
        let stats2 = scheduler.tick().await.unwrap();
        assert_eq!(stats2.indexed, 0);
    }

    #[tokio::test]
    async fn handle_pause_stops_ticks_until_resumed() {
        let storage = Arc::new(InMemoryStorageIo::new());
        let scheduler = Arc::new(scheduler(storage).await);
        let handle = Arc::clone(&scheduler).spawn();
        handle.pause();
        handle.resume();
        handle.trigger();
    }
}
