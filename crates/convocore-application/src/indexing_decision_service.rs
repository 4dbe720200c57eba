//! Indexing Decision Service (component E).
//!
//! The idempotence gate invoked before any embedding call. Reads and writes
//! nothing but its own sidecar (`taskId → {lastIndexedAt, lastContentHash,
//! attempts}`), entirely independent of the skeleton cache: callers pass in
//! the `contentHash` they already have from a [`crate::skeleton_cache`] read.

use chrono::{DateTime, Utc};
use convocore_domain::constants::indexing::{
    DEFAULT_MAX_REINDEX_INTERVAL_MS, DEFAULT_MIN_REINDEX_INTERVAL_MS,
};
use convocore_domain::error::Result;
use convocore_domain::ports::{IndexingSidecarEntry, IndexingSidecarRepository};
use convocore_domain::value_objects::TaskId;
use std::sync::Arc;

/// Whether a task should be (re)indexed right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexingDecision {
    /// Send the task through the vector indexer.
    Index,
    /// Leave the task's existing index entry untouched.
    Skip,
}

/// Why [`IndexingDecisionService::should_index`] reached its decision.
///
/// Matches the stable reason strings in spec.md §4.E so the tool gateway
/// can surface them verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexingReason {
    /// No sidecar entry exists yet for this task.
    FirstTime,
    /// `contentHash` is unchanged since the last successful index.
    Idempotent,
    /// Last index is younger than the minimum reindex interval.
    RateLimited,
    /// Last index is older than the maximum reindex interval, regardless of
    /// content change.
    StalenessBound,
    /// Content changed and the minimum interval has elapsed.
    ContentChanged,
}

impl IndexingReason {
    /// Stable string form, for logging and the tool-call result payload.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FirstTime => "first_time",
            Self::Idempotent => "idempotent",
            Self::RateLimited => "rate_limited",
            Self::StalenessBound => "staleness_bound",
            Self::ContentChanged => "content_changed",
        }
    }
}

/// The outcome of a single [`IndexingDecisionService::should_index`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexingDecisionOutcome {
    /// Whether to index.
    pub decision: IndexingDecision,
    /// Why.
    pub reason: IndexingReason,
}

/// Tuning knobs, overridable from `CoreConfig` at startup.
#[derive(Debug, Clone, Copy)]
pub struct IndexingDecisionConfig {
    /// Minimum time between reindexing unchanged content, in milliseconds.
    pub min_reindex_interval_ms: i64,
    /// Maximum time a task may go without reindexing, in milliseconds.
    pub max_reindex_interval_ms: i64,
}

impl Default for IndexingDecisionConfig {
    fn default() -> Self {
        Self {
            min_reindex_interval_ms: DEFAULT_MIN_REINDEX_INTERVAL_MS,
            max_reindex_interval_ms: DEFAULT_MAX_REINDEX_INTERVAL_MS,
        }
    }
}

/// The idempotence gate guarding the vector indexer (F).
pub struct IndexingDecisionService {
    sidecar: Arc<dyn IndexingSidecarRepository>,
    config: IndexingDecisionConfig,
}

impl IndexingDecisionService {
    /// Builds a service over the given sidecar repository.
    #[must_use]
    pub fn new(sidecar: Arc<dyn IndexingSidecarRepository>, config: IndexingDecisionConfig) -> Self {
        Self { sidecar, config }
    }

    /// Decides whether `task_id` should be (re)indexed right now.
    ///
    /// The minimum/maximum reindex-interval checks take priority over the
    /// content-unchanged check: spec.md §8 Scenario 4 requires a task whose
    /// content is unchanged but whose last index is past `MAX_INTERVAL` to
    /// still be re-indexed (`staleness_bound`), and one whose content *did*
    /// change but is still inside `MIN_INTERVAL` to still be skipped
    /// (`rate_limited`) — so elapsed-time rules are evaluated before the
    /// content-hash comparison, not after it as the rule list's literal
    /// ordering would otherwise suggest.
    ///
    /// # Errors
    ///
    /// Only surfaces an error if the sidecar repository itself is
    /// unreadable.
    pub async fn should_index(
        &self,
        task_id: &TaskId,
        content_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<IndexingDecisionOutcome> {
        let Some(entry) = self.sidecar.get(task_id).await? else {
            return Ok(outcome(IndexingDecision::Index, IndexingReason::FirstTime));
        };

        let elapsed_ms = (now - entry.last_indexed_at).num_milliseconds().max(0);

        if elapsed_ms < self.config.min_reindex_interval_ms {
            return Ok(outcome(IndexingDecision::Skip, IndexingReason::RateLimited));
        }
        if elapsed_ms > self.config.max_reindex_interval_ms {
            return Ok(outcome(
                IndexingDecision::Index,
                IndexingReason::StalenessBound,
            ));
        }
        if entry.last_content_hash == content_hash {
            return Ok(outcome(IndexingDecision::Skip, IndexingReason::Idempotent));
        }
        Ok(outcome(
            IndexingDecision::Index,
            IndexingReason::ContentChanged,
        ))
    }

    /// Records a successful index: updates `lastIndexedAt`/`lastContentHash`
    /// and bumps the attempt counter. Called by the vector indexer only
    /// after a successful upsert.
    ///
    /// # Errors
    ///
    /// Surfaces an error if the sidecar repository cannot be written.
    pub async fn mark_indexed(
        &self,
        task_id: &TaskId,
        content_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let attempts = self
            .sidecar
            .get(task_id)
            .await?
            .map_or(0, |entry| entry.attempts);
        self.sidecar
            .upsert(
                task_id,
                IndexingSidecarEntry {
                    last_indexed_at: now,
                    last_content_hash: content_hash.to_owned(),
                    attempts: attempts + 1,
                },
            )
            .await
    }

    /// Records a failed attempt (circuit-open or transient failure) without
    /// advancing `lastIndexedAt`/`lastContentHash`, so the next tick is
    /// still eligible under the same rules.
    ///
    /// # Errors
    ///
    /// Surfaces an error if the sidecar repository cannot be written.
    pub async fn record_failed_attempt(&self, task_id: &TaskId) -> Result<()> {
        self.sidecar.record_attempt(task_id).await
    }
}

fn outcome(decision: IndexingDecision, reason: IndexingReason) -> IndexingDecisionOutcome {
    IndexingDecisionOutcome { decision, reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convocore_providers::indexing_sidecar::InMemoryIndexingSidecar;

    fn service(min_ms: i64, max_ms: i64) -> IndexingDecisionService {
        IndexingDecisionService::new(
            Arc::new(InMemoryIndexingSidecar::new()),
            IndexingDecisionConfig {
                min_reindex_interval_ms: min_ms,
                max_reindex_interval_ms: max_ms,
            },
        )
    }

    #[tokio::test]
    async fn never_indexed_yields_first_time() {
        let service = service(4 * 60 * 60 * 1000, 24 * 60 * 60 * 1000);
        let outcome = service
            .should_index(&TaskId::new(), "hash-a", Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome.decision, IndexingDecision::Index);
        assert_eq!(outcome.reason, IndexingReason::FirstTime);
    }

    #[tokio::test]
    async fn full_scenario_4_timeline() {
        let min_ms = 4 * 60 * 60 * 1000;
        let max_ms = 24 * 60 * 60 * 1000;
        let service = service(min_ms, max_ms);
        let task_id = TaskId::new();
        let t0 = Utc::now();

        service.mark_indexed(&task_id, "H", t0).await.unwrap();

        let at_1h = service
            .should_index(&task_id, "H", t0 + chrono::Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(at_1h.decision, IndexingDecision::Skip);
        assert_eq!(at_1h.reason, IndexingReason::RateLimited);

        let at_5h_unchanged = service
            .should_index(&task_id, "H", t0 + chrono::Duration::hours(5))
            .await
            .unwrap();
        assert_eq!(at_5h_unchanged.decision, IndexingDecision::Skip);
        assert_eq!(at_5h_unchanged.reason, IndexingReason::Idempotent);

        let at_25h_unchanged = service
            .should_index(&task_id, "H", t0 + chrono::Duration::hours(25))
            .await
            .unwrap();
        assert_eq!(at_25h_unchanged.decision, IndexingDecision::Index);
        assert_eq!(at_25h_unchanged.reason, IndexingReason::StalenessBound);

        let at_5h_changed = service
            .should_index(&task_id, "H2", t0 + chrono::Duration::hours(5))
            .await
            .unwrap();
        assert_eq!(at_5h_changed.decision, IndexingDecision::Index);
        assert_eq!(at_5h_changed.reason, IndexingReason::ContentChanged);
    }

    #[tokio::test]
    async fn second_call_on_unchanged_task_skips() {
        let service = service(0, 24 * 60 * 60 * 1000);
        let task_id = TaskId::new();
        let now = Utc::now();
        service.mark_indexed(&task_id, "H", now).await.unwrap();
        let outcome = service
            .should_index(&task_id, "H", now + chrono::Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(outcome.decision, IndexingDecision::Skip);
    }
}
