//! Moka-backed [`SkeletonStore`].
//!
//! High-performance concurrent in-memory cache, used in production. Entries
//! are never evicted by size or TTL: the skeleton cache holds one entry per
//! task directory on disk (the manifest is the real bound on cardinality),
//! so the `max_capacity` configured here is a safety ceiling, not a working
//! set.

use async_trait::async_trait;
use convocore_domain::entities::ConversationSkeleton;
use convocore_domain::ports::SkeletonStore;
use convocore_domain::value_objects::TaskId;
use moka::future::Cache;

/// Moka-based skeleton store.
#[derive(Clone)]
pub struct MokaSkeletonStore {
    cache: Cache<TaskId, ConversationSkeleton>,
}

impl MokaSkeletonStore {
    /// Builds a store bounded to `max_capacity` entries.
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            cache: Cache::builder().max_capacity(max_capacity).build(),
        }
    }
}

impl Default for MokaSkeletonStore {
    fn default() -> Self {
        Self::new(100_000)
    }
}

#[async_trait]
impl SkeletonStore for MokaSkeletonStore {
    async fn insert(&self, skeleton: ConversationSkeleton) {
        self.cache.insert(skeleton.task_id, skeleton).await;
    }

    async fn get(&self, task_id: &TaskId) -> Option<ConversationSkeleton> {
        self.cache.get(task_id).await
    }

    async fn remove(&self, task_id: &TaskId) {
        self.cache.invalidate(task_id).await;
    }

    async fn all(&self) -> Vec<ConversationSkeleton> {
        self.cache.run_pending_tasks().await;
        self.cache.iter().map(|(_, v)| v).collect()
    }

    async fn len(&self) -> usize {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count() as usize
    }

    async fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use convocore_domain::entities::ParentResolutionMethod;
    use std::collections::BTreeSet;

    fn skeleton(task_id: TaskId) -> ConversationSkeleton {
        let now = Utc::now();
        ConversationSkeleton {
            task_id,
            parent_task_id: None,
            reconstructed_parent_id: None,
            parent_confidence_score: None,
            parent_resolution_method: ParentResolutionMethod::Unresolved,
            workspace: None,
            created_at: now,
            last_activity: now,
            message_count: 0,
            total_size: 0,
            modes: BTreeSet::new(),
            summary: String::new(),
            file_path: String::new(),
            truncated_instruction: String::new(),
            child_task_instruction_prefixes: Vec::new(),
            data_source: String::new(),
            content_hash: String::new(),
        }
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let store = MokaSkeletonStore::new(100);
        let task_id = TaskId::new();
        store.insert(skeleton(task_id)).await;
        assert!(store.get(&task_id).await.is_some());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn clear_empties_the_store() {
        let store = MokaSkeletonStore::new(100);
        store.insert(skeleton(TaskId::new())).await;
        store.clear().await;
        assert_eq!(store.len().await, 0);
    }
}
