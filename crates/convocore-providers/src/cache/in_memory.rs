//! Plain in-memory [`SkeletonStore`], used in tests where `moka`'s async
//! eventual-consistency (entries not immediately visible to `all`/`len`
//! after `insert`) would make assertions flaky.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use convocore_domain::entities::ConversationSkeleton;
use convocore_domain::ports::SkeletonStore;
use convocore_domain::value_objects::TaskId;

/// Synchronous `HashMap`-backed skeleton store.
#[derive(Default)]
pub struct InMemorySkeletonStore {
    entries: Mutex<HashMap<TaskId, ConversationSkeleton>>,
}

impl InMemorySkeletonStore {
    /// Builds an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SkeletonStore for InMemorySkeletonStore {
    async fn insert(&self, skeleton: ConversationSkeleton) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(skeleton.task_id, skeleton);
    }

    async fn get(&self, task_id: &TaskId) -> Option<ConversationSkeleton> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(task_id)
            .cloned()
    }

    async fn remove(&self, task_id: &TaskId) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(task_id);
    }

    async fn all(&self) -> Vec<ConversationSkeleton> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    async fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    async fn clear(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
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
    async fn insert_is_immediately_visible() {
        let store = InMemorySkeletonStore::new();
        let task_id = TaskId::new();
        store.insert(skeleton(task_id)).await;
        assert_eq!(store.len().await, 1);
        assert!(store.get(&task_id).await.is_some());
    }

    #[tokio::test]
    async fn remove_drops_the_entry() {
        let store = InMemorySkeletonStore::new();
        let task_id = TaskId::new();
        store.insert(skeleton(task_id)).await;
        store.remove(&task_id).await;
        assert!(store.get(&task_id).await.is_none());
    }
}
