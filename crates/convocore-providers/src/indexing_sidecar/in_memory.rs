//! Plain in-memory indexing sidecar, for tests.

use std::collections::HashMap;

use async_trait::async_trait;
use convocore_domain::error::Result;
use convocore_domain::ports::{IndexingSidecarEntry, IndexingSidecarRepository};
use convocore_domain::value_objects::TaskId;
use tokio::sync::Mutex;

/// In-memory sidecar.
#[derive(Default)]
pub struct InMemoryIndexingSidecar {
    entries: Mutex<HashMap<TaskId, IndexingSidecarEntry>>,
}

impl InMemoryIndexingSidecar {
    /// Builds an empty sidecar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IndexingSidecarRepository for InMemoryIndexingSidecar {
    async fn get(&self, task_id: &TaskId) -> Result<Option<IndexingSidecarEntry>> {
        Ok(self.entries.lock().await.get(task_id).cloned())
    }

    async fn upsert(&self, task_id: &TaskId, entry: IndexingSidecarEntry) -> Result<()> {
        self.entries.lock().await.insert(*task_id, entry);
        Ok(())
    }

    async fn record_attempt(&self, task_id: &TaskId) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let entry = entries.entry(*task_id).or_insert_with(|| IndexingSidecarEntry {
            last_indexed_at: chrono::DateTime::<chrono::Utc>::MIN_UTC,
            last_content_hash: String::new(),
            attempts: 0,
        });
        entry.attempts += 1;
        Ok(())
    }

    async fn all(&self) -> Result<Vec<(TaskId, IndexingSidecarEntry)>> {
        Ok(self
            .entries
            .lock()
            .await
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn never_indexed_task_has_no_entry() {
        let sidecar = InMemoryIndexingSidecar::new();
        assert!(sidecar.get(&TaskId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn record_attempt_creates_an_entry_with_zero_hash() {
        let sidecar = InMemoryIndexingSidecar::new();
        let task_id = TaskId::new();
        sidecar.record_attempt(&task_id).await.unwrap();
        let entry = sidecar.get(&task_id).await.unwrap().unwrap();
        assert_eq!(entry.attempts, 1);
        assert_eq!(entry.last_content_hash, "");
        let _ = Utc::now();
    }
}
