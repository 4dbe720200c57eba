//! Flat-file indexing sidecar, persisted as one JSON object keyed by
//! `taskId`. Rewritten in full on every mutation; the sidecar holds one
//! small entry per task, so this is cheap at the scale this core operates
//! at and keeps the on-disk format trivially inspectable.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use convocore_domain::error::Result;
use convocore_domain::ports::{IndexingSidecarEntry, IndexingSidecarRepository, StorageIo};
use convocore_domain::value_objects::TaskId;
use tokio::sync::Mutex;

/// Flat-file-backed sidecar.
pub struct FileIndexingSidecar {
    storage: Arc<dyn StorageIo>,
    path: PathBuf,
    state: Mutex<HashMap<TaskId, IndexingSidecarEntry>>,
}

impl FileIndexingSidecar {
    /// Builds a sidecar persisted to `path`. Call [`Self::load`] before use
    /// to populate the in-memory state from any existing file.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageIo>, path: PathBuf) -> Self {
        Self {
            storage,
            path,
            state: Mutex::new(HashMap::new()),
        }
    }

    /// Loads persisted entries, if the file exists. A corrupt file is
    /// logged and treated as empty rather than failing startup.
    pub async fn load(&self) {
        if !self.storage.exists(&self.path).await {
            return;
        }
        let Ok(raw) = self.storage.read_to_string(&self.path).await else {
            tracing::warn!(path = %self.path.display(), "failed to read indexing sidecar file");
            return;
        };
        match serde_json::from_str::<HashMap<TaskId, IndexingSidecarEntry>>(&raw) {
            Ok(entries) => {
                *self.state.lock().await = entries;
            }
            Err(error) => {
                tracing::warn!(%error, "indexing sidecar file failed to parse, starting empty");
            }
        }
    }

    async fn persist(&self, state: &HashMap<TaskId, IndexingSidecarEntry>) -> Result<()> {
        let serialized = serde_json::to_string(state)?;
        if let Some(parent) = self.path.parent() {
            self.storage.create_dir_all(parent).await?;
        }
        self.storage.write_string(&self.path, &serialized).await
    }
}

#[async_trait]
impl IndexingSidecarRepository for FileIndexingSidecar {
    async fn get(&self, task_id: &TaskId) -> Result<Option<IndexingSidecarEntry>> {
        Ok(self.state.lock().await.get(task_id).cloned())
    }

    async fn upsert(&self, task_id: &TaskId, entry: IndexingSidecarEntry) -> Result<()> {
        let mut state = self.state.lock().await;
        state.insert(*task_id, entry);
        self.persist(&state).await
    }

    async fn record_attempt(&self, task_id: &TaskId) -> Result<()> {
        let mut state = self.state.lock().await;
        let entry = state.entry(*task_id).or_insert_with(|| IndexingSidecarEntry {
            last_indexed_at: chrono::DateTime::<chrono::Utc>::MIN_UTC,
            last_content_hash: String::new(),
            attempts: 0,
        });
        entry.attempts += 1;
        self.persist(&state).await
    }

    async fn all(&self) -> Result<Vec<(TaskId, IndexingSidecarEntry)>> {
        Ok(self
            .state
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
    use crate::fs::InMemoryStorageIo;
    use chrono::Utc;

    fn entry() -> IndexingSidecarEntry {
        IndexingSidecarEntry {
            last_indexed_at: Utc::now(),
            last_content_hash: "abc".to_owned(),
            attempts: 1,
        }
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let storage = Arc::new(InMemoryStorageIo::new());
        let sidecar = FileIndexingSidecar::new(storage, PathBuf::from("/sidecar.json"));
        let task_id = TaskId::new();
        sidecar.upsert(&task_id, entry()).await.unwrap();
        let loaded = sidecar.get(&task_id).await.unwrap();
        assert_eq!(loaded.unwrap().last_content_hash, "abc");
    }

    #[tokio::test]
    async fn record_attempt_increments_without_clearing_hash() {
        let storage = Arc::new(InMemoryStorageIo::new());
        let sidecar = FileIndexingSidecar::new(storage, PathBuf::from("/sidecar.json"));
        let task_id = TaskId::new();
        sidecar.upsert(&task_id, entry()).await.unwrap();
        sidecar.record_attempt(&task_id).await.unwrap();
        let loaded = sidecar.get(&task_id).await.unwrap().unwrap();
        assert_eq!(loaded.attempts, 2);
        assert_eq!(loaded.last_content_hash, "abc");
    }

    #[tokio::test]
    async fn reload_from_persisted_file_recovers_state() {
        let storage = Arc::new(InMemoryStorageIo::new());
        let sidecar = FileIndexingSidecar::new(Arc::clone(&storage) as Arc<dyn StorageIo>, PathBuf::from("/sidecar.json"));
        let task_id = TaskId::new();
        sidecar.upsert(&task_id, entry()).await.unwrap();

        let reloaded = FileIndexingSidecar::new(storage, PathBuf::from("/sidecar.json"));
        reloaded.load().await;
        let loaded = reloaded.get(&task_id).await.unwrap();
        assert!(loaded.is_some());
    }
}
