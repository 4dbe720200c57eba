//! Storage Locator use case (component A).
//!
//! Enumerates a closed, ordered list of candidate roots and confirms which
//! ones actually contain a `tasks/` sub-directory belonging to the host
//! extension. Fails soft: an unreadable candidate is logged and skipped,
//! never fatal to the call.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use convocore_domain::constants::values::TASKS_DIR_NAME;
use convocore_domain::entities::{StorageLocation, StorageStats};
use convocore_domain::ports::StorageIo;
use tracing::warn;

/// Locates and reports on the host extension's storage roots.
pub struct StorageLocator {
    storage: Arc<dyn StorageIo>,
    candidate_roots: Vec<String>,
}

impl StorageLocator {
    /// Builds a locator over a fixed, ordered candidate list (from
    /// `CoreConfig::storage_roots`, itself sourced from `STORAGE_ROOTS` or
    /// platform defaults).
    pub fn new(storage: Arc<dyn StorageIo>, candidate_roots: Vec<String>) -> Self {
        Self {
            storage,
            candidate_roots,
        }
    }

    /// Probes every candidate root and reports which are active.
    ///
    /// Duplicate candidates are probed once each; a candidate whose `tasks/`
    /// directory cannot be listed is reported as `is_active = false` rather
    /// than surfaced as an error.
    pub async fn detect_storage_locations(&self) -> Vec<StorageLocation> {
        let mut locations = Vec::with_capacity(self.candidate_roots.len());
        for root in &self.candidate_roots {
            locations.push(self.probe(root).await);
        }
        locations
    }

    /// Aggregates [`Self::detect_storage_locations`] into totals. The
    /// degraded-skeleton count is always zero here — it is filled in by the
    /// caller from the skeleton cache, since the locator has no visibility
    /// into parse outcomes.
    pub async fn get_storage_stats(&self) -> StorageStats {
        let locations = self.detect_storage_locations().await;
        let total_conversations = locations.iter().map(|l| l.conversation_count).sum();
        let total_size = locations.iter().map(|l| l.total_size).sum();
        StorageStats {
            locations,
            total_conversations,
            total_size,
            degraded_skeleton_count: 0,
        }
    }

    async fn probe(&self, root: &str) -> StorageLocation {
        let root_path = Path::new(root);
        let tasks_dir = root_path.join(TASKS_DIR_NAME);

        if !self.storage.exists(&tasks_dir).await {
            return StorageLocation {
                path: root.to_owned(),
                is_active: false,
                conversation_count: 0,
                total_size: 0,
                detected_at: Utc::now(),
            };
        }

        match self.storage.read_dir_entries(&tasks_dir).await {
            Ok(entries) => {
                let task_dirs: Vec<_> = entries.into_iter().filter(|e| e.is_dir).collect();
                let conversation_count = task_dirs.len();
                let mut total_size = 0u64;
                for dir in &task_dirs {
                    total_size += self.dir_size(&dir.path).await;
                }
                StorageLocation {
                    path: root.to_owned(),
                    is_active: true,
                    conversation_count,
                    total_size,
                    detected_at: Utc::now(),
                }
            }
            Err(error) => {
                warn!(root, %error, "failed to read tasks directory, treating root as inactive");
                StorageLocation {
                    path: root.to_owned(),
                    is_active: false,
                    conversation_count: 0,
                    total_size: 0,
                    detected_at: Utc::now(),
                }
            }
        }
    }

    async fn dir_size(&self, dir: &Path) -> u64 {
        let Ok(entries) = self.storage.read_dir_entries(dir).await else {
            return 0;
        };
        let mut size = 0u64;
        for entry in entries {
            if entry.is_file {
                if let Ok(stat) = self.storage.stat(&entry.path).await {
                    size += stat.len;
                }
            } else if entry.is_dir {
                size += Box::pin(self.dir_size(&entry.path)).await;
            }
        }
        size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convocore_providers::fs::InMemoryStorageIo;

    #[tokio::test]
    async fn inactive_root_has_no_tasks_dir() {
        let storage = Arc::new(InMemoryStorageIo::new());
        let locator = StorageLocator::new(storage, vec!["/roots/missing".to_owned()]);
        let locations = locator.detect_storage_locations().await;
        assert_eq!(locations.len(), 1);
        assert!(!locations[0].is_active);
    }

    #[tokio::test]
    async fn active_root_counts_task_directories() {
        let storage = Arc::new(InMemoryStorageIo::new());
        storage
            .write_file("/root/tasks/task-a/metadata.json", "{}")
            .await;
        storage
            .write_file("/root/tasks/task-b/metadata.json", "{}")
            .await;

        let locator = StorageLocator::new(storage, vec!["/root".to_owned()]);
        let stats = locator.get_storage_stats().await;
        assert_eq!(stats.total_conversations, 2);
    }
}
