//! Skeleton Cache use case (component C).
//!
//! Owns every [`ConversationSkeleton`] in memory and the on-disk manifest
//! it is persisted to. The in-memory half is delegated to a
//! [`SkeletonStore`] port (a bounded `moka` cache in production, a plain
//! map in tests); this module owns the freshness policy, the differential
//! rebuild, and manifest (de)serialization.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use convocore_domain::constants::indexing::CACHE_RECENCY_WINDOW_MS;
use convocore_domain::constants::values::TASKS_DIR_NAME;
use convocore_domain::entities::ConversationSkeleton;
use convocore_domain::error::Result;
use convocore_domain::ports::{SkeletonStore, StorageIo};
use convocore_domain::value_objects::TaskId;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::conversation_parser::ConversationParser;

/// Current on-disk manifest format. Bumped whenever a field is added or
/// renamed in a way that isn't `#[serde(default)]`-compatible.
pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

/// Statistics returned by [`SkeletonCache::rebuild`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RebuildStats {
    /// Task directories scanned.
    pub scanned: usize,
    /// Directories (re)parsed during this rebuild (fewer than `scanned` on
    /// a differential pass).
    pub parsed: usize,
    /// Whether this was a forced full rebuild.
    pub forced: bool,
}

#[derive(Serialize, Deserialize)]
struct ManifestEntry {
    skeleton: ConversationSkeleton,
    source_mtime_ms: i64,
}

#[derive(Serialize, Deserialize)]
struct Manifest {
    schema_version: u32,
    entries: Vec<ManifestEntry>,
}

struct FreshnessState {
    last_known_mtimes: HashMap<PathBuf, i64>,
    rebuild_in_progress: bool,
}

/// The persisted + in-memory skeleton cache.
pub struct SkeletonCache {
    store: Arc<dyn SkeletonStore>,
    storage: Arc<dyn StorageIo>,
    parser: ConversationParser,
    manifest_path: PathBuf,
    storage_roots: Vec<String>,
    state: Mutex<FreshnessState>,
}

impl SkeletonCache {
    /// Builds a cache bound to `manifest_path` and the given storage roots.
    /// The manifest is not loaded until [`Self::load_manifest`] is called.
    pub fn new(
        store: Arc<dyn SkeletonStore>,
        storage: Arc<dyn StorageIo>,
        manifest_path: PathBuf,
        storage_roots: Vec<String>,
    ) -> Self {
        let parser = ConversationParser::new(Arc::clone(&storage));
        Self {
            store,
            storage,
            parser,
            manifest_path,
            storage_roots,
            state: Mutex::new(FreshnessState {
                last_known_mtimes: HashMap::new(),
                rebuild_in_progress: false,
            }),
        }
    }

    /// Loads the manifest from disk, if present. A corrupt or
    /// version-mismatched manifest falls back to an empty cache (the next
    /// `ensureFresh`/`rebuild` performs a full rebuild, per spec.md §4.C).
    pub async fn load_manifest(&self) {
        if !self.storage.exists(&self.manifest_path).await {
            return;
        }
        let raw = match self.storage.read_to_string(&self.manifest_path).await {
            Ok(raw) => raw,
            Err(error) => {
                warn!(%error, "failed to read cache manifest, starting empty");
                return;
            }
        };
        let manifest: Manifest = match serde_json::from_str(&raw) {
            Ok(manifest) => manifest,
            Err(error) => {
                warn!(%error, "cache manifest failed to parse, starting empty");
                return;
            }
        };
        if manifest.schema_version != MANIFEST_SCHEMA_VERSION {
            warn!(
                found = manifest.schema_version,
                expected = MANIFEST_SCHEMA_VERSION,
                "cache manifest schema version mismatch, starting empty"
            );
            return;
        }

        let mut state = self.state.lock().await;
        for entry in manifest.entries {
            let path = PathBuf::from(&entry.skeleton.file_path);
            state
                .last_known_mtimes
                .insert(path, entry.source_mtime_ms);
            self.store.insert(entry.skeleton).await;
        }
    }

    async fn persist_manifest(&self) -> Result<()> {
        let state = self.state.lock().await;
        let mut entries = Vec::new();
        for skeleton in self.store.all().await {
            let source_mtime_ms = state
                .last_known_mtimes
                .get(Path::new(&skeleton.file_path))
                .copied()
                .unwrap_or(0);
            entries.push(ManifestEntry {
                skeleton,
                source_mtime_ms,
            });
        }
        drop(state);

        let manifest = Manifest {
            schema_version: MANIFEST_SCHEMA_VERSION,
            entries,
        };
        let serialized = serde_json::to_string(&manifest)?;
        if let Some(parent) = self.manifest_path.parent() {
            self.storage.create_dir_all(parent).await?;
        }
        self.storage
            .write_string(&self.manifest_path, &serialized)
            .await
    }

    /// Returns every skeleton currently cached.
    pub async fn get_all(&self) -> Vec<ConversationSkeleton> {
        self.store.all().await
    }

    /// Looks up one skeleton by id.
    pub async fn get_by_id(&self, task_id: &TaskId) -> Option<ConversationSkeleton> {
        self.store.get(task_id).await
    }

    /// Replaces a skeleton in the store (used by the hierarchy engine to
    /// write back `reconstructedParentId`/confidence/method).
    pub async fn put(&self, skeleton: ConversationSkeleton) {
        self.store.insert(skeleton).await;
    }

    /// Enumerates, parses, and merges task directories across every
    /// storage root. `force` bypasses the differential mtime check;
    /// `workspace` restricts the scan to task directories under that
    /// workspace, when known from a prior parse.
    pub async fn rebuild(&self, force: bool, workspace: Option<&str>) -> Result<RebuildStats> {
        {
            let mut state = self.state.lock().await;
            if state.rebuild_in_progress {
                drop(state);
                // Coalesce concurrent rebuild requests onto the one in flight.
                while self.state.lock().await.rebuild_in_progress {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                return Ok(RebuildStats::default());
            }
            state.rebuild_in_progress = true;
        }

        let result = self.rebuild_inner(force, workspace).await;

        self.state.lock().await.rebuild_in_progress = false;
        result
    }

    async fn rebuild_inner(&self, force: bool, workspace: Option<&str>) -> Result<RebuildStats> {
        if force {
            self.store.clear().await;
            self.state.lock().await.last_known_mtimes.clear();
        }

        let mut stats = RebuildStats {
            scanned: 0,
            parsed: 0,
            forced: force,
        };

        for root in &self.storage_roots {
            let tasks_dir = Path::new(root).join(TASKS_DIR_NAME);
            let Ok(entries) = self.storage.read_dir_entries(&tasks_dir).await else {
                continue;
            };
            for entry in entries.into_iter().filter(|e| e.is_dir) {
                stats.scanned += 1;

                let mtime_ms = self
                    .storage
                    .stat(&entry.path)
                    .await
                    .ok()
                    .and_then(|s| s.modified)
                    .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                    .map(|d| d.as_millis() as i64)
                    .unwrap_or(0);

                let needs_parse = {
                    let state = self.state.lock().await;
                    force
                        || state
                            .last_known_mtimes
                            .get(&entry.path)
                            .is_none_or(|known| *known < mtime_ms)
                };
                if !needs_parse {
                    continue;
                }

                let skeleton = self.parser.parse_task_directory(&entry.path, root).await;
                if let Some(ws) = workspace
                    && skeleton.workspace.as_deref() != Some(ws)
                {
                    continue;
                }

                self.merge(skeleton).await;
                self.state
                    .lock()
                    .await
                    .last_known_mtimes
                    .insert(entry.path.clone(), mtime_ms);
                stats.parsed += 1;
            }
        }

        if let Err(error) = self.persist_manifest().await {
            warn!(%error, "failed to persist cache manifest after rebuild");
        }

        info!(scanned = stats.scanned, parsed = stats.parsed, forced = force, "skeleton cache rebuild complete");
        Ok(stats)
    }

    /// Merges an incoming skeleton: when `taskId` already exists (possible
    /// across multiple storage roots), the entry with the latest
    /// `lastActivity` wins, with a warning on conflict.
    async fn merge(&self, incoming: ConversationSkeleton) {
        if let Some(existing) = self.store.get(&incoming.task_id).await
            && existing.last_activity > incoming.last_activity
        {
            warn!(
                task_id = %incoming.task_id,
                "duplicate taskId across storage roots, keeping the more recently active copy"
            );
            return;
        }
        self.store.insert(incoming).await;
    }

    /// Freshness gate called by the gateway before any read. Returns `true`
    /// if a rebuild ran, `false` on a pure cache hit.
    pub async fn ensure_fresh(&self, workspace: Option<&str>) -> Result<bool> {
        if self.store.len().await == 0 {
            self.rebuild(false, workspace).await?;
            return Ok(true);
        }

        let newest_known_activity = self
            .store
            .all()
            .await
            .into_iter()
            .map(|s| s.last_activity)
            .max()
            .unwrap_or_else(|| DateTime::<Utc>::MIN_UTC);

        let recency_window = chrono::Duration::milliseconds(CACHE_RECENCY_WINDOW_MS);
        let mut stale = false;
        for root in &self.storage_roots {
            let tasks_dir = Path::new(root).join(TASKS_DIR_NAME);
            let Ok(entries) = self.storage.read_dir_entries(&tasks_dir).await else {
                continue;
            };
            for entry in entries.into_iter().filter(|e| e.is_dir) {
                let Ok(stat) = self.storage.stat(&entry.path).await else {
                    continue;
                };
                let Some(modified) = stat.modified else {
                    continue;
                };
                let Ok(elapsed) = modified.elapsed() else {
                    continue;
                };
                if elapsed > Duration::from_millis(CACHE_RECENCY_WINDOW_MS as u64) {
                    continue;
                }
                let mtime: DateTime<Utc> = modified.into();
                if mtime > newest_known_activity && Utc::now() - mtime <= recency_window {
                    stale = true;
                    break;
                }
            }
            if stale {
                break;
            }
        }

        if stale {
            self.rebuild(false, workspace).await?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convocore_domain::entities::ParentResolutionMethod;
    use convocore_providers::cache::InMemorySkeletonStore;
    use convocore_providers::fs::InMemoryStorageIo;

    async fn cache_with(storage: Arc<InMemoryStorageIo>) -> SkeletonCache {
        SkeletonCache::new(
            Arc::new(InMemorySkeletonStore::new()),
            storage,
            PathBuf::from("/manifest.json"),
            vec!["/root".to_owned()],
        )
    }

    #[tokio::test]
    async fn rebuild_scans_and_parses_every_task_directory() {
        let storage = Arc::new(InMemoryStorageIo::new());
        storage
            .write_file(
                "/root/tasks/task-1/api_conversation_history.json",
                r#"[{"role":"user","content":"one","ts":100}]"#,
            )
            .await;
        storage
            .write_file(
                "/root/tasks/task-2/api_conversation_history.json",
                r#"[{"role":"user","content":"two","ts":200}]"#,
            )
            .await;
        let cache = cache_with(storage).await;

        let stats = cache.rebuild(false, None).await.unwrap();
        assert_eq!(stats.scanned, 2);
        assert_eq!(stats.parsed, 2);
        assert_eq!(cache.get_all().await.len(), 2);
    }

    #[tokio::test]
    async fn rebuild_is_differential_on_unchanged_mtimes() {
        let storage = Arc::new(InMemoryStorageIo::new());
        storage
            .write_file(
                "/root/tasks/task-1/api_conversation_history.json",
                r#"[{"role":"user","content":"one","ts":100}]"#,
            )
            .await;
        let cache = cache_with(storage).await;

        cache.rebuild(false, None).await.unwrap();
        let second = cache.rebuild(false, None).await.unwrap();
        assert_eq!(second.scanned, 1);
        assert_eq!(second.parsed, 0, "unchanged mtime should be skipped on a non-forced rebuild");
    }

    #[tokio::test]
    async fn forced_rebuild_reparses_everything() {
        let storage = Arc::new(InMemoryStorageIo::new());
        storage
            .write_file(
                "/root/tasks/task-1/api_conversation_history.json",
                r#"[{"role":"user","content":"one","ts":100}]"#,
            )
            .await;
        let cache = cache_with(storage).await;

        cache.rebuild(false, None).await.unwrap();
        let forced = cache.rebuild(true, None).await.unwrap();
        assert_eq!(forced.parsed, 1);
        assert!(forced.forced);
    }

    #[tokio::test]
    async fn ensure_fresh_rebuilds_once_then_reports_no_further_work() {
        let storage = Arc::new(InMemoryStorageIo::new());
        storage
            .write_file(
                "/root/tasks/task-1/api_conversation_history.json",
                r#"[{"role":"user","content":"one","ts":100}]"#,
            )
            .await;
        let cache = cache_with(storage).await;

        assert!(cache.ensure_fresh(None).await.unwrap(), "first call sees an empty store");
        assert!(!cache.ensure_fresh(None).await.unwrap(), "nothing changed on disk since");
    }

    #[tokio::test]
    async fn persisted_manifest_survives_a_reload() {
        let storage = Arc::new(InMemoryStorageIo::new());
        storage
            .write_file(
                "/root/tasks/task-1/api_conversation_history.json",
                r#"[{"role":"user","content":"persisted","ts":100}]"#,
            )
            .await;
        let cache = cache_with(Arc::clone(&storage)).await;
        cache.rebuild(false, None).await.unwrap();
        assert!(storage.exists(Path::new("/manifest.json")).await);

        let reloaded = cache_with(storage).await;
        reloaded.load_manifest().await;
        assert_eq!(reloaded.get_all().await.len(), 1);
    }

    #[tokio::test]
    async fn merge_keeps_the_more_recently_active_duplicate() {
        let storage = Arc::new(InMemoryStorageIo::new());
        let cache = cache_with(storage).await;
        let task_id = TaskId::from_name("dup");

        let older = sample_skeleton(task_id.clone(), 100);
        let newer = sample_skeleton(task_id.clone(), 200);

        cache.merge(newer.clone()).await;
        cache.merge(older).await;

        let stored = cache.get_by_id(&task_id).await.unwrap();
        assert_eq!(stored.last_activity, newer.last_activity);
    }

    fn sample_skeleton(task_id: TaskId, last_activity_ms: i64) -> ConversationSkeleton {
        let timestamp = DateTime::from_timestamp_millis(last_activity_ms).unwrap();
        ConversationSkeleton {
            task_id,
            parent_task_id: None,
            reconstructed_parent_id: None,
            parent_confidence_score: None,
            parent_resolution_method: ParentResolutionMethod::Unresolved,
            workspace: None,
            created_at: timestamp,
            last_activity: timestamp,
            message_count: 1,
            total_size: 0,
            modes: Default::default(),
            summary: String::new(),
            file_path: "/root/tasks/dup".to_owned(),
            truncated_instruction: "dup".to_owned(),
            child_task_instruction_prefixes: Vec::new(),
            data_source: String::new(),
            content_hash: "h".to_owned(),
        }
    }
}
