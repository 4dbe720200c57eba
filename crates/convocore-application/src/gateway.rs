//! Unified Tool Gateway (component H).
//!
//! The single entry point every JSON-RPC tool call passes through.
//! Selects one of three processing strategies, dispatches to the matching
//! use case, and shapes the result into `{ok: true, data}` or
//! `{ok: false, error: {code, message, details?}}`. No handler may panic
//! the gateway: every dispatch is wrapped in [`futures::FutureExt::catch_unwind`].

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use convocore_domain::entities::ConversationSkeleton;
use convocore_domain::error::{Error, Result};
use convocore_domain::events::{DomainEvent, SharedEventPublisher};
use convocore_domain::ports::MetricsProvider;
use convocore_domain::value_objects::{CollectionId, TaskId};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::conversation_parser::ConversationParser;
use crate::hierarchy_engine::HierarchyEngine;
use crate::indexing_decision_service::{IndexingDecision, IndexingDecisionService};
use crate::semantic_search::SemanticSearch;
use crate::skeleton_cache::SkeletonCache;
use crate::storage_locator::StorageLocator;
use crate::vector_indexer::VectorIndexer;

/// A `{code, message, details?}` failure, matching the stable taxonomy in
/// [`convocore_domain::error::Error::code`].
#[derive(Debug, Clone, Serialize)]
pub struct ToolError {
    /// Stable error code (`parse_error`, `vector_store_error`, ...).
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Optional structured detail payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for ToolError {
    fn from(error: &Error) -> Self {
        Self {
            code: error.code().to_owned(),
            message: error.to_string(),
            details: None,
        }
    }
}

/// The envelope every tool call returns. `warnings` is non-empty only for
/// tools that allow partial success (`list_conversations`).
#[derive(Debug, Clone, Serialize)]
pub struct ToolResult<T> {
    /// Whether the call succeeded.
    pub ok: bool,
    /// Payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Failure detail, present iff `ok` is `false`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
    /// Non-fatal issues encountered while still producing `data`.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub warnings: Vec<String>,
}

impl<T> ToolResult<T> {
    fn ok(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
            warnings: Vec::new(),
        }
    }

    fn ok_with_warnings(data: T, warnings: Vec<String>) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
            warnings,
        }
    }

    fn err(error: &Error) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error.into()),
            warnings: Vec::new(),
        }
    }
}

fn parse_task_id(raw: &str) -> Result<TaskId> {
    raw.parse::<TaskId>()
        .map_err(|_| Error::invalid_argument(format!("'{raw}' is not a valid taskId")))
}

/// `list_conversations` request filters and pagination.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListConversationsRequest {
    /// Restrict to conversations in this workspace.
    pub workspace: Option<String>,
    /// Maximum number of results, default 50.
    pub limit: Option<usize>,
    /// Offset into the (most-recently-active-first) result set.
    pub offset: Option<usize>,
}

/// One row of [`ListConversationsResponse`].
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub task_id: TaskId,
    pub workspace: Option<String>,
    pub created_at: chrono::DateTime<Utc>,
    pub last_activity: chrono::DateTime<Utc>,
    pub message_count: u64,
    pub summary: String,
}

impl From<&ConversationSkeleton> for ConversationSummary {
    fn from(s: &ConversationSkeleton) -> Self {
        Self {
            task_id: s.task_id,
            workspace: s.workspace.clone(),
            created_at: s.created_at,
            last_activity: s.last_activity,
            message_count: s.message_count,
            summary: s.summary.clone(),
        }
    }
}

/// `list_conversations` response.
#[derive(Debug, Clone, Serialize)]
pub struct ListConversationsResponse {
    pub conversations: Vec<ConversationSummary>,
    pub total: usize,
}

/// `get_task_tree` request.
#[derive(Debug, Clone, Deserialize)]
pub struct GetTaskTreeRequest {
    pub task_id: String,
}

/// One node of the hierarchy rooted at the requested task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskTreeNode {
    pub task_id: TaskId,
    pub summary: String,
    pub parent_resolution_method: String,
    pub children: Vec<TaskTreeNode>,
}

/// `view_task_details` request.
#[derive(Debug, Clone, Deserialize)]
pub struct ViewTaskDetailsRequest {
    pub task_id: String,
}

/// `rebuild_skeleton_cache` request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RebuildSkeletonCacheRequest {
    /// Bypass the differential mtime check and rebuild every task directory.
    pub force: Option<bool>,
    /// Restrict the rebuild to task directories under this workspace.
    pub workspace: Option<String>,
}

/// `rebuild_skeleton_cache` / `index_task_semantic` response: a deferred
/// operation has been scheduled, not yet completed.
#[derive(Debug, Clone, Serialize)]
pub struct DeferredAck {
    pub accepted: bool,
    pub operation_id: String,
}

/// `search_tasks_semantic` request.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchTasksSemanticRequest {
    pub query: String,
    pub limit: Option<usize>,
    pub workspace: Option<String>,
}

/// One hit in [`SearchTasksSemanticResponse`].
#[derive(Debug, Clone, Serialize)]
pub struct SearchHitDto {
    pub task_id: TaskId,
    pub score: f32,
    pub snippet: String,
}

/// `search_tasks_semantic` response.
#[derive(Debug, Clone, Serialize)]
pub struct SearchTasksSemanticResponse {
    pub hits: Vec<SearchHitDto>,
}

/// `index_task_semantic` request.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexTaskSemanticRequest {
    pub task_id: String,
}

/// Dispatches every JSON-RPC tool call to the application layer, applying
/// the immediate/hybrid/deferred processing strategy named for each tool.
pub struct ToolGateway {
    cache: Arc<SkeletonCache>,
    hierarchy_engine: HierarchyEngine,
    decision_service: Arc<IndexingDecisionService>,
    indexer: Arc<VectorIndexer>,
    search: Arc<SemanticSearch>,
    locator: StorageLocator,
    parser: ConversationParser,
    collection: CollectionId,
    metrics: Option<Arc<dyn MetricsProvider>>,
    events: Option<SharedEventPublisher>,
}

impl ToolGateway {
    /// Builds a gateway over the already-constructed application services.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cache: Arc<SkeletonCache>,
        hierarchy_engine: HierarchyEngine,
        decision_service: Arc<IndexingDecisionService>,
        indexer: Arc<VectorIndexer>,
        search: Arc<SemanticSearch>,
        locator: StorageLocator,
        parser: ConversationParser,
        collection: CollectionId,
        metrics: Option<Arc<dyn MetricsProvider>>,
        events: Option<SharedEventPublisher>,
    ) -> Self {
        Self {
            cache,
            hierarchy_engine,
            decision_service,
            indexer,
            search,
            locator,
            parser,
            collection,
            metrics,
            events,
        }
    }

    async fn dispatch<T, F>(&self, operation: &str, fut: F) -> ToolResult<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let outcome = AssertUnwindSafe(fut).catch_unwind().await;
        let result = match outcome {
            Ok(result) => result,
            Err(_) => {
                error!(operation, "tool handler panicked, converting to invariant_violation");
                Err(Error::invariant(format!("{operation} panicked")))
            }
        };

        if let Some(metrics) = &self.metrics {
            let labels = convocore_domain::ports::MetricLabels::from([("operation".to_owned(), operation.to_owned())]);
            let _ = metrics
                .histogram("convocore_gateway_call_duration_seconds", started.elapsed().as_secs_f64(), &labels)
                .await;
            if result.is_err() {
                let _ = metrics.increment("convocore_gateway_errors_total", &labels).await;
            }
        }

        match result {
            Ok(data) => {
                info!(operation, duration_ms = started.elapsed().as_millis() as u64, "tool call succeeded");
                ToolResult::ok(data)
            }
            Err(error) => {
                error!(operation, %error, "tool call failed");
                ToolResult::err(&error)
            }
        }
    }

    /// `detect_storage` — immediate.
    pub async fn detect_storage(&self) -> ToolResult<Vec<convocore_domain::entities::StorageLocation>> {
        self.dispatch("detect_storage", async { Ok(self.locator.detect_storage_locations().await) })
            .await
    }

    /// `get_storage_stats` — immediate.
    pub async fn get_storage_stats(&self) -> ToolResult<convocore_domain::entities::StorageStats> {
        self.dispatch("get_storage_stats", async {
            let mut stats = self.locator.get_storage_stats().await;
            stats.degraded_skeleton_count = self
                .cache
                .get_all()
                .await
                .iter()
                .filter(|s| s.data_source == "degraded")
                .count();
            Ok(stats)
        })
        .await
    }

    /// `list_conversations` — hybrid: `ensureFresh` then a filtered,
    /// paginated read.
    pub async fn list_conversations(&self, request: ListConversationsRequest) -> ToolResult<ListConversationsResponse> {
        self.dispatch("list_conversations", async {
            self.cache.ensure_fresh(request.workspace.as_deref()).await?;
            let mut all = self.cache.get_all().await;
            if let Some(workspace) = &request.workspace {
                all.retain(|s| s.workspace.as_deref() == Some(workspace.as_str()));
            }
            all.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
            let total = all.len();
            let offset = request.offset.unwrap_or(0);
            let limit = request.limit.unwrap_or(50);
            let conversations = all
                .iter()
                .skip(offset)
                .take(limit)
                .map(ConversationSummary::from)
                .collect();
            Ok(ListConversationsResponse { conversations, total })
        })
        .await
    }

    /// `get_task_tree` — hybrid: `ensureFresh`, then a hierarchy traversal
    /// rooted at the requested task.
    pub async fn get_task_tree(&self, request: GetTaskTreeRequest) -> ToolResult<TaskTreeNode> {
        self.dispatch("get_task_tree", async {
            self.cache.ensure_fresh(None).await?;
            self.hierarchy_engine.reconstruct(&self.cache).await?;
            let root_id = parse_task_id(&request.task_id)?;
            let all = self.cache.get_all().await;
            let Some(root) = all.iter().find(|s| s.task_id == root_id) else {
                return Err(Error::cache_miss(root_id.to_string()));
            };
            Ok(build_tree(root, &all))
        })
        .await
    }

    /// `view_task_details` — hybrid: `ensureFresh` then a direct lookup.
    pub async fn view_task_details(&self, request: ViewTaskDetailsRequest) -> ToolResult<ConversationSkeleton> {
        self.dispatch("view_task_details", async {
            self.cache.ensure_fresh(None).await?;
            let task_id = parse_task_id(&request.task_id)?;
            self.cache
                .get_by_id(&task_id)
                .await
                .ok_or_else(|| Error::cache_miss(task_id.to_string()))
        })
        .await
    }

    /// `rebuild_skeleton_cache` — deferred: scheduled onto the background
    /// runtime, returns an acknowledgment immediately.
    pub async fn rebuild_skeleton_cache(&self, request: RebuildSkeletonCacheRequest) -> ToolResult<DeferredAck> {
        self.dispatch("rebuild_skeleton_cache", async {
            let operation_id = Uuid::new_v4().to_string();
            let cache = Arc::clone(&self.cache);
            let force = request.force.unwrap_or(false);
            let workspace = request.workspace.clone();
            tokio::spawn(async move {
                if let Err(error) = cache.rebuild(force, workspace.as_deref()).await {
                    error!(%error, "deferred skeleton cache rebuild failed");
                }
            });
            Ok(DeferredAck {
                accepted: true,
                operation_id,
            })
        })
        .await
    }

    /// `search_tasks_semantic` — hybrid: `ensureFresh` then a k-NN query.
    pub async fn search_tasks_semantic(&self, request: SearchTasksSemanticRequest) -> ToolResult<SearchTasksSemanticResponse> {
        self.dispatch("search_tasks_semantic", async {
            self.cache.ensure_fresh(request.workspace.as_deref()).await?;
            let limit = request.limit.unwrap_or(10);
            let started = Instant::now();
            let outcome = self
                .search
                .search(&request.query, limit, &self.collection, request.workspace.as_deref())
                .await?;
            let hits: Vec<SearchHitDto> = outcome
                .hits
                .into_iter()
                .map(|h| SearchHitDto {
                    task_id: h.task_id,
                    score: h.score,
                    snippet: h.snippet,
                })
                .collect();
            if let Some(events) = &self.events {
                let _ = events
                    .publish(DomainEvent::SearchExecuted {
                        query: request.query.clone(),
                        collection: self.collection.to_string(),
                        results: hits.len(),
                        duration_ms: started.elapsed().as_millis() as u64,
                    })
                    .await;
            }
            Ok(SearchTasksSemanticResponse { hits })
        })
        .await
    }

    /// `index_task_semantic` — deferred: scheduled onto the background
    /// runtime, returns an acknowledgment immediately.
    pub async fn index_task_semantic(&self, request: IndexTaskSemanticRequest) -> ToolResult<DeferredAck> {
        self.dispatch("index_task_semantic", async {
            let task_id = parse_task_id(&request.task_id)?;
            let skeleton = self
                .cache
                .get_by_id(&task_id)
                .await
                .ok_or_else(|| Error::cache_miss(task_id.to_string()))?;

            let operation_id = Uuid::new_v4().to_string();
            let indexer = Arc::clone(&self.indexer);
            let decision_service = Arc::clone(&self.decision_service);
            let parser = self.parser.clone();
            let collection = self.collection.clone();
            tokio::spawn(async move {
                let message_texts = parser.load_message_texts(std::path::Path::new(&skeleton.file_path)).await;
                match indexer.index_task(&skeleton, &message_texts, &collection).await {
                    Ok(_) => {
                        if let Err(error) = decision_service
                            .mark_indexed(&skeleton.task_id, &skeleton.content_hash, Utc::now())
                            .await
                        {
                            error!(task_id = %skeleton.task_id, %error, "failed to record successful explicit reindex");
                        }
                    }
                    Err(error) => {
                        error!(task_id = %skeleton.task_id, %error, "explicit reindex failed");
                        let _ = decision_service.record_failed_attempt(&skeleton.task_id).await;
                    }
                }
            });
            Ok(DeferredAck {
                accepted: true,
                operation_id,
            })
        })
        .await
    }
}

fn build_tree(root: &ConversationSkeleton, all: &[ConversationSkeleton]) -> TaskTreeNode {
    let children = all
        .iter()
        .filter(|s| s.effective_parent() == Some(&root.task_id))
        .map(|child| build_tree(child, all))
        .collect();
    TaskTreeNode {
        task_id: root.task_id,
        summary: root.summary.clone(),
        parent_resolution_method: format!("{:?}", root.parent_resolution_method),
        children,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convocore_providers::cache::InMemorySkeletonStore;
    use convocore_providers::embedding::DeterministicEmbeddingProvider;
    use convocore_providers::fs::InMemoryStorageIo;
    use convocore_providers::indexing_sidecar::InMemoryIndexingSidecar;
    use convocore_providers::vector_store::InMemoryVectorStore;
    use std::path::PathBuf;

    async fn gateway(storage: Arc<InMemoryStorageIo>) -> ToolGateway {
        let cache = Arc::new(SkeletonCache::new(
            Arc::new(InMemorySkeletonStore::new()),
            storage.clone(),
            PathBuf::from("/manifest.json"),
            vec!["/root".to_owned()],
        ));
        let embedding = Arc::new(DeterministicEmbeddingProvider::new(8));
        let vector_store = Arc::new(InMemoryVectorStore::new());
        let search = Arc::new(SemanticSearch::new(embedding.clone(), vector_store.clone(), Arc::clone(&cache), None));
        let indexer = Arc::new(VectorIndexer::new(
            embedding,
            vector_store,
            None,
            crate::vector_indexer::VectorIndexerConfig::default(),
        ));
        let decision_service = Arc::new(IndexingDecisionService::new(
            Arc::new(InMemoryIndexingSidecar::new()),
            crate::indexing_decision_service::IndexingDecisionConfig::default(),
        ));
        let locator = StorageLocator::new(storage.clone(), vec!["/root".to_owned()]);
        let parser = ConversationParser::new(storage);
        ToolGateway::new(
            cache,
            HierarchyEngine::new(crate::hierarchy_engine::HierarchyEngineConfig::default()),
            decision_service,
            indexer,
            search,
            locator,
            parser,
            CollectionId::from_name("test"),
            None,
            None,
        )
    }

    #[tokio::test]
    async fn detect_storage_reports_each_candidate() {
        let storage = Arc::new(InMemoryStorageIo::new());
        let gw = gateway(storage).await;
        let result = gw.detect_storage().await;
        assert!(result.ok);
        assert_eq!(result.data.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn view_task_details_reports_cache_miss() {
        let storage = Arc::new(InMemoryStorageIo::new());
        let gw = gateway(storage).await;
        let result = gw
            .view_task_details(ViewTaskDetailsRequest {
                task_id: TaskId::new().to_string(),
            })
            .await;
        assert!(!result.ok);
        assert_eq!(result.error.unwrap().code, "cache_miss");
    }

    #[tokio::test]
    async fn list_conversations_discovers_and_paginates() {
        let storage = Arc::new(InMemoryStorageIo::new());
        storage
            .write_file(
                "/root/tasks/task-1/api_conversation_history.json",
                r#"[{"role":"user","content":"Summarize the release notes","ts":100}]"#,
            )
            .await;
        let gw = gateway(storage).await;
        let result = gw.list_conversations(ListConversationsRequest::default()).await;
        assert!(result.ok);
        let data = result.data.unwrap();
        assert_eq!(data.total, 1);
        assert_eq!(data.conversations.len(), 1);
    }

    #[tokio::test]
    async fn rebuild_skeleton_cache_is_acknowledged_immediately() {
        let storage = Arc::new(InMemoryStorageIo::new());
        let gw = gateway(storage).await;
        let result = gw
            .rebuild_skeleton_cache(RebuildSkeletonCacheRequest::default())
            .await;
        assert!(result.ok);
        assert!(result.data.unwrap().accepted);
    }
}
