//! Semantic Search (component I).
//!
//! Embeds a query through the same embedding provider used by the vector
//! indexer, issues a k-NN search against the vector store, and joins each
//! hit's `taskId` against the skeleton cache to produce human-readable
//! results. Hits whose `taskId` is no longer in the cache are dropped and
//! counted rather than surfaced.

use std::sync::Arc;
use std::time::Instant;

use convocore_domain::error::Result;
use convocore_domain::ports::{EmbeddingProvider, MetricsProvider, VectorStoreProvider};
use convocore_domain::value_objects::{CollectionId, TaskId};
use tracing::warn;

use crate::skeleton_cache::SkeletonCache;

/// One ranked search hit joined with its skeleton's human-readable fields.
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// The matching task.
    pub task_id: TaskId,
    /// Similarity score, provider-defined scale (higher is more similar).
    pub score: f32,
    /// A short excerpt, currently the skeleton's summary.
    pub snippet: String,
}

/// Outcome of a [`SemanticSearch::search`] call, including how many raw
/// vector-store hits were dropped for lacking a cached skeleton.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    /// Ranked, cache-joined hits.
    pub hits: Vec<SearchHit>,
    /// Vector-store hits whose `taskId` had no corresponding skeleton.
    pub dropped_unknown_task_ids: usize,
}

/// Embeds, searches, and joins against the skeleton cache.
pub struct SemanticSearch {
    embedding: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStoreProvider>,
    cache: Arc<SkeletonCache>,
    metrics: Option<Arc<dyn MetricsProvider>>,
}

impl SemanticSearch {
    /// Builds a search use case over the given embedding/vector-store ports
    /// and the shared skeleton cache. `metrics` is optional.
    #[must_use]
    pub fn new(
        embedding: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStoreProvider>,
        cache: Arc<SkeletonCache>,
        metrics: Option<Arc<dyn MetricsProvider>>,
    ) -> Self {
        Self {
            embedding,
            vector_store,
            cache,
            metrics,
        }
    }

    /// Embeds `query_text`, runs a k-NN search over `collection` restricted
    /// to `limit` results, and joins hits against the cache. `workspace`, if
    /// given, is passed through as a backend-native equality filter.
    ///
    /// # Errors
    ///
    /// Surfaces whatever the embedding or vector-store ports return
    /// (`Error::Embedding`, `Error::VectorDb`, `Error::CircuitOpen`, ...).
    pub async fn search(
        &self,
        query_text: &str,
        limit: usize,
        collection: &CollectionId,
        workspace: Option<&str>,
    ) -> Result<SearchOutcome> {
        let started = Instant::now();
        let filter = workspace.map(|ws| format!("workspace={ws}"));
        let query_vector = self.embedding.embed_one(query_text).await?;
        let raw_hits = self
            .vector_store
            .search_similar(collection, &query_vector, limit, filter.as_deref())
            .await?;

        let mut hits = Vec::with_capacity(raw_hits.len());
        let mut dropped_unknown_task_ids = 0;
        for hit in raw_hits {
            let Some(task_id_str) = hit.id.split(':').next() else {
                dropped_unknown_task_ids += 1;
                continue;
            };
            let Ok(task_id) = task_id_str.parse::<TaskId>() else {
                dropped_unknown_task_ids += 1;
                continue;
            };
            let Some(skeleton) = self.cache.get_by_id(&task_id).await else {
                warn!(task_id = %task_id, "search hit references an unknown taskId, dropping");
                dropped_unknown_task_ids += 1;
                continue;
            };
            hits.push(SearchHit {
                task_id,
                score: hit.score,
                snippet: skeleton.summary,
            });
        }

        if let Some(metrics) = &self.metrics {
            let _ = metrics
                .record_search_latency(started.elapsed(), &collection.as_str())
                .await;
            let _ = metrics.increment_search_requests(&collection.as_str()).await;
        }

        Ok(SearchOutcome {
            hits,
            dropped_unknown_task_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use convocore_domain::entities::{ConversationSkeleton, ParentResolutionMethod};
    use convocore_domain::ports::{MetadataMap, StoreEmbedding};
    use convocore_providers::cache::InMemorySkeletonStore;
    use convocore_providers::embedding::DeterministicEmbeddingProvider;
    use convocore_providers::fs::InMemoryStorageIo;
    use convocore_providers::vector_store::InMemoryVectorStore;
    use std::path::PathBuf;

    async fn seeded_search() -> (SemanticSearch, TaskId, CollectionId) {
        let embedding = Arc::new(DeterministicEmbeddingProvider::new(8));
        let vector_store = Arc::new(InMemoryVectorStore::new());
        let collection = CollectionId::from_name("test");
        vector_store.create_collection(&collection, 8).await.unwrap();

        let task_id = TaskId::new();
        let vector = embedding.embed_one("fix the authentication bug").await.unwrap();
        vector_store
            .upsert(
                &collection,
                &[StoreEmbedding {
                    id: format!("{task_id}:0"),
                    vector,
                }],
                vec![MetadataMap::new()],
            )
            .await
            .unwrap();

        let store = Arc::new(InMemorySkeletonStore::new());
        let now = Utc::now();
        store
            .insert(ConversationSkeleton {
                task_id,
                parent_task_id: None,
                reconstructed_parent_id: None,
                parent_confidence_score: None,
                parent_resolution_method: ParentResolutionMethod::Unresolved,
                workspace: None,
                created_at: now,
                last_activity: now,
                message_count: 1,
                total_size: 0,
                modes: Default::default(),
                summary: "Fix the authentication bug".to_owned(),
                file_path: String::new(),
                truncated_instruction: String::new(),
                child_task_instruction_prefixes: Vec::new(),
                data_source: String::new(),
                content_hash: String::new(),
            })
            .await;

        let cache = Arc::new(SkeletonCache::new(
            store,
            Arc::new(InMemoryStorageIo::new()),
            PathBuf::from("/manifest.json"),
            Vec::new(),
        ));

        (
            SemanticSearch::new(embedding, vector_store, cache, None),
            task_id,
            collection,
        )
    }

    #[tokio::test]
    async fn search_joins_hit_with_cached_skeleton() {
        let (search, task_id, collection) = seeded_search().await;
        let outcome = search
            .search("authentication bug", 5, &collection, None)
            .await
            .unwrap();
        assert_eq!(outcome.dropped_unknown_task_ids, 0);
        assert_eq!(outcome.hits.len(), 1);
        assert_eq!(outcome.hits[0].task_id, task_id);
        assert_eq!(outcome.hits[0].snippet, "Fix the authentication bug");
    }

    #[tokio::test]
    async fn search_drops_hits_for_unknown_task_ids() {
        let embedding = Arc::new(DeterministicEmbeddingProvider::new(8));
        let vector_store = Arc::new(InMemoryVectorStore::new());
        let collection = CollectionId::from_name("test");
        vector_store.create_collection(&collection, 8).await.unwrap();
        let vector = embedding.embed_one("orphaned chunk").await.unwrap();
        vector_store
            .upsert(
                &collection,
                &[StoreEmbedding {
                    id: format!("{}:0", TaskId::new()),
                    vector,
                }],
                vec![MetadataMap::new()],
            )
            .await
            .unwrap();

        let cache = Arc::new(SkeletonCache::new(
            Arc::new(InMemorySkeletonStore::new()),
            Arc::new(InMemoryStorageIo::new()),
            PathBuf::from("/manifest.json"),
            Vec::new(),
        ));
        let search = SemanticSearch::new(embedding, vector_store, cache, None);
        let outcome = search.search("orphaned chunk", 5, &collection, None).await.unwrap();
        assert_eq!(outcome.hits.len(), 0);
        assert_eq!(outcome.dropped_unknown_task_ids, 1);
    }
}
