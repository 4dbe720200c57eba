//! Vector Indexer (component F).
//!
//! For each `INDEX` decision from [`crate::indexing_decision_service`]:
//! chunks a task's messages on a fixed token budget with overlap, embeds
//! every chunk through an [`EmbeddingProvider`], and upserts the result into
//! a collection on the [`VectorStoreProvider`], keyed by `{taskId,
//! chunkIndex}`. Guarded by a per-service [`circuit_breaker::CircuitBreaker`]
//! and a bounded-concurrency semaphore.

mod circuit_breaker;

use std::sync::Arc;
use std::time::Instant;

use convocore_domain::constants::indexing::{
    DEFAULT_CHUNK_TOKEN_BUDGET, DEFAULT_CHUNK_TOKEN_OVERLAP, DEFAULT_CIRCUIT_BREAKER_BASE_BACKOFF_MS,
    DEFAULT_CIRCUIT_BREAKER_MAX_BACKOFF_MS, DEFAULT_CIRCUIT_BREAKER_THRESHOLD,
    DEFAULT_EMBEDDING_CONCURRENCY,
};
use convocore_domain::entities::ConversationSkeleton;
use convocore_domain::error::{Error, Result};
use convocore_domain::ports::{EmbeddingProvider, MetadataMap, MetricsProvider, StoreEmbedding, VectorStoreProvider};
use convocore_domain::value_objects::CollectionId;
use serde_json::json;
use tokio::sync::Semaphore;
use tracing::warn;

pub use circuit_breaker::CircuitBreaker;

/// Tuning knobs, overridable from `CoreConfig` at startup.
#[derive(Debug, Clone, Copy)]
pub struct VectorIndexerConfig {
    /// Target token budget per chunk.
    pub chunk_token_budget: usize,
    /// Token overlap between consecutive chunks.
    pub chunk_token_overlap: usize,
    /// Consecutive-failure threshold before the circuit breaker opens.
    pub circuit_breaker_threshold: u32,
    /// Initial circuit-breaker open-state backoff, in milliseconds.
    pub circuit_breaker_base_backoff_ms: u64,
    /// Ceiling on the doubling circuit-breaker backoff, in milliseconds.
    pub circuit_breaker_max_backoff_ms: u64,
    /// Maximum concurrent embedding requests in flight.
    pub embedding_concurrency: usize,
}

impl Default for VectorIndexerConfig {
    fn default() -> Self {
        Self {
            chunk_token_budget: DEFAULT_CHUNK_TOKEN_BUDGET,
            chunk_token_overlap: DEFAULT_CHUNK_TOKEN_OVERLAP,
            circuit_breaker_threshold: DEFAULT_CIRCUIT_BREAKER_THRESHOLD,
            circuit_breaker_base_backoff_ms: DEFAULT_CIRCUIT_BREAKER_BASE_BACKOFF_MS,
            circuit_breaker_max_backoff_ms: DEFAULT_CIRCUIT_BREAKER_MAX_BACKOFF_MS,
            embedding_concurrency: DEFAULT_EMBEDDING_CONCURRENCY,
        }
    }
}

/// Result of one successful [`VectorIndexer::index_task`] call.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexOutcome {
    /// Number of chunks upserted.
    pub chunks: usize,
}

/// Chunks, embeds, and upserts one task's content into the vector store.
pub struct VectorIndexer {
    embedding: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStoreProvider>,
    metrics: Option<Arc<dyn MetricsProvider>>,
    config: VectorIndexerConfig,
    circuit_breaker: CircuitBreaker,
    concurrency: Arc<Semaphore>,
}

impl VectorIndexer {
    /// Builds an indexer over the given embedding/vector-store ports.
    /// `metrics` is optional: a `None` simply skips latency/throughput
    /// recording, it never changes indexing behavior.
    #[must_use]
    pub fn new(
        embedding: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStoreProvider>,
        metrics: Option<Arc<dyn MetricsProvider>>,
        config: VectorIndexerConfig,
    ) -> Self {
        let circuit_breaker = CircuitBreaker::new(
            embedding.provider_name().to_owned(),
            config.circuit_breaker_threshold,
            config.circuit_breaker_base_backoff_ms,
            config.circuit_breaker_max_backoff_ms,
        );
        Self {
            embedding,
            vector_store,
            metrics,
            config,
            circuit_breaker,
            concurrency: Arc::new(Semaphore::new(config.embedding_concurrency)),
        }
    }

    /// Chunks `message_texts`, embeds, and upserts into `collection`.
    ///
    /// Callers (the scheduler, or `index_task_semantic`) are expected to
    /// have already consulted the indexing decision service; this method
    /// performs no idempotence check of its own.
    ///
    /// Backpressure: if more than the configured concurrency is already in
    /// flight, returns `Error::RateLimited` immediately rather than
    /// queueing — the caller should defer the task to the next scheduler
    /// tick instead of blocking.
    ///
    /// # Errors
    ///
    /// Returns `Error::CircuitOpen` if the embedding provider's breaker is
    /// open, `Error::RateLimited` if the concurrency limit is exceeded, or
    /// whatever the embedding/vector-store ports surface otherwise (the
    /// circuit breaker is tripped on any such failure).
    pub async fn index_task(
        &self,
        skeleton: &ConversationSkeleton,
        message_texts: &[String],
        collection: &CollectionId,
    ) -> Result<IndexOutcome> {
        self.circuit_breaker.before_call().await?;

        let Ok(_permit) = self.concurrency.clone().try_acquire_owned() else {
            return Err(Error::RateLimited {
                reason: "embedding concurrency limit reached, deferring to next scheduler tick".to_owned(),
            });
        };

        let started = Instant::now();
        let chunks = chunk_messages(message_texts, self.config.chunk_token_budget, self.config.chunk_token_overlap);
        if chunks.is_empty() {
            self.circuit_breaker.record_success().await;
            return Ok(IndexOutcome::default());
        }

        let result = self.index_chunks(skeleton, &chunks, collection).await;

        match &result {
            Ok(_) => self.circuit_breaker.record_success().await,
            Err(error) if !error.is_transient() => self.circuit_breaker.record_failure().await,
            Err(_) => {}
        }

        if result.is_ok()
            && let Some(metrics) = &self.metrics
        {
            let _ = metrics.record_index_time(started.elapsed(), &collection.as_str()).await;
            let _ = metrics.increment_indexed_tasks(&collection.as_str(), 1).await;
        }

        result
    }

    async fn index_chunks(
        &self,
        skeleton: &ConversationSkeleton,
        chunks: &[String],
        collection: &CollectionId,
    ) -> Result<IndexOutcome> {
        self.vector_store
            .create_collection(collection, self.embedding.dimensions())
            .await?;

        let vectors = self.embedding.embed_batch(chunks).await?;
        if vectors.len() != chunks.len() {
            warn!(
                expected = chunks.len(),
                got = vectors.len(),
                "embedding provider returned a mismatched batch size"
            );
        }

        let mut embeddings = Vec::with_capacity(vectors.len());
        let mut metadata = Vec::with_capacity(vectors.len());
        for (index, vector) in vectors.into_iter().enumerate() {
            embeddings.push(StoreEmbedding {
                id: format!("{}:{index}", skeleton.task_id),
                vector,
            });
            metadata.push(chunk_metadata(skeleton, index));
        }

        let upserted = self.vector_store.upsert(collection, &embeddings, metadata).await?;
        Ok(IndexOutcome { chunks: upserted.len() })
    }
}

fn chunk_metadata(skeleton: &ConversationSkeleton, chunk_index: usize) -> MetadataMap {
    let mut metadata = MetadataMap::new();
    metadata.insert("task_id".to_owned(), json!(skeleton.task_id.to_string()));
    metadata.insert("chunk_index".to_owned(), json!(chunk_index));
    if let Some(workspace) = &skeleton.workspace {
        metadata.insert("workspace".to_owned(), json!(workspace));
    }
    metadata
}

/// Splits `texts` into overlapping, whitespace-token-budgeted chunks.
/// Empty input yields no chunks.
fn chunk_messages(texts: &[String], token_budget: usize, overlap: usize) -> Vec<String> {
    let tokens: Vec<&str> = texts.iter().flat_map(|t| t.split_whitespace()).collect();
    if tokens.is_empty() {
        return Vec::new();
    }

    let step = token_budget.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < tokens.len() {
        let end = (start + token_budget).min(tokens.len());
        chunks.push(tokens[start..end].join(" "));
        if end == tokens.len() {
            break;
        }
        start += step;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use convocore_domain::entities::ParentResolutionMethod;
    use convocore_domain::value_objects::TaskId;
    use convocore_providers::embedding::DeterministicEmbeddingProvider;
    use convocore_providers::vector_store::InMemoryVectorStore;

    fn skeleton() -> ConversationSkeleton {
        let now = chrono::Utc::now();
        ConversationSkeleton {
            task_id: TaskId::new(),
            parent_task_id: None,
            reconstructed_parent_id: None,
            parent_confidence_score: None,
            parent_resolution_method: ParentResolutionMethod::Unresolved,
            workspace: Some("/repo".to_owned()),
            created_at: now,
            last_activity: now,
            message_count: 1,
            total_size: 0,
            modes: Default::default(),
            summary: String::new(),
            file_path: String::new(),
            truncated_instruction: String::new(),
            child_task_instruction_prefixes: Vec::new(),
            data_source: String::new(),
            content_hash: String::new(),
        }
    }

    #[test]
    fn chunking_splits_long_text_with_overlap() {
        let text = (0..100).map(|i| i.to_string()).collect::<Vec<_>>().join(" ");
        let chunks = chunk_messages(&[text], 40, 10);
        assert!(chunks.len() > 1);
        // The tail of one chunk should reappear at the head of the next.
        let first_tail: Vec<&str> = chunks[0].split_whitespace().rev().take(10).collect();
        let second_head: Vec<&str> = chunks[1].split_whitespace().take(10).collect();
        assert_eq!(
            first_tail.into_iter().rev().collect::<Vec<_>>(),
            second_head
        );
    }

    #[test]
    fn chunking_empty_input_yields_no_chunks() {
        assert!(chunk_messages(&[], 40, 10).is_empty());
    }

    #[tokio::test]
    async fn indexes_and_upserts_chunks() {
        let embedding = Arc::new(DeterministicEmbeddingProvider::new(8));
        let vector_store = Arc::new(InMemoryVectorStore::new());
        let indexer = VectorIndexer::new(embedding, vector_store, None, VectorIndexerConfig::default());

        let collection = CollectionId::from_name("test");
        let outcome = indexer
            .index_task(&skeleton(), &["hello world, this is a task".to_owned()], &collection)
            .await
            .unwrap();
        assert_eq!(outcome.chunks, 1);
    }

    #[tokio::test]
    async fn no_messages_indexes_zero_chunks() {
        let embedding = Arc::new(DeterministicEmbeddingProvider::new(8));
        let vector_store = Arc::new(InMemoryVectorStore::new());
        let indexer = VectorIndexer::new(embedding, vector_store, None, VectorIndexerConfig::default());

        let collection = CollectionId::from_name("test");
        let outcome = indexer.index_task(&skeleton(), &[], &collection).await.unwrap();
        assert_eq!(outcome.chunks, 0);
    }
}
