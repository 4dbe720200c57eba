//! Vector store provider port.
//!
//! A single trait covering collection lifecycle, upsert/search, and the
//! read-side operations the semantic search use case needs. Consolidated
//! into one trait and one set of collection/search value objects, since
//! this crate has exactly two vector-store consumers (the vector indexer
//! and the search use case) rather than a mix of code search, a browse UI,
//! and an admin dashboard each wanting a slightly different surface.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::value_objects::CollectionId;

/// Arbitrary per-vector payload (the chunk's `taskId`, `chunkIndex`, and any
/// filterable fields such as `workspace`).
pub type MetadataMap = HashMap<String, Value>;

/// One vector ready for insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreEmbedding {
    /// Stable id for this vector within its collection (e.g. `{taskId}:{chunkIndex}`).
    pub id: String,
    /// The embedding itself.
    pub vector: Vec<f32>,
}

/// One hit returned by a similarity search or a by-id lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSearchResult {
    /// Id of the matching vector.
    pub id: String,
    /// Similarity score (provider-defined scale, higher is more similar).
    pub score: f32,
    /// The payload stored alongside the vector.
    pub metadata: MetadataMap,
}

/// Summary of a single collection, for listing/diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInfo {
    /// Collection identifier.
    pub id: CollectionId,
    /// Number of vectors currently stored.
    pub vector_count: u64,
    /// Embedding dimensionality configured for the collection.
    pub dimensions: usize,
}

/// Vector store provider port.
///
/// Implementations talk to a concrete backend (Qdrant, an in-memory map for
/// tests). `Error::VectorDb` wraps any backend-specific failure before it
/// crosses this boundary.
#[async_trait]
pub trait VectorStoreProvider: Send + Sync {
    /// Creates a collection with the given embedding dimensionality. A
    /// no-op if the collection already exists with matching dimensions.
    async fn create_collection(&self, collection: &CollectionId, dimensions: usize) -> Result<()>;

    /// Deletes a collection and everything in it.
    async fn delete_collection(&self, collection: &CollectionId) -> Result<()>;

    /// Whether `collection` currently exists.
    async fn collection_exists(&self, collection: &CollectionId) -> Result<bool>;

    /// Upserts vectors with their metadata, returning the ids assigned.
    async fn upsert(
        &self,
        collection: &CollectionId,
        vectors: &[StoreEmbedding],
        metadata: Vec<MetadataMap>,
    ) -> Result<Vec<String>>;

    /// k-NN search with an optional backend-native filter expression
    /// (e.g. a workspace equality filter).
    async fn search_similar(
        &self,
        collection: &CollectionId,
        query_vector: &[f32],
        limit: usize,
        filter: Option<&str>,
    ) -> Result<Vec<StoreSearchResult>>;

    /// Deletes vectors by id.
    async fn delete_vectors(&self, collection: &CollectionId, ids: &[String]) -> Result<()>;

    /// Fetches specific vectors by id (used to list a task's existing
    /// chunks before a reindex).
    async fn get_by_ids(
        &self,
        collection: &CollectionId,
        ids: &[String],
    ) -> Result<Vec<StoreSearchResult>>;

    /// Lists all collections known to the backend.
    async fn list_collections(&self) -> Result<Vec<CollectionInfo>>;

    /// Flushes any buffered writes, for backends that batch.
    async fn flush(&self, collection: &CollectionId) -> Result<()>;

    /// Stable name of the backend (`"qdrant"`, `"memory"`, ...), for logging.
    fn provider_name(&self) -> &str;

    /// Cheap liveness probe used by the server's health endpoint. Default
    /// implementation checks for the existence of a sentinel collection.
    async fn health_check(&self) -> Result<()> {
        let sentinel = CollectionId::from_name("__health_check__");
        self.collection_exists(&sentinel).await?;
        Ok(())
    }
}
