//! In-memory vector store, the default backend.
//!
//! Holds vectors in a plain `HashMap` per collection and searches by brute
//! force (linear cosine similarity scan). Fine at the scale this core
//! operates at (per-task chunk counts, not a corpus-wide code index); a
//! real deployment swaps in [`super::QdrantVectorStore`] via
//! `VECTOR_STORE_URL`.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use convocore_domain::error::Result;
use convocore_domain::ports::{CollectionInfo, MetadataMap, StoreEmbedding, StoreSearchResult, VectorStoreProvider};
use convocore_domain::value_objects::CollectionId;

struct StoredVector {
    vector: Vec<f32>,
    metadata: MetadataMap,
}

struct Collection {
    dimensions: usize,
    vectors: HashMap<String, StoredVector>,
}

/// In-memory vector store.
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: Mutex<HashMap<CollectionId, Collection>>,
}

impl InMemoryVectorStore {
    /// Builds an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorStoreProvider for InMemoryVectorStore {
    async fn create_collection(&self, collection: &CollectionId, dimensions: usize) -> Result<()> {
        self.collections
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(*collection)
            .or_insert_with(|| Collection {
                dimensions,
                vectors: HashMap::new(),
            });
        Ok(())
    }

    async fn delete_collection(&self, collection: &CollectionId) -> Result<()> {
        self.collections
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(collection);
        Ok(())
    }

    async fn collection_exists(&self, collection: &CollectionId) -> Result<bool> {
        Ok(self
            .collections
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(collection))
    }

    async fn upsert(
        &self,
        collection: &CollectionId,
        vectors: &[StoreEmbedding],
        metadata: Vec<MetadataMap>,
    ) -> Result<Vec<String>> {
        let mut collections = self.collections.lock().unwrap_or_else(|e| e.into_inner());
        let entry = collections.entry(*collection).or_insert_with(|| Collection {
            dimensions: vectors.first().map_or(0, |v| v.vector.len()),
            vectors: HashMap::new(),
        });

        let mut ids = Vec::with_capacity(vectors.len());
        for (embedding, meta) in vectors.iter().zip(metadata.into_iter().chain(std::iter::repeat(MetadataMap::new()))) {
            entry.vectors.insert(
                embedding.id.clone(),
                StoredVector {
                    vector: embedding.vector.clone(),
                    metadata: meta,
                },
            );
            ids.push(embedding.id.clone());
        }
        Ok(ids)
    }

    async fn search_similar(
        &self,
        collection: &CollectionId,
        query_vector: &[f32],
        limit: usize,
        filter: Option<&str>,
    ) -> Result<Vec<StoreSearchResult>> {
        let collections = self.collections.lock().unwrap_or_else(|e| e.into_inner());
        let Some(collection) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<StoreSearchResult> = collection
            .vectors
            .iter()
            .filter(|(_, stored)| matches_filter(&stored.metadata, filter))
            .map(|(id, stored)| StoreSearchResult {
                id: id.clone(),
                score: cosine_similarity(query_vector, &stored.vector),
                metadata: stored.metadata.clone(),
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn delete_vectors(&self, collection: &CollectionId, ids: &[String]) -> Result<()> {
        if let Some(collection) = self
            .collections
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(collection)
        {
            for id in ids {
                collection.vectors.remove(id);
            }
        }
        Ok(())
    }

    async fn get_by_ids(
        &self,
        collection: &CollectionId,
        ids: &[String],
    ) -> Result<Vec<StoreSearchResult>> {
        let collections = self.collections.lock().unwrap_or_else(|e| e.into_inner());
        let Some(collection) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| {
                collection.vectors.get(id).map(|stored| StoreSearchResult {
                    id: id.clone(),
                    score: 1.0,
                    metadata: stored.metadata.clone(),
                })
            })
            .collect())
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        Ok(self
            .collections
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(id, collection)| CollectionInfo {
                id: *id,
                vector_count: collection.vectors.len() as u64,
                dimensions: collection.dimensions,
            })
            .collect())
    }

    async fn flush(&self, _collection: &CollectionId) -> Result<()> {
        Ok(())
    }

    fn provider_name(&self) -> &str {
        "memory"
    }
}

/// Evaluates a minimal `key=value` equality filter (the only shape the
/// application layer's workspace-scoped search currently needs). `None`
/// matches everything.
fn matches_filter(metadata: &MetadataMap, filter: Option<&str>) -> bool {
    let Some(filter) = filter else {
        return true;
    };
    let Some((key, value)) = filter.split_once('=') else {
        return true;
    };
    metadata
        .get(key)
        .and_then(|v| v.as_str())
        .is_some_and(|actual| actual == value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn upsert_then_search_returns_closest_match() {
        let store = InMemoryVectorStore::new();
        let collection = CollectionId::from_name("test");
        store.create_collection(&collection, 2).await.unwrap();
        store
            .upsert(
                &collection,
                &[
                    StoreEmbedding {
                        id: "a".to_owned(),
                        vector: vec![1.0, 0.0],
                    },
                    StoreEmbedding {
                        id: "b".to_owned(),
                        vector: vec![0.0, 1.0],
                    },
                ],
                vec![MetadataMap::new(), MetadataMap::new()],
            )
            .await
            .unwrap();

        let hits = store
            .search_similar(&collection, &[1.0, 0.0], 1, None)
            .await
            .unwrap();
        assert_eq!(hits[0].id, "a");
    }

    #[tokio::test]
    async fn filter_restricts_results_by_metadata() {
        let store = InMemoryVectorStore::new();
        let collection = CollectionId::from_name("test");
        store.create_collection(&collection, 1).await.unwrap();
        let mut meta_a = MetadataMap::new();
        meta_a.insert("workspace".to_owned(), json!("/repo-a"));
        store
            .upsert(
                &collection,
                &[StoreEmbedding {
                    id: "a".to_owned(),
                    vector: vec![1.0],
                }],
                vec![meta_a],
            )
            .await
            .unwrap();

        let hits = store
            .search_similar(&collection, &[1.0], 10, Some("workspace=/repo-b"))
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn delete_vectors_removes_entries() {
        let store = InMemoryVectorStore::new();
        let collection = CollectionId::from_name("test");
        store.create_collection(&collection, 1).await.unwrap();
        store
            .upsert(
                &collection,
                &[StoreEmbedding {
                    id: "a".to_owned(),
                    vector: vec![1.0],
                }],
                vec![MetadataMap::new()],
            )
            .await
            .unwrap();
        store
            .delete_vectors(&collection, &["a".to_owned()])
            .await
            .unwrap();
        let remaining = store.get_by_ids(&collection, &["a".to_owned()]).await.unwrap();
        assert!(remaining.is_empty());
    }
}
