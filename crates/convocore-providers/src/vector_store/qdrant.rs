//! Qdrant-backed vector store. Behind the `vectorstore-qdrant` feature;
//! selected at runtime when `VECTOR_STORE_URL` names a non-memory backend.

use std::collections::HashMap;

use async_trait::async_trait;
use convocore_domain::error::{Error, Result};
use convocore_domain::ports::{CollectionInfo, MetadataMap, StoreEmbedding, StoreSearchResult, VectorStoreProvider};
use convocore_domain::value_objects::CollectionId;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, GetPointsBuilder,
    PointStruct, SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::Qdrant;

/// Qdrant vector store adapter.
pub struct QdrantVectorStore {
    client: Qdrant,
}

impl QdrantVectorStore {
    /// Connects to a Qdrant instance at `url`.
    ///
    /// # Errors
    ///
    /// Returns `Error::vector_db` if the client cannot be constructed.
    pub fn connect(url: &str, api_key: Option<&str>) -> Result<Self> {
        let mut builder = Qdrant::from_url(url);
        if let Some(api_key) = api_key {
            builder = builder.api_key(api_key);
        }
        let client = builder
            .build()
            .map_err(|e| Error::vector_db(format!("failed to connect to qdrant at {url}: {e}")))?;
        Ok(Self { client })
    }
}

fn metadata_to_payload(metadata: MetadataMap) -> HashMap<String, QdrantValue> {
    metadata
        .into_iter()
        .map(|(k, v)| (k, json_to_qdrant_value(v)))
        .collect()
}

fn json_to_qdrant_value(value: serde_json::Value) -> QdrantValue {
    QdrantValue::from(value)
}

fn payload_to_metadata(payload: HashMap<String, QdrantValue>) -> MetadataMap {
    payload
        .into_iter()
        .filter_map(|(k, v)| serde_json::to_value(v).ok().map(|v| (k, v)))
        .collect()
}

#[async_trait]
impl VectorStoreProvider for QdrantVectorStore {
    async fn create_collection(&self, collection: &CollectionId, dimensions: usize) -> Result<()> {
        if self.collection_exists(collection).await? {
            return Ok(());
        }
        self.client
            .create_collection(
                CreateCollectionBuilder::new(collection.as_str())
                    .vectors_config(VectorParamsBuilder::new(dimensions as u64, Distance::Cosine)),
            )
            .await
            .map_err(|e| Error::vector_db(format!("create_collection failed: {e}")))?;
        Ok(())
    }

    async fn delete_collection(&self, collection: &CollectionId) -> Result<()> {
        self.client
            .delete_collection(collection.as_str())
            .await
            .map_err(|e| Error::vector_db(format!("delete_collection failed: {e}")))?;
        Ok(())
    }

    async fn collection_exists(&self, collection: &CollectionId) -> Result<bool> {
        self.client
            .collection_exists(collection.as_str())
            .await
            .map_err(|e| Error::vector_db(format!("collection_exists failed: {e}")))
    }

    async fn upsert(
        &self,
        collection: &CollectionId,
        vectors: &[StoreEmbedding],
        metadata: Vec<MetadataMap>,
    ) -> Result<Vec<String>> {
        let mut ids = Vec::with_capacity(vectors.len());
        let mut points = Vec::with_capacity(vectors.len());
        for (embedding, meta) in vectors.iter().zip(metadata.into_iter().chain(std::iter::repeat(MetadataMap::new()))) {
            ids.push(embedding.id.clone());
            points.push(PointStruct::new(
                embedding.id.clone(),
                embedding.vector.clone(),
                metadata_to_payload(meta),
            ));
        }

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection.as_str(), points))
            .await
            .map_err(|e| Error::vector_db(format!("upsert failed: {e}")))?;
        Ok(ids)
    }

    async fn search_similar(
        &self,
        collection: &CollectionId,
        query_vector: &[f32],
        limit: usize,
        filter: Option<&str>,
    ) -> Result<Vec<StoreSearchResult>> {
        let mut search = SearchPointsBuilder::new(collection.as_str(), query_vector.to_vec(), limit as u64)
            .with_payload(true);
        if let Some(filter) = filter
            && let Some((key, value)) = filter.split_once('=')
        {
            search = search.filter(Filter::must([Condition::matches(
                key.to_owned(),
                value.to_owned(),
            )]));
        }

        let response = self
            .client
            .search_points(search)
            .await
            .map_err(|e| Error::vector_db(format!("search failed: {e}")))?;

        Ok(response
            .result
            .into_iter()
            .map(|point| StoreSearchResult {
                id: point
                    .id
                    .map(|id| id.to_string())
                    .unwrap_or_default(),
                score: point.score,
                metadata: payload_to_metadata(point.payload),
            })
            .collect())
    }

    async fn delete_vectors(&self, collection: &CollectionId, ids: &[String]) -> Result<()> {
        self.client
            .delete_points(DeletePointsBuilder::new(collection.as_str()).points(
                ids.iter().map(|id| id.clone().into()).collect::<Vec<_>>(),
            ))
            .await
            .map_err(|e| Error::vector_db(format!("delete_vectors failed: {e}")))?;
        Ok(())
    }

    async fn get_by_ids(
        &self,
        collection: &CollectionId,
        ids: &[String],
    ) -> Result<Vec<StoreSearchResult>> {
        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(
                    collection.as_str(),
                    ids.iter().map(|id| id.clone().into()).collect::<Vec<_>>(),
                )
                .with_payload(true)
                .with_vectors(false),
            )
            .await
            .map_err(|e| Error::vector_db(format!("get_by_ids failed: {e}")))?;

        Ok(response
            .result
            .into_iter()
            .map(|point| StoreSearchResult {
                id: point.id.map(|id| id.to_string()).unwrap_or_default(),
                score: 1.0,
                metadata: payload_to_metadata(point.payload),
            })
            .collect())
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let response = self
            .client
            .list_collections()
            .await
            .map_err(|e| Error::vector_db(format!("list_collections failed: {e}")))?;

        let mut infos = Vec::with_capacity(response.collections.len());
        for collection in response.collections {
            let id = CollectionId::from_name(&collection.name);
            let info = self
                .client
                .collection_info(&collection.name)
                .await
                .map_err(|e| Error::vector_db(format!("collection_info failed: {e}")))?;
            let vector_count = info.result.and_then(|r| r.points_count).unwrap_or(0);
            infos.push(CollectionInfo {
                id,
                vector_count,
                dimensions: 0,
            });
        }
        Ok(infos)
    }

    async fn flush(&self, _collection: &CollectionId) -> Result<()> {
        Ok(())
    }

    fn provider_name(&self) -> &str {
        "qdrant"
    }
}
