//! Embedding provider port.
//!
//! A single trait covering text-to-vector embedding for both the vector
//! indexer (F) and semantic search (I), which must embed through the same
//! model so queries and stored chunks live in one vector space.

use async_trait::async_trait;

use crate::error::Result;

/// Embedding provider port.
///
/// Implementations talk to a concrete backend (an OpenAI-compatible HTTP
/// endpoint, Ollama, or an in-memory deterministic provider for tests).
/// `Error::Embedding` wraps any backend-specific failure before it crosses
/// this boundary; transient failures (timeouts, 5xx) should be surfaced as
/// `Error::Timeout`/`Error::CircuitOpen` instead so the vector indexer's
/// circuit breaker can distinguish them from permanent ones.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds a batch of texts in one call where the backend supports
    /// batching; implementations that don't may loop internally.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embeds a single piece of text (the search query path).
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut out = self
            .embed_batch(std::slice::from_ref(&text.to_owned()))
            .await?;
        out.pop()
            .ok_or_else(|| crate::error::Error::embedding("empty embedding batch result"))
    }

    /// Dimensionality of vectors this provider produces.
    fn dimensions(&self) -> usize;

    /// Stable model identifier, for logging and collection compatibility checks.
    fn model_name(&self) -> &str;

    /// Stable backend name (`"openai"`, `"ollama"`, `"memory"`, ...).
    fn provider_name(&self) -> &str;
}
