//! Deterministic offline embedding provider.
//!
//! Hashes each text with SHA-256 and expands the digest into a unit vector.
//! Semantically meaningless, but stable: the same text always yields the
//! same vector, which is enough to exercise the vector store round-trip
//! and the search use case end to end without a network call or a model
//! download. The default provider when no embedding backend is configured.

use async_trait::async_trait;
use convocore_domain::error::Result;
use convocore_domain::ports::EmbeddingProvider;
use sha2::{Digest, Sha256};

/// Deterministic, hash-based embedding provider.
pub struct DeterministicEmbeddingProvider {
    dimensions: usize,
}

impl DeterministicEmbeddingProvider {
    /// Builds a provider producing vectors of the given dimensionality.
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.dimensions);
        let mut counter: u32 = 0;
        while out.len() < self.dimensions {
            let mut hasher = Sha256::new();
            hasher.update(counter.to_le_bytes());
            hasher.update(text.as_bytes());
            let digest = hasher.finalize();
            for chunk in digest.chunks_exact(4) {
                if out.len() == self.dimensions {
                    break;
                }
                let bits = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                // Map to [-1, 1] so the vector isn't all-positive, which
                // would skew cosine similarity toward 1.0 for any pair.
                out.push((bits as f32 / u32::MAX as f32) * 2.0 - 1.0);
            }
            counter += 1;
        }

        let norm = out.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut out {
                *v /= norm;
            }
        }
        out
    }
}

#[async_trait]
impl EmbeddingProvider for DeterministicEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "deterministic-sha256"
    }

    fn provider_name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_text_yields_same_vector() {
        let provider = DeterministicEmbeddingProvider::new(8);
        let a = provider.embed_one("hello world").await.unwrap();
        let b = provider.embed_one("hello world").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
    }

    #[tokio::test]
    async fn different_text_yields_different_vectors() {
        let provider = DeterministicEmbeddingProvider::new(8);
        let a = provider.embed_one("hello").await.unwrap();
        let b = provider.embed_one("goodbye").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn vectors_are_unit_normalized() {
        let provider = DeterministicEmbeddingProvider::new(16);
        let v = provider.embed_one("normalize me").await.unwrap();
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }
}
