//! HTTP embedding provider, speaking the OpenAI `/embeddings` wire format.
//!
//! Covers both OpenAI itself and the many OpenAI-compatible endpoints
//! (Ollama's `/v1/embeddings` shim among them) by varying `base_url` and
//! whether an `Authorization` header is sent.

use async_trait::async_trait;
use convocore_domain::error::{Error, Result};
use convocore_domain::ports::EmbeddingProvider;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// HTTP client for an OpenAI-compatible embeddings endpoint.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    dimensions: usize,
    provider_name: &'static str,
}

impl HttpEmbeddingProvider {
    /// Builds a provider against `base_url` (no trailing slash), optionally
    /// authenticated with a bearer `api_key`.
    ///
    /// # Errors
    ///
    /// Returns `Error::config` if the underlying HTTP client fails to build.
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        model: String,
        dimensions: usize,
        provider_name: &'static str,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url,
            api_key,
            model,
            dimensions,
            provider_name,
        })
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", self.base_url);
        let mut request = self.client.post(&url).json(&EmbeddingRequest {
            input: texts,
            model: &self.model,
        });
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|error| {
            if error.is_timeout() {
                Error::Timeout {
                    operation: "embed_batch".to_owned(),
                    elapsed_ms: DEFAULT_TIMEOUT_SECS * 1000,
                }
            } else {
                Error::network_with_source("embedding request failed", error)
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::embedding(format!(
                "embedding backend returned {status}: {body}"
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|error| Error::network_with_source("failed to decode embedding response", error))?;

        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        self.provider_name
    }
}
