//! Configuration Value Objects
//!
//! Value objects representing configuration for external providers
//! and system settings. These configurations define how the system
//! interacts with external services.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::indexing::{
    DEFAULT_MAX_REINDEX_INTERVAL_MS, DEFAULT_MIN_REINDEX_INTERVAL_MS,
    DEFAULT_SCHEDULER_INTERVAL_MS,
};
use crate::error::{Error, Result};
use crate::value_objects::types::{
    CacheProviderKind, EmbeddingProviderKind, VectorStoreProviderKind,
};

const REDACTED: &str = "REDACTED";

/// Value Object: Embedding Provider Configuration
///
/// Configuration for connecting to and using embedding providers.
/// Defines which provider to use and how to authenticate with it.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Provider name (openai, ollama, fastembed, etc.)
    pub provider: EmbeddingProviderKind,
    /// Model identifier specific to the provider
    pub model: String,
    /// API key for cloud providers
    pub api_key: Option<String>,
    /// Custom API endpoint URL
    pub base_url: Option<String>,
    /// Output embedding dimensions
    pub dimensions: Option<usize>,
    /// Maximum input token limit
    pub max_tokens: Option<usize>,
}

impl fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| REDACTED))
            .field("base_url", &self.base_url)
            .field("dimensions", &self.dimensions)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// Value Object: Vector Store Configuration
///
/// Configuration for connecting to vector storage backends.
/// Defines which storage system to use and connection parameters.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorStoreConfig {
    /// Provider name (qdrant, memory)
    pub provider: VectorStoreProviderKind,
    /// Server address for remote providers (e.g., Qdrant)
    pub address: Option<String>,
    /// Authentication token for remote providers
    pub token: Option<String>,
    /// Collection name for organizing vectors
    pub collection: Option<String>,
    /// Expected embedding dimensions
    pub dimensions: Option<usize>,
    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,
}

impl fmt::Debug for VectorStoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorStoreConfig")
            .field("provider", &self.provider)
            .field("address", &self.address)
            .field("token", &self.token.as_ref().map(|_| REDACTED))
            .field("collection", &self.collection)
            .field("dimensions", &self.dimensions)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Value Object: Cache Configuration
///
/// Configuration for cache backend providers.
/// Defines which cache provider to use and connection parameters.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    /// Provider name (moka, memory)
    pub provider: CacheProviderKind,
    /// Server address for remote providers
    pub address: Option<String>,
    /// Authentication password for remote providers
    pub password: Option<String>,
    /// Maximum cache size in entries
    pub max_size: Option<usize>,
    /// Default TTL in seconds
    pub ttl_secs: Option<u64>,
}

impl fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheConfig")
            .field("provider", &self.provider)
            .field("address", &self.address)
            .field("password", &self.password.as_ref().map(|_| REDACTED))
            .field("max_size", &self.max_size)
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

/// Aggregate runtime configuration loaded once at startup from the process
/// environment (overridable by CLI flags in the bin crate).
///
/// Numeric fields fall back to their documented defaults on a parse failure
/// rather than aborting; callers that load this via [`CoreConfig::from_env`]
/// get a `warn!`-logged fallback instead of a startup failure, reserving
/// fatal `config_error`s for missing credentials a selected provider
/// actually requires.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct CoreConfig {
    /// Candidate storage roots to probe for a host extension's task data,
    /// in priority order. Populated from `STORAGE_ROOTS` (colon/semicolon
    /// separated) or the platform-specific defaults when unset.
    pub storage_roots: Vec<String>,
    /// Minimum time between reindexing an unchanged task, in milliseconds.
    pub min_reindex_interval_ms: i64,
    /// Maximum time a task may go without reindexing even if unchanged.
    pub max_reindex_interval_ms: i64,
    /// Background scheduler tick period, in milliseconds.
    pub scheduler_interval_ms: u64,
    /// Embedding provider configuration.
    pub embedding: EmbeddingConfig,
    /// Vector store provider configuration.
    pub vector_store: VectorStoreConfig,
    /// Cache provider configuration.
    pub cache: CacheConfig,
}

impl fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreConfig")
            .field("storage_roots", &self.storage_roots)
            .field("min_reindex_interval_ms", &self.min_reindex_interval_ms)
            .field("max_reindex_interval_ms", &self.max_reindex_interval_ms)
            .field("scheduler_interval_ms", &self.scheduler_interval_ms)
            .field("embedding", &self.embedding)
            .field("vector_store", &self.vector_store)
            .field("cache", &self.cache)
            .finish()
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            storage_roots: Vec::new(),
            min_reindex_interval_ms: DEFAULT_MIN_REINDEX_INTERVAL_MS,
            max_reindex_interval_ms: DEFAULT_MAX_REINDEX_INTERVAL_MS,
            scheduler_interval_ms: DEFAULT_SCHEDULER_INTERVAL_MS,
            embedding: EmbeddingConfig {
                provider: "memory".to_string(),
                model: "memory".to_string(),
                api_key: None,
                base_url: None,
                dimensions: Some(8),
                max_tokens: None,
            },
            vector_store: VectorStoreConfig {
                provider: "memory".to_string(),
                address: None,
                token: None,
                collection: None,
                dimensions: Some(8),
                timeout_secs: Some(30),
            },
            cache: CacheConfig {
                provider: "moka".to_string(),
                address: None,
                password: None,
                max_size: Some(10_000),
                ttl_secs: None,
            },
        }
    }
}

impl CoreConfig {
    /// Loads configuration from the process environment (see spec.md §6 for
    /// the full variable table), falling back to [`CoreConfig::default`] for
    /// anything unset or unparseable.
    ///
    /// Numeric env vars that fail to parse fall back to their documented
    /// default with a `warn!`, rather than aborting startup — only a
    /// genuinely missing credential for an *explicitly selected* non-memory
    /// provider is fatal (`Error::ConfigMissing`), matching SPEC_FULL §2.3's
    /// config-error-is-fatal-at-startup split.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigMissing` if a provider is selected (its `_URL`
    /// env var is present) but ends up without the endpoint it needs —
    /// in practice this only triggers for the embedding provider, since the
    /// vector-store branch always sets `address` in the same step it sets
    /// `provider`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("STORAGE_ROOTS") {
            let roots = split_roots(&raw);
            if !roots.is_empty() {
                config.storage_roots = roots;
            }
        }

        config.min_reindex_interval_ms = env_i64_or_default(
            "MIN_REINDEX_INTERVAL_MS",
            DEFAULT_MIN_REINDEX_INTERVAL_MS,
        );
        config.max_reindex_interval_ms = env_i64_or_default(
            "MAX_REINDEX_INTERVAL_MS",
            DEFAULT_MAX_REINDEX_INTERVAL_MS,
        );
        config.scheduler_interval_ms =
            env_u64_or_default("SCHEDULER_INTERVAL_MS", DEFAULT_SCHEDULER_INTERVAL_MS);

        if let Ok(url) = std::env::var("VECTOR_STORE_URL") {
            config.vector_store.provider = "qdrant".to_owned();
            config.vector_store.address = Some(url);
            config.vector_store.token = std::env::var("VECTOR_STORE_API_KEY").ok();
            config.vector_store.collection = std::env::var("VECTOR_STORE_COLLECTION").ok();
        }

        if let Ok(base_url) = std::env::var("EMBEDDING_BASE_URL") {
            config.embedding.provider = "openai-compatible".to_owned();
            config.embedding.base_url = Some(base_url);
            config.embedding.api_key = std::env::var("EMBEDDING_API_KEY").ok();
            if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
                config.embedding.model = model;
            }
            if let Ok(raw) = std::env::var("EMBEDDING_DIMENSIONS") {
                match raw.parse::<usize>() {
                    Ok(dims) => config.embedding.dimensions = Some(dims),
                    Err(error) => {
                        tracing::warn!(
                            value = raw,
                            %error,
                            "EMBEDDING_DIMENSIONS is not a valid integer, keeping default"
                        );
                    }
                }
            }
        }

        if config.vector_store.provider != "memory" && config.vector_store.address.is_none() {
            return Err(Error::ConfigMissing("VECTOR_STORE_URL".to_owned()));
        }
        if config.embedding.provider != "memory" && config.embedding.base_url.is_none() {
            return Err(Error::ConfigMissing("EMBEDDING_BASE_URL".to_owned()));
        }

        Ok(config)
    }
}

fn split_roots(raw: &str) -> Vec<String> {
    raw.split([':', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

fn env_i64_or_default(key: &str, default: i64) -> i64 {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|error| {
            tracing::warn!(key, value = raw, %error, "env var is not a valid integer, using default");
            default
        }),
        Err(_) => default,
    }
}

fn env_u64_or_default(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|error| {
            tracing::warn!(key, value = raw, %error, "env var is not a valid integer, using default");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::CoreConfig;
    use crate::constants::indexing::DEFAULT_MIN_REINDEX_INTERVAL_MS;

    #[test]
    fn default_config_is_memory_backed() {
        let cfg = CoreConfig::default();
        assert_eq!(cfg.embedding.provider, "memory");
        assert_eq!(cfg.vector_store.provider, "memory");
        assert!(cfg.storage_roots.is_empty());
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut cfg = CoreConfig::default();
        cfg.embedding.api_key = Some("sk-secret".to_string());
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    #[serial_test::serial(core_config_env)]
    fn from_env_with_nothing_set_matches_default() {
        for key in [
            "STORAGE_ROOTS",
            "VECTOR_STORE_URL",
            "VECTOR_STORE_API_KEY",
            "VECTOR_STORE_COLLECTION",
            "EMBEDDING_BASE_URL",
            "EMBEDDING_API_KEY",
            "EMBEDDING_MODEL",
            "EMBEDDING_DIMENSIONS",
            "MIN_REINDEX_INTERVAL_MS",
            "MAX_REINDEX_INTERVAL_MS",
            "SCHEDULER_INTERVAL_MS",
        ] {
            unsafe { std::env::remove_var(key) };
        }
        let cfg = CoreConfig::from_env().unwrap();
        assert_eq!(cfg, CoreConfig::default());
    }

    #[test]
    #[serial_test::serial(core_config_env)]
    fn from_env_selecting_qdrant_without_url_is_fine_but_selecting_embedding_without_url_fails() {
        unsafe {
            std::env::remove_var("VECTOR_STORE_URL");
            std::env::set_var("EMBEDDING_API_KEY", "sk-test");
        }
        // EMBEDDING_API_KEY alone doesn't select a provider (no `_BASE_URL`),
        // so this should still succeed as memory-backed.
        let cfg = CoreConfig::from_env().unwrap();
        assert_eq!(cfg.embedding.provider, "memory");
        unsafe { std::env::remove_var("EMBEDDING_API_KEY") };
    }

    #[test]
    #[serial_test::serial(core_config_env)]
    fn from_env_parses_storage_roots_and_intervals() {
        unsafe {
            std::env::set_var("STORAGE_ROOTS", "/a:/b;/c");
            std::env::set_var("MIN_REINDEX_INTERVAL_MS", "1000");
        }
        let cfg = CoreConfig::from_env().unwrap();
        assert_eq!(cfg.storage_roots, vec!["/a", "/b", "/c"]);
        assert_eq!(cfg.min_reindex_interval_ms, 1000);
        unsafe {
            std::env::remove_var("STORAGE_ROOTS");
            std::env::remove_var("MIN_REINDEX_INTERVAL_MS");
        }
    }

    #[test]
    #[serial_test::serial(core_config_env)]
    fn from_env_falls_back_on_unparseable_interval() {
        unsafe { std::env::set_var("MIN_REINDEX_INTERVAL_MS", "not-a-number") };
        let cfg = CoreConfig::from_env().unwrap();
        assert_eq!(
            cfg.min_reindex_interval_ms,
            DEFAULT_MIN_REINDEX_INTERVAL_MS
        );
        unsafe { std::env::remove_var("MIN_REINDEX_INTERVAL_MS") };
    }
}
