//! Error handling types

use thiserror::Error;

/// Result type alias for operations that can fail
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the conversation state core.
///
/// Variant names track the stable error-code taxonomy surfaced to tool
/// callers rather than Rust type names, so mapping an `Error` to a
/// tool-call `{code, message}` pair is mechanical via [`Error::code`].
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (simple form)
    #[error("I/O error: {source}")]
    IoSimple {
        /// The underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// I/O operation error (with context)
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O error
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// JSON parsing or serialization error
    #[error("JSON parsing error: {source}")]
    Json {
        /// The underlying JSON error
        #[from]
        source: serde_json::Error,
    },

    /// A single conversation file could not be decoded. Recovered locally by
    /// the conversation parser; a degraded skeleton is produced instead of
    /// propagating this to the caller.
    #[error("Failed to parse conversation data at {path}: {message}")]
    ParseError {
        /// Path to the file that failed to parse.
        path: String,
        /// Description of what went wrong.
        message: String,
    },

    /// A lookup referenced an unknown `taskId` not present in the skeleton cache.
    #[error("Unknown task id: {task_id}")]
    CacheMiss {
        /// The task id that was not found in the cache.
        task_id: String,
    },

    /// Invalid argument provided to a function
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument
        message: String,
    },

    /// Vector database operation error (non-transient)
    #[error("Vector database error: {message}")]
    VectorDb {
        /// Description of the vector database error
        message: String,
    },

    /// Embedding provider operation error (non-transient)
    #[error("Embedding provider error: {message}")]
    Embedding {
        /// Description of the embedding provider error
        message: String,
    },

    /// The circuit breaker guarding an external provider is open; the caller
    /// should back off rather than retry immediately.
    #[error("Circuit open for provider '{provider}', retry after {retry_after_ms}ms")]
    CircuitOpen {
        /// Name of the provider whose circuit is open.
        provider: String,
        /// Minimum time to wait before retrying.
        retry_after_ms: u64,
    },

    /// An external call exceeded its configured timeout.
    #[error("Operation '{operation}' timed out after {elapsed_ms}ms")]
    Timeout {
        /// Name of the operation that timed out.
        operation: String,
        /// How long the operation ran before timing out.
        elapsed_ms: u64,
    },

    /// A request was rejected by the indexing decision service's rate limiter.
    #[error("Rate limited: {reason}")]
    RateLimited {
        /// Human-readable reason for the rejection.
        reason: String,
    },

    /// Configuration-related error (simple form)
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error
        message: String,
    },

    /// Missing configuration field
    #[error("Missing configuration: {0}")]
    ConfigMissing(String),

    /// Invalid configuration value
    #[error("Invalid configuration for '{key}': {message}")]
    ConfigInvalid {
        /// The configuration key that is invalid
        key: String,
        /// Reason why it is invalid
        message: String,
    },

    /// Network-related error
    #[error("Network error: {message}")]
    Network {
        /// Description of the network error
        message: String,
        /// Optional source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Cache operation error
    #[error("Cache error: {message}")]
    Cache {
        /// Description of the cache error
        message: String,
    },

    /// An internal consistency check failed (e.g. a cycle survived the
    /// configured number of cycle-breaking passes). Surfaced and logged with
    /// full context; the offending edges are dropped.
    #[error("Invariant violation: {message}")]
    Invariant {
        /// Description of the invariant that was violated.
        message: String,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error
        message: String,
    },
}

impl Error {
    /// Create a parse error.
    pub fn parse_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::ParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a cache-miss error.
    pub fn cache_miss<S: Into<String>>(task_id: S) -> Self {
        Self::CacheMiss {
            task_id: task_id.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a vector database error
    pub fn vector_db<S: Into<String>>(message: S) -> Self {
        Self::VectorDb {
            message: message.into(),
        }
    }

    /// Create an embedding provider error
    pub fn embedding<S: Into<String>>(message: S) -> Self {
        Self::Embedding {
            message: message.into(),
        }
    }

    /// Create an invariant-violation error.
    pub fn invariant<S: Into<String>>(message: S) -> Self {
        Self::Invariant {
            message: message.into(),
        }
    }

    /// Create an I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
            source: None,
        }
    }

    /// Create an I/O error with source
    pub fn io_with_source<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        message: S,
        source: E,
    ) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    /// Create a network error with source
    pub fn network_with_source<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        message: S,
        source: E,
    ) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a cache error
    pub fn cache<S: Into<String>>(message: S) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// The stable error code used in the tool gateway's `{code, message}`
    /// failure shape, so consumers can branch on it without string-matching
    /// `Display` output.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::IoSimple { .. } | Self::Io { .. } => "io_error",
            Self::Json { .. } => "parse_error",
            Self::ParseError { .. } => "parse_error",
            Self::CacheMiss { .. } => "cache_miss",
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::VectorDb { .. } => "vector_store_error",
            Self::Embedding { .. } => "embedding_error",
            Self::CircuitOpen { .. } => "circuit_open",
            Self::Timeout { .. } => "timeout",
            Self::RateLimited { .. } => "rate_limited",
            Self::Config { .. } | Self::ConfigMissing(_) | Self::ConfigInvalid { .. } => {
                "config_error"
            }
            Self::Network { .. } => "network_error",
            Self::Cache { .. } => "cache_error",
            Self::Invariant { .. } => "invariant_violation",
            Self::Internal { .. } => "internal_error",
        }
    }

    /// Whether this error represents a transient failure that the background
    /// scheduler should simply retry on its next tick.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::CircuitOpen { .. } | Self::Timeout { .. } | Self::RateLimited { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn code_matches_taxonomy() {
        assert_eq!(Error::cache_miss("t1").code(), "cache_miss");
        assert_eq!(Error::vector_db("down").code(), "vector_store_error");
        assert_eq!(
            Error::CircuitOpen {
                provider: "openai".into(),
                retry_after_ms: 500
            }
            .code(),
            "circuit_open"
        );
    }

    #[test]
    fn transient_errors_are_flagged() {
        assert!(Error::Timeout {
            operation: "embed".into(),
            elapsed_ms: 30_000
        }
        .is_transient());
        assert!(!Error::invariant("cycle").is_transient());
    }
}
