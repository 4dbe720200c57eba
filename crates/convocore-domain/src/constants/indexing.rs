//! Indexing Decision Service interval defaults.
//!
//! Overridable via `MIN_REINDEX_INTERVAL_MS` / `MAX_REINDEX_INTERVAL_MS`.

/// Minimum time between reindexing the same unchanged task (4 hours).
pub const DEFAULT_MIN_REINDEX_INTERVAL_MS: i64 = 4 * 60 * 60 * 1000;

/// Maximum time a task may go without reindexing, even if unchanged (24 hours).
pub const DEFAULT_MAX_REINDEX_INTERVAL_MS: i64 = 24 * 60 * 60 * 1000;

/// Default background scheduler tick period (5 minutes).
pub const DEFAULT_SCHEDULER_INTERVAL_MS: u64 = 5 * 60 * 1000;

/// Default maximum concurrent embedding requests in flight.
pub const DEFAULT_EMBEDDING_CONCURRENCY: usize = 4;

/// Default consecutive-failure threshold before the circuit breaker opens.
pub const DEFAULT_CIRCUIT_BREAKER_THRESHOLD: u32 = 5;

/// Initial circuit breaker open-state backoff (doubles up to a cap on repeat trips).
pub const DEFAULT_CIRCUIT_BREAKER_BASE_BACKOFF_MS: u64 = 1000;

/// Ceiling on the doubling circuit-breaker backoff.
pub const DEFAULT_CIRCUIT_BREAKER_MAX_BACKOFF_MS: u64 = 60_000;

/// Recency window within which a stale cache auto-triggers a differential rebuild (5 minutes).
pub const CACHE_RECENCY_WINDOW_MS: i64 = 5 * 60 * 1000;

/// Target token budget per chunk when splitting a conversation's messages.
pub const DEFAULT_CHUNK_TOKEN_BUDGET: usize = 400;

/// Token overlap between consecutive chunks.
pub const DEFAULT_CHUNK_TOKEN_OVERLAP: usize = 40;
