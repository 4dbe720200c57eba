//! Per-service circuit breaker guarding the vector indexer's embedding and
//! vector-store calls.
//!
//! Three states: `Closed` (normal operation), `Open` (fail fast, backing
//! off), `HalfOpen` (a single probe is allowed through to test recovery).
//! The backoff doubles on every repeat trip, up to a configured cap.

use std::time::{Duration, Instant};

use convocore_domain::error::{Error, Result};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: State,
    consecutive_failures: u32,
    backoff_ms: u64,
    opened_at: Option<Instant>,
}

/// Circuit breaker over a single named external service.
pub struct CircuitBreaker {
    provider: String,
    threshold: u32,
    base_backoff_ms: u64,
    max_backoff_ms: u64,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Builds a closed breaker for `provider` (used verbatim in
    /// `Error::CircuitOpen`).
    #[must_use]
    pub fn new(provider: impl Into<String>, threshold: u32, base_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            provider: provider.into(),
            threshold,
            base_backoff_ms,
            max_backoff_ms,
            inner: Mutex::new(Inner {
                state: State::Closed,
                consecutive_failures: 0,
                backoff_ms: base_backoff_ms,
                opened_at: None,
            }),
        }
    }

    /// Call before issuing the guarded request. `Ok(())` means proceed
    /// (closed, or the one allowed half-open probe); `Err(Error::CircuitOpen)`
    /// means fail fast.
    pub async fn before_call(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            State::Closed => Ok(()),
            State::HalfOpen => Ok(()),
            State::Open => {
                let elapsed = inner.opened_at.map(Instant::elapsed).unwrap_or_default();
                let backoff = Duration::from_millis(inner.backoff_ms);
                if elapsed >= backoff {
                    inner.state = State::HalfOpen;
                    Ok(())
                } else {
                    let retry_after_ms = (backoff - elapsed).as_millis() as u64;
                    Err(Error::CircuitOpen {
                        provider: self.provider.clone(),
                        retry_after_ms,
                    })
                }
            }
        }
    }

    /// Records a successful call: closes the breaker and resets the
    /// failure count and backoff.
    pub async fn record_success(&self) {
        let mut inner = self.inner.lock().await;
        inner.state = State::Closed;
        inner.consecutive_failures = 0;
        inner.backoff_ms = self.base_backoff_ms;
        inner.opened_at = None;
    }

    /// Records a failed call. A failed half-open probe reopens the breaker
    /// with a doubled backoff; enough consecutive closed-state failures
    /// opens it for the first time.
    pub async fn record_failure(&self) {
        let mut inner = self.inner.lock().await;
        inner.consecutive_failures += 1;
        match inner.state {
            State::HalfOpen => {
                inner.backoff_ms = (inner.backoff_ms * 2).min(self.max_backoff_ms);
                inner.state = State::Open;
                inner.opened_at = Some(Instant::now());
            }
            State::Closed => {
                if inner.consecutive_failures >= self.threshold {
                    inner.backoff_ms = self.base_backoff_ms;
                    inner.state = State::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            State::Open => {}
        }
    }

    /// Whether the breaker is currently open (fail-fast).
    pub async fn is_open(&self) -> bool {
        matches!(self.inner.lock().await.state, State::Open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_after_threshold_consecutive_failures() {
        let breaker = CircuitBreaker::new("test", 3, 10, 1000);
        for _ in 0..2 {
            breaker.record_failure().await;
            assert!(breaker.before_call().await.is_ok());
        }
        breaker.record_failure().await;
        assert!(breaker.before_call().await.is_err());
    }

    #[tokio::test]
    async fn half_open_probe_allowed_after_backoff_elapses() {
        let breaker = CircuitBreaker::new("test", 1, 5, 1000);
        breaker.record_failure().await;
        assert!(breaker.before_call().await.is_err());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(breaker.before_call().await.is_ok());
    }

    #[tokio::test]
    async fn success_resets_to_closed() {
        let breaker = CircuitBreaker::new("test", 1, 5, 1000);
        breaker.record_failure().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(breaker.before_call().await.is_ok());
        breaker.record_success().await;
        assert!(!breaker.is_open().await);
        breaker.record_failure().await;
        assert!(breaker.is_open().await);
    }

    #[tokio::test]
    async fn failed_probe_doubles_backoff() {
        let breaker = CircuitBreaker::new("test", 1, 10, 1000);
        breaker.record_failure().await;
        tokio::time::sleep(Duration::from_millis(15)).await;
        assert!(breaker.before_call().await.is_ok());
        breaker.record_failure().await;
        // Backoff doubled to 20ms; 15ms after reopening is not enough yet.
        tokio::time::sleep(Duration::from_millis(15)).await;
        assert!(breaker.before_call().await.is_err());
    }
}
