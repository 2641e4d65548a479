//! Bounded timeout + retry with exponential backoff for remote calls.

use std::future::Future;
use std::time::Duration;

use log::{debug, warn};
use rand::Rng;

use crate::config::RetryConfig;
use crate::error::{Result, VitrineError};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    timeout: Duration,
    max_retries: u32,
    backoff: Duration,
    jitter_ms: u64,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            timeout: config.timeout(),
            max_retries: config.max_retries,
            backoff: config.backoff(),
            jitter_ms: config.jitter_ms,
        }
    }

    /// One attempt, no backoff. Used for query-time calls.
    pub fn single_attempt(timeout: Duration) -> Self {
        Self {
            timeout,
            max_retries: 0,
            backoff: Duration::ZERO,
            jitter_ms: 0,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.backoff.saturating_mul(1u32 << attempt.min(16));
        let jitter = if self.jitter_ms > 0 {
            rand::rng().random_range(0..=self.jitter_ms)
        } else {
            0
        };
        base + Duration::from_millis(jitter)
    }

    /// Run `op` until it succeeds or the retry budget is spent.
    ///
    /// Every attempt is bounded by the timeout. The last failure is returned as
    /// `BackendUnavailable` for `backend`.
    pub async fn run<T, F, Fut>(&self, backend: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error = String::new();
        for attempt in 0..=self.max_retries {
            match tokio::time::timeout(self.timeout, op()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(err)) => last_error = err.to_string(),
                Err(_) => {
                    last_error = format!("timed out after {}ms", self.timeout.as_millis())
                }
            }

            if attempt < self.max_retries {
                let delay = self.delay_for(attempt);
                debug!(
                    "{backend}: attempt {} failed ({last_error}), retrying in {}ms",
                    attempt + 1,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }
        }

        warn!(
            "{backend}: giving up after {} attempt(s): {last_error}",
            self.max_retries + 1
        );
        Err(VitrineError::backend_unavailable(backend, last_error))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_millis(200),
            max_retries,
            backoff: Duration::from_millis(1),
            jitter_ms: 0,
        }
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = AtomicU32::new(0);
        let value = fast_policy(3)
            .run("flaky", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(VitrineError::internal("transient"))
                } else {
                    Ok(7)
                }
            })
            .await
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_budget_is_backend_unavailable() {
        let calls = AtomicU32::new(0);
        let err = fast_policy(2)
            .run("down", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(VitrineError::internal("refused"))
            })
            .await
            .unwrap_err();
        assert!(err.is_backend_unavailable());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let policy = RetryPolicy::single_attempt(Duration::from_millis(10));
        let err = policy
            .run("slow", || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
