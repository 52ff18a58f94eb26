//! Retry with exponential backoff.
//!
//! One policy primitive shared by every adapter call: a retry budget, a
//! capped exponential delay and a caller-supplied retryable predicate.
//! Backoff sleeps end early when the job is cancelled.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cancel::CancelToken;

/// Retry budget and backoff shape.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
    pub factor: u32,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::provider()
    }
}

impl RetryPolicy {
    /// Synchronous provider calls: 3 retries, 1s doubling, capped at 15s.
    pub fn provider() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            factor: 2,
            max_delay: Duration::from_secs(15),
        }
    }

    /// Storage and ledger writes: 2 retries.
    pub fn storage() -> Self {
        Self {
            max_retries: 2,
            ..Self::provider()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1);
        let multiplier = self.factor.max(1).saturating_pow(exponent);
        self.base_delay.saturating_mul(multiplier).min(self.max_delay)
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// exhausts the budget, or the job is cancelled.
    ///
    /// Every retry taken is added to `counter`.
    pub async fn run<F, Fut, T, E, P>(
        &self,
        operation: &str,
        cancel: &CancelToken,
        counter: &RetryCounter,
        is_retryable: P,
        mut f: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        P: Fn(&E) -> bool,
    {
        let mut retry = 0u32;
        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled);
            }
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                result = f() => result,
            };
            match result {
                Ok(value) => return Ok(value),
                Err(e) if retry < self.max_retries && is_retryable(&e) => {
                    retry += 1;
                    counter.add(1);
                    let delay = self.delay_for_retry(retry);
                    warn!(
                        operation,
                        attempt = retry,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying after transient failure"
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => {
                    debug!(operation, retries = retry, error = %e, "Giving up");
                    return Err(RetryError::Failed(e));
                }
            }
        }
    }
}

/// Why [`RetryPolicy::run`] stopped without a value.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Last error seen, either non-retryable or past the budget
    Failed(E),
    Cancelled,
}

/// Retries consumed by one stage, shared across its tasks.
#[derive(Debug, Clone, Default)]
pub struct RetryCounter(Arc<AtomicU32>);

impl RetryCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, n: u32) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn fast(policy: RetryPolicy) -> RetryPolicy {
        policy.with_base_delay(Duration::from_millis(1))
    }

    #[test]
    fn test_provider_backoff_shape() {
        let policy = RetryPolicy::provider();
        assert_eq!(policy.delay_for_retry(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for_retry(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for_retry(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for_retry(5), Duration::from_secs(15));
        assert_eq!(RetryPolicy::storage().max_retries, 2);
    }

    #[tokio::test]
    async fn test_succeeds_after_two_failures() {
        let calls = AtomicUsize::new(0);
        let counter = RetryCounter::new();
        let result: Result<u32, RetryError<String>> = fast(RetryPolicy::provider())
            .run("tts", &CancelToken::new(), &counter, |_| true, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("HTTP 503".to_string())
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(counter.get(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_budget_exhausted() {
        let calls = AtomicUsize::new(0);
        let counter = RetryCounter::new();
        let result: Result<(), RetryError<String>> = fast(RetryPolicy::provider())
            .run("tts", &CancelToken::new(), &counter, |_| true, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("HTTP 503".to_string()) }
            })
            .await;

        assert!(matches!(result, Err(RetryError::Failed(ref e)) if e == "HTTP 503"));
        assert_eq!(counter.get(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_fast() {
        let counter = RetryCounter::new();
        let result: Result<(), RetryError<String>> = fast(RetryPolicy::provider())
            .run("tts", &CancelToken::new(), &counter, |_| false, || async {
                Err("HTTP 400".to_string())
            })
            .await;

        assert!(matches!(result, Err(RetryError::Failed(_))));
        assert_eq!(counter.get(), 0);
    }

    #[tokio::test]
    async fn test_cancel_stops_retries() {
        let token = CancelToken::new();
        token.cancel();
        let counter = RetryCounter::new();
        let result: Result<(), RetryError<String>> = RetryPolicy::provider()
            .run("tts", &token, &counter, |_| true, || async { Err("HTTP 503".to_string()) })
            .await;

        assert!(matches!(result, Err(RetryError::Cancelled)));
        assert_eq!(counter.get(), 0);
    }
}
