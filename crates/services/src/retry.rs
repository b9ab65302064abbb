//! Retry with a fixed backoff schedule for calls to the remote store.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use storage::StorageError;

/// Errors that know whether a retry could help.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for StorageError {
    fn is_retryable(&self) -> bool {
        self.is_transient()
    }
}

/// Fixed backoff: the first attempt is immediate, then one attempt after each delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    backoff: Vec<Duration>,
}

impl Default for RetryPolicy {
    /// Five attempts, waiting 0.5s, 1s, 2s and 4s between them.
    fn default() -> Self {
        Self::from_millis(&[500, 1_000, 2_000, 4_000])
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(backoff: Vec<Duration>) -> Self {
        Self { backoff }
    }

    #[must_use]
    pub fn from_millis(backoff_ms: &[u64]) -> Self {
        Self::new(backoff_ms.iter().copied().map(Duration::from_millis).collect())
    }

    /// Single attempt, failures surface immediately.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::new(Vec::new())
    }

    /// `retries` extra attempts without waiting; for tests.
    #[must_use]
    pub fn immediate(retries: usize) -> Self {
        Self::new(vec![Duration::ZERO; retries])
    }

    #[must_use]
    pub fn max_attempts(&self) -> usize {
        self.backoff.len() + 1
    }

    #[must_use]
    pub fn backoff(&self) -> &[Duration] {
        &self.backoff
    }

    /// Run `call` until it succeeds, fails with a non-retryable error, or the
    /// schedule is exhausted. The last error is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns the error of the final attempt.
    pub async fn run<T, E, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let mut attempt = 0_usize;
        loop {
            let err = match call().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let delay = self.backoff.get(attempt).copied();
            let Some(delay) = delay.filter(|_| err.is_retryable()) else {
                if attempt > 0 || err.is_retryable() {
                    tracing::warn!(operation, attempts = attempt + 1, error = %err, "giving up");
                }
                return Err(err);
            };

            attempt += 1;
            tracing::warn!(
                operation,
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "transient failure, retrying"
            );
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }
}
