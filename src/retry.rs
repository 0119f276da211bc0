//! Shared retry combinator.
//!
//! Translation, speech synthesis and signed-URL uploads all retry through
//! [`RetryPolicy::run`]: a bounded number of attempts with exponential
//! backoff, gated by a caller-supplied "is this error worth retrying" check.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tracing::warn;

use crate::config::RetryConfig;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: usize,
    base_delay: Duration,
}

impl RetryPolicy {
    /// `max_attempts` counts the first call; `base_delay` doubles per retry.
    pub fn new(max_attempts: usize, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, config.base_delay())
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_factor(2.0)
            .with_max_times(self.max_attempts - 1)
    }

    /// Run `op` until it succeeds, `retryable` rejects the error, or the
    /// attempt budget is spent. The last error is returned on failure.
    pub async fn run<T, E, F, Fut, P>(&self, label: &str, op: F, retryable: P) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: FnMut(&E) -> bool,
        E: Display,
    {
        op.retry(self.backoff())
            .when(retryable)
            .notify(|err: &E, delay: Duration| {
                warn!(
                    operation = label,
                    error = %err,
                    retry_delay_ms = delay.as_millis() as u64,
                    "retrying"
                );
            })
            .await
    }

    /// Same as [`run`](Self::run) with every error treated as transient.
    pub async fn run_always<T, E, F, Fut>(&self, label: &str, op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.run(label, op, |_| true).await
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}
