//! Bounded exponential-backoff retry for external calls.
//!
//! Only errors whose [`ServiceError::is_transient`] is true are retried. Policy violations,
//! malformed responses and hard failures are returned immediately.

use std::future::Future;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use tracing::warn;

use crate::domain::errors::{ServiceError, ServiceResult};
use crate::domain::models::RetryConfig;

/// Retry policy with exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff_ms: config.initial_backoff_ms,
            max_backoff_ms: config.max_backoff_ms,
        }
    }
}

impl RetryPolicy {
    pub const fn new(max_retries: u32, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            initial_backoff_ms,
            max_backoff_ms,
        }
    }

    /// Policy that never retries.
    pub const fn none() -> Self {
        Self::new(0, 1, 1)
    }

    /// Delay before retry number `attempt` (1-based), without jitter.
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let ms = self.initial_backoff_ms.saturating_mul(1_u64 << exp);
        Duration::from_millis(ms.min(self.max_backoff_ms))
    }

    /// Runs `operation` until it succeeds, fails permanently, or retries are exhausted.
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, mut operation: F) -> ServiceResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ServiceResult<T>>,
    {
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.initial_backoff_ms))
            .with_max_interval(Duration::from_millis(self.max_backoff_ms))
            .with_multiplier(2.0)
            .with_randomization_factor(0.1)
            .with_max_elapsed_time(None)
            .build();

        let max_retries = self.max_retries;
        let mut attempt: u32 = 0;

        backoff::future::retry_notify(
            backoff,
            || {
                attempt += 1;
                let current = attempt;
                let call = operation();
                async move {
                    call.await.map_err(|err| {
                        if err.is_transient() && current <= max_retries {
                            backoff::Error::transient(err)
                        } else {
                            backoff::Error::permanent(err)
                        }
                    })
                }
            },
            |err: ServiceError, delay: Duration| {
                warn!(
                    operation = operation_name,
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "Transient failure, retrying"
                );
            },
        )
        .await
    }
}
