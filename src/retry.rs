//! Bounded retry with exponential backoff for external service calls.
//!
//! Every embedding and generation request goes through one
//! [`RetryPolicy`]. Each attempt is bounded by `call_timeout`; a timeout
//! counts as a transient failure. Only [`ServiceError::Transient`] is
//! retried. The delay before attempt `n + 1` is
//! `min(base_delay * 2^(n-1), max_delay)`, scaled by a random factor in
//! `[1 - jitter, 1 + jitter]`.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;

use repodoc_core::error::ServiceError;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: f64,
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            jitter: 0.1,
            call_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{operation} failed after {attempts} attempt(s): {source}")]
pub struct RetryExhausted {
    pub operation: String,
    pub attempts: u32,
    #[source]
    pub source: ServiceError,
}

impl RetryPolicy {
    /// Backoff before the attempt following attempt number `attempt`
    /// (1-based), without jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.jitter <= 0.0 || delay.is_zero() {
            return delay;
        }
        let offset = rand::thread_rng().gen_range(-self.jitter..=self.jitter);
        delay.mul_f64((1.0 + offset).max(0.0))
    }

    /// Run `call` until it succeeds, fails permanently, or `max_attempts`
    /// is reached.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, RetryExhausted>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let result = match tokio::time::timeout(self.call_timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(ServiceError::transient(format!(
                    "timed out after {:?}",
                    self.call_timeout
                ))),
            };

            let error = match result {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(operation, attempt, "call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if !error.is_transient() || attempt >= max_attempts {
                return Err(RetryExhausted {
                    operation: operation.to_string(),
                    attempts: attempt,
                    source: error,
                });
            }

            let delay = self.jittered(self.backoff(attempt));
            tracing::warn!(
                operation,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "transient failure, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
