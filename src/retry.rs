//! Bounded Retry With Jittered Backoff
//!
//! Every store operation goes through `RetryPolicy::run`. Transient failures
//! (`StoreError::Busy`) are retried with an increasing, randomized delay; after
//! `max_attempts` the call surfaces `CoordinatorError::Unavailable`.

use crate::error::{CoordinatorError, StoreError};

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    /// Delay before the second attempt; doubles afterwards.
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_millis(150),
            max_delay: Duration::from_millis(5_000),
        }
    }
}

impl RetryPolicy {
    /// Randomized delay for the given (zero-based) failed attempt: uniform in
    /// `[0.5, 1.5)` times the doubled base delay, capped at `max_delay`.
    pub fn backoff(&self, attempt: usize) -> Duration {
        let exp = attempt.min(16) as u32;
        let nominal = self
            .base_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay);
        let factor: f64 = rand::thread_rng().gen_range(0.5..1.5);
        nominal.mul_f64(factor).min(self.max_delay)
    }

    /// Runs `op` until it succeeds, fails permanently, or the attempt bound is hit.
    ///
    /// Each attempt runs on the blocking pool, since store calls may wait on locks
    /// or disk. `UniqueViolation` maps to `Conflict`; every other final failure maps
    /// to `Unavailable`, the only infrastructure error callers ever see.
    pub async fn run<T, F>(&self, operation: &str, op: F) -> Result<T, CoordinatorError>
    where
        F: Fn() -> Result<T, StoreError> + Send + Sync + 'static,
        T: Send + 'static,
    {
        let attempts = self.max_attempts.max(1);
        let op = Arc::new(op);

        for attempt in 0..attempts {
            let task = op.clone();
            let outcome = tokio::task::spawn_blocking(move || (*task)())
                .await
                .unwrap_or_else(|e| Err(StoreError::Backend(format!("store task failed: {}", e))));

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => {
                    if attempt + 1 == attempts {
                        tracing::error!(
                            operation,
                            attempts,
                            "Giving up after repeated store contention: {}",
                            e
                        );
                        return Err(CoordinatorError::unavailable(operation, &e));
                    }
                    if attempt + 2 >= attempts {
                        tracing::warn!(operation, attempt, "Operation is waiting quite a while: {}", e);
                    } else {
                        tracing::debug!(operation, attempt, "Store busy, backing off: {}", e);
                    }
                    tokio::time::sleep(self.backoff(attempt)).await;
                }
                Err(StoreError::UniqueViolation(reason)) => {
                    return Err(CoordinatorError::Conflict(reason));
                }
                Err(e) => {
                    tracing::error!(operation, "Store operation failed: {}", e);
                    return Err(CoordinatorError::unavailable(operation, &e));
                }
            }
        }

        Err(CoordinatorError::Unavailable {
            operation: operation.to_string(),
            reason: "retry attempts exhausted".to_string(),
        })
    }
}
