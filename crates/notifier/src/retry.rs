//! Bounded exponential backoff around one unit of work.
//!
//! A unit of work is tried up to `max_retry_attempts + 1` times. Before retry
//! `n` (starting at 1) the executor waits `base * 2^n`, so with the default
//! one-second base the waits are 2s, 4s, 8s, ... with no jitter. Every wait can
//! be cut short by the cancellation token.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use courier_common::config::RetryPolicy;

use crate::error::DispatchError;
use crate::pause::pause;

/// Time unit the backoff exponent is applied to.
pub const BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Delay before retry number `retry` (1-based).
pub fn backoff_delay(base: Duration, retry: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(retry))
}

/// How a retry cycle ended.
#[derive(Debug)]
pub enum AttemptStatus {
    Succeeded,
    /// Every allowed attempt failed.
    Exhausted(DispatchError),
    /// The retry policy refused to retry this error.
    Rejected(DispatchError),
    /// Cancellation fired while waiting to retry.
    Cancelled(DispatchError),
}

/// Result of one [`RetryExecutor::execute`] call. Never persisted.
#[derive(Debug)]
pub struct AttemptOutcome {
    pub attempts: u32,
    pub status: AttemptStatus,
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, AttemptStatus::Succeeded)
    }

    pub fn last_error(&self) -> Option<&DispatchError> {
        match &self.status {
            AttemptStatus::Succeeded => None,
            AttemptStatus::Exhausted(e) | AttemptStatus::Rejected(e) | AttemptStatus::Cancelled(e) => {
                Some(e)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryExecutor {
    max_retry_attempts: u32,
    base: Duration,
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(max_retry_attempts: u32, policy: RetryPolicy) -> Self {
        Self {
            max_retry_attempts,
            base: BACKOFF_BASE,
            policy,
        }
    }

    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.base = base;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retry_attempts.saturating_add(1)
    }

    /// Decide whether `error` deserves another attempt.
    pub fn should_retry(&self, error: &DispatchError) -> bool {
        match self.policy {
            RetryPolicy::Always => true,
            RetryPolicy::Transient => error.is_transient(),
        }
    }

    /// Run `work` until it succeeds, attempts run out, the policy gives up, or
    /// `cancel` fires during a backoff wait.
    ///
    /// An attempt that has started is always awaited to completion.
    pub async fn execute<F, Fut>(
        &self,
        cancel: &CancellationToken,
        recipient_id: Uuid,
        mut work: F,
    ) -> AttemptOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), DispatchError>>,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let error = match work().await {
                Ok(()) => {
                    return AttemptOutcome {
                        attempts: attempt,
                        status: AttemptStatus::Succeeded,
                    };
                }
                Err(e) => e,
            };

            if attempt >= max_attempts {
                tracing::error!(
                    recipient_id = %recipient_id,
                    attempts = attempt,
                    error = %error,
                    "Giving up after final attempt"
                );
                return AttemptOutcome {
                    attempts: attempt,
                    status: AttemptStatus::Exhausted(error),
                };
            }

            if !self.should_retry(&error) {
                tracing::error!(
                    recipient_id = %recipient_id,
                    attempts = attempt,
                    error = %error,
                    "Permanent failure, not retrying"
                );
                return AttemptOutcome {
                    attempts: attempt,
                    status: AttemptStatus::Rejected(error),
                };
            }

            let delay = backoff_delay(self.base, attempt);
            tracing::warn!(
                recipient_id = %recipient_id,
                attempt,
                delay_secs = delay.as_secs_f64(),
                error = %error,
                "Attempt failed, retrying after backoff"
            );

            if !pause(cancel, delay).await {
                tracing::info!(
                    recipient_id = %recipient_id,
                    attempts = attempt,
                    "Backoff interrupted by shutdown"
                );
                return AttemptOutcome {
                    attempts: attempt,
                    status: AttemptStatus::Cancelled(error),
                };
            }
        }
    }
}
