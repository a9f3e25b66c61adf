//! One scan's worth of work.
//!
//! Recipients are handled strictly one at a time, in the order the store
//! returned them, with a pacing delay between consecutive recipients.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use courier_common::config::WorkerConfig;

use crate::dispatch::WelcomeDispatch;
use crate::error::StoreError;
use crate::pause::pause;
use crate::retry::{AttemptStatus, RetryExecutor};
use crate::store::RecipientStore;

/// Tally of a single batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Pending recipients returned by the store
    pub fetched: usize,
    /// Delivered and marked notified
    pub delivered: usize,
    /// Gave up on; still pending for the next scan
    pub failed: usize,
    /// Never started because cancellation was requested
    pub skipped: usize,
}

pub struct BatchProcessor {
    store: Arc<dyn RecipientStore>,
    dispatch: WelcomeDispatch,
    executor: RetryExecutor,
    batch_size: u32,
    item_delay: Duration,
}

impl BatchProcessor {
    pub fn new(
        config: &WorkerConfig,
        store: Arc<dyn RecipientStore>,
        dispatch: WelcomeDispatch,
    ) -> Self {
        Self {
            store,
            dispatch,
            executor: RetryExecutor::new(config.max_retry_attempts, config.retry_policy),
            batch_size: config.batch_size,
            item_delay: config.item_delay,
        }
    }

    /// Replace the retry executor (e.g. to change the backoff base).
    pub fn with_executor(mut self, executor: RetryExecutor) -> Self {
        self.executor = executor;
        self
    }

    /// Fetch up to `batch_size` pending recipients and dispatch each in turn.
    ///
    /// Only a failing pending-query is returned as an error; per-recipient
    /// failures are counted in the report and leave the recipient pending.
    pub async fn process(&self, cancel: &CancellationToken) -> Result<BatchReport, StoreError> {
        let mut recipients = self
            .store
            .find_pending(self.batch_size)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Error occurred during batch fetch"))?;
        recipients.truncate(self.batch_size as usize);

        let mut report = BatchReport {
            fetched: recipients.len(),
            ..BatchReport::default()
        };

        if recipients.is_empty() {
            tracing::info!("No new recipients to process");
            return Ok(report);
        }

        tracing::info!(
            count = recipients.len(),
            batch_size = self.batch_size,
            "Found new recipients to process"
        );

        let total = recipients.len();
        for (index, recipient) in recipients.iter().enumerate() {
            if cancel.is_cancelled() {
                report.skipped = total - index;
                break;
            }

            let outcome = self
                .executor
                .execute(cancel, recipient.id, || self.dispatch.send(recipient))
                .await;

            match outcome.status {
                AttemptStatus::Succeeded => report.delivered += 1,
                AttemptStatus::Exhausted(_)
                | AttemptStatus::Rejected(_)
                | AttemptStatus::Cancelled(_) => {
                    tracing::warn!(
                        recipient_id = %recipient.id,
                        attempts = outcome.attempts,
                        "Recipient left pending for the next scan"
                    );
                    report.failed += 1;
                }
            }

            let remaining = total - index - 1;
            if remaining > 0 && !pause(cancel, self.item_delay).await {
                report.skipped = remaining;
                break;
            }
        }

        if report.skipped > 0 {
            tracing::info!(skipped = report.skipped, "Batch interrupted by shutdown");
        }

        tracing::info!(
            fetched = report.fetched,
            delivered = report.delivered,
            failed = report.failed,
            skipped = report.skipped,
            "Batch complete"
        );
        Ok(report)
    }
}
