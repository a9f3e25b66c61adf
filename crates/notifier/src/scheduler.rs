//! Recurring scan loop.
//!
//! `Scanning → Waiting → Scanning → ...` until cancellation is observed before
//! a scan or during the wait, at which point the loop enters `Stopped`. A failed
//! scan is logged and the loop still waits the full interval.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use courier_common::config::WorkerConfig;
use courier_common::error::AppError;

use crate::batch::BatchProcessor;
use crate::pause::pause;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Scanning,
    Waiting,
    Stopped,
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulerState::Scanning => write!(f, "scanning"),
            SchedulerState::Waiting => write!(f, "waiting"),
            SchedulerState::Stopped => write!(f, "stopped"),
        }
    }
}

pub struct Scheduler {
    processor: BatchProcessor,
    scan_interval: Duration,
    state: watch::Sender<SchedulerState>,
}

impl Scheduler {
    pub fn new(config: &WorkerConfig, processor: BatchProcessor) -> Self {
        let (state, _) = watch::channel(SchedulerState::Scanning);
        Self {
            processor,
            scan_interval: config.scan_interval,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    /// Drive the loop on the current task until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = self.scan_interval.as_secs(),
            "Welcome email scheduler is starting"
        );

        while !cancel.is_cancelled() {
            self.transition(SchedulerState::Scanning);
            tracing::info!("Scanning for recipients to notify");

            if let Err(e) = self.processor.process(&cancel).await {
                tracing::error!(error = %e, "Scan failed, will retry on the next cycle");
            }

            if cancel.is_cancelled() {
                break;
            }

            self.transition(SchedulerState::Waiting);
            tracing::info!(
                interval_secs = self.scan_interval.as_secs(),
                "Waiting before next scan"
            );

            if !pause(&cancel, self.scan_interval).await {
                break;
            }
        }

        self.transition(SchedulerState::Stopped);
        tracing::info!("Welcome email scheduler stopped");
    }

    fn transition(&self, state: SchedulerState) {
        let previous = self.state.send_replace(state);
        tracing::debug!(from = %previous, to = %state, "Scheduler state changed");
    }

    /// Spawn the loop onto the runtime and return a handle to stop it.
    pub fn start(self) -> SchedulerHandle {
        let cancel = CancellationToken::new();
        let state = self.subscribe();
        let token = cancel.clone();
        let task = tokio::spawn(async move { self.run(token).await });

        SchedulerHandle {
            cancel,
            state,
            task,
        }
    }
}

/// Owner side of a running [`Scheduler`].
pub struct SchedulerHandle {
    cancel: CancellationToken,
    state: watch::Receiver<SchedulerState>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Wait until the loop reports `target`.
    pub async fn wait_for(&mut self, target: SchedulerState) -> Result<(), AppError> {
        self.state
            .wait_for(|s| *s == target)
            .await
            .map(|_| ())
            .map_err(|_| AppError::Internal("scheduler state channel closed".to_string()))
    }

    /// Request cancellation and wait for the loop to finish.
    ///
    /// With a grace period the task is aborted if it has not stopped in time;
    /// an in-flight delivery is the only thing that can hold it up.
    pub async fn stop(mut self, grace: Option<Duration>) -> Result<(), AppError> {
        tracing::info!("Welcome email scheduler is stopping");
        self.cancel.cancel();

        let joined = match grace {
            Some(grace) => match tokio::time::timeout(grace, &mut self.task).await {
                Ok(joined) => joined,
                Err(_) => {
                    tracing::warn!(
                        grace_secs = grace.as_secs_f64(),
                        "Scheduler did not stop within grace period, aborting"
                    );
                    self.task.abort();
                    return Err(AppError::Internal(format!(
                        "scheduler did not stop within {grace:?}"
                    )));
                }
            },
            None => (&mut self.task).await,
        };

        joined.map_err(|e| AppError::Internal(format!("scheduler task failed: {e}")))
    }
}
