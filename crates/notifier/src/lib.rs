//! Welcome-notification dispatcher.
//!
//! A recurring scan pulls a bounded batch of pending recipients from the
//! [`RecipientStore`](store::RecipientStore), renders and delivers one email per
//! recipient with bounded exponential backoff, and marks each success so the
//! same recipient is never contacted twice.
//!
//! Control flow: [`Scheduler`] → [`BatchProcessor`] → [`RetryExecutor`] →
//! [`WelcomeDispatch`] → {renderer, transport, store}.

pub mod batch;
pub mod dispatch;
pub mod error;
pub mod pause;
pub mod render;
pub mod retry;
pub mod scheduler;
pub mod store;
pub mod transport;

pub use batch::{BatchProcessor, BatchReport};
pub use dispatch::WelcomeDispatch;
pub use error::{DispatchError, RenderError, StoreError, TransportError};
pub use retry::{AttemptOutcome, AttemptStatus, RetryExecutor};
pub use scheduler::{Scheduler, SchedulerHandle, SchedulerState};
