//! Cadence scheduler orchestration.
//!
//! Starts events on a remote job scheduler, correlates the scheduler's
//! asynchronous webhook notifications back to the runs that requested them,
//! and runs event sequences with aggregate progress reporting.
//!
//! ```text
//! SequenceRunner ──resolve/start──▶ SchedulerApi (HTTP, one call per request)
//!       │                                 │
//!       │ waits on                        │ posts job_start / job_complete
//!       ▼                                 ▼
//! QueuedJob ─▶ Job ◀──dispatch── WebhookCorrelator (listener thread)
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod hooks;
pub mod job;
mod listener;
pub mod metrics;
pub mod oneshot;
pub mod sequence;

#[cfg(test)]
mod testing;

pub use client::{SchedulerApi, SchedulerClient};
pub use config::{HookConfig, PollingConfig, RetryPolicy};
pub use error::{ConfigError, ProtocolViolation, RemoteCallError, Result, SchedulerError};
pub use hooks::{HookDisposition, HookRegistration, WebhookCorrelator};
pub use job::{Job, JobLaunch, QueuedJob};
pub use metrics::{MetricsSnapshot, METRICS};
pub use oneshot::{wait_for_callback, AlreadySet, OneShot};
pub use sequence::{CompletedEvent, SequenceReporter, SequenceRunner};
