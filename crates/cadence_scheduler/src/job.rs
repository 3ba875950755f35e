//! Queued and running job state machines.
//!
//! A [`QueuedJob`] exists from the moment an event is started until the
//! scheduler says which job it launched (or that it could not launch one).
//! A [`Job`] tracks that launched job until it completes. Both are shared
//! between the webhook listener thread, which pushes transitions into them,
//! and the orchestrating thread, which blocks on them.

use crate::client::SchedulerApi;
use crate::config::RetryPolicy;
use crate::error::{ProtocolViolation, RemoteCallError, SchedulerError};
use crate::metrics::METRICS;
use crate::oneshot::wait_for_callback;
use cadence_ids::JobId;
use cadence_protocol::{Event, JobComplete, JobStart, JobStatus};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use tracing::{debug, warn};

type CompleteCallback = Box<dyn FnOnce(&Job) + Send>;
type StartCallback = Box<dyn FnOnce(JobLaunch) + Send>;

/// How a queued run resolved.
#[derive(Clone)]
pub enum JobLaunch {
    Started(Arc<Job>),
    Failed,
}

impl std::fmt::Debug for JobLaunch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobLaunch::Started(job) => f.debug_tuple("Started").field(job.id()).finish(),
            JobLaunch::Failed => f.write_str("Failed"),
        }
    }
}

enum QueuedState {
    Pending(Vec<StartCallback>),
    Resolved(JobLaunch),
}

/// A run request the scheduler has accepted but not yet launched.
pub struct QueuedJob {
    event: Event,
    state: Mutex<QueuedState>,
}

impl std::fmt::Debug for QueuedJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedJob")
            .field("event", &self.event.title)
            .field("launch", &self.launch())
            .finish()
    }
}

impl QueuedJob {
    pub fn new(event: Event) -> Self {
        Self {
            event,
            state: Mutex::new(QueuedState::Pending(Vec::new())),
        }
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    fn lock(&self) -> MutexGuard<'_, QueuedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_resolved(&self) -> bool {
        matches!(*self.lock(), QueuedState::Resolved(_))
    }

    pub fn launch(&self) -> Option<JobLaunch> {
        match &*self.lock() {
            QueuedState::Resolved(launch) => Some(launch.clone()),
            QueuedState::Pending(_) => None,
        }
    }

    /// Run `callback` once the launch outcome is known; immediately if it
    /// already is.
    pub fn on_job_started<F>(&self, callback: F)
    where
        F: FnOnce(JobLaunch) + Send + 'static,
    {
        let mut state = self.lock();
        match &mut *state {
            QueuedState::Resolved(launch) => {
                let launch = launch.clone();
                drop(state);
                callback(launch);
            }
            QueuedState::Pending(callbacks) => callbacks.push(Box::new(callback)),
        }
    }

    pub(crate) fn on_job_start(&self, job: Arc<Job>) -> Result<(), ProtocolViolation> {
        self.resolve(JobLaunch::Started(job))
    }

    pub(crate) fn on_job_launch_failure(&self) -> Result<(), ProtocolViolation> {
        self.resolve(JobLaunch::Failed)
    }

    fn resolve(&self, launch: JobLaunch) -> Result<(), ProtocolViolation> {
        let callbacks = {
            let mut state = self.lock();
            match &mut *state {
                QueuedState::Resolved(_) => {
                    return Err(ProtocolViolation::AlreadyResolved(self.event.title.clone()))
                }
                QueuedState::Pending(callbacks) => {
                    let callbacks = std::mem::take(callbacks);
                    *state = QueuedState::Resolved(launch.clone());
                    callbacks
                }
            }
        };

        for callback in callbacks {
            callback(launch.clone());
        }
        Ok(())
    }

    /// Block until the scheduler reports the launch outcome.
    pub fn wait_for_job(&self) -> Result<Arc<Job>, SchedulerError> {
        match wait_for_callback(|callback| self.on_job_started(callback)) {
            JobLaunch::Started(job) => Ok(job),
            JobLaunch::Failed => Err(SchedulerError::LaunchFailure {
                title: self.event.title.clone(),
            }),
        }
    }
}

struct JobState {
    status: JobStatus,
    /// Drained exactly once, when `status.complete` is first recorded.
    callbacks: Vec<CompleteCallback>,
}

/// A launched job instance.
pub struct Job {
    id: JobId,
    details_url: Option<String>,
    event_title: String,
    api: Arc<dyn SchedulerApi>,
    retry: RetryPolicy,
    state: Mutex<JobState>,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("event_title", &self.event_title)
            .field("status", &self.status())
            .finish()
    }
}

impl Job {
    pub fn new(
        api: Arc<dyn SchedulerApi>,
        event_title: impl Into<String>,
        start: JobStart,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            id: start.id,
            details_url: start.job_details_url,
            event_title: event_title.into(),
            api,
            retry,
            state: Mutex::new(JobState {
                status: JobStatus::default(),
                callbacks: Vec::new(),
            }),
        }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn details_url(&self) -> Option<&str> {
        self.details_url.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the latest snapshot.
    pub fn status(&self) -> JobStatus {
        self.lock().status.clone()
    }

    pub fn is_complete(&self) -> bool {
        self.lock().status.complete
    }

    pub fn is_failed(&self) -> bool {
        self.lock().status.is_failed()
    }

    /// Reported completion fraction; 1.0 once complete.
    pub fn progress(&self) -> f64 {
        let state = self.lock();
        if state.status.complete {
            return 1.0;
        }
        state.status.progress.unwrap_or(0.0).clamp(0.0, 1.0)
    }

    pub fn elapsed(&self) -> Option<f64> {
        self.lock().status.elapsed
    }

    pub fn code(&self) -> Option<i64> {
        self.lock().status.code
    }

    pub fn description(&self) -> Option<String> {
        self.lock().status.description.clone()
    }

    /// Re-fetch the status, making at most `attempts` calls with the job's
    /// backoff between failures.
    pub fn refresh_status(&self, attempts: u32) -> Result<JobStatus, RemoteCallError> {
        let attempts = attempts.max(1);
        let mut attempt = 1;
        let status = loop {
            METRICS.inc_status_polls();
            match self.api.get_job_status(&self.id) {
                Ok(status) => break status,
                Err(err) => {
                    METRICS.inc_status_poll_failures();
                    if attempt >= attempts {
                        return Err(err);
                    }
                    warn!(
                        "Status refresh for job {} failed (attempt {}/{}): {}",
                        self.id, attempt, attempts, err
                    );
                    attempt += 1;
                    thread::sleep(self.retry.backoff);
                }
            }
        };

        self.record(status);
        Ok(self.status())
    }

    /// Refresh using the job's configured retry policy.
    pub fn refresh(&self) -> Result<JobStatus, RemoteCallError> {
        self.refresh_status(self.retry.attempts)
    }

    pub(crate) fn on_job_complete(&self, complete: JobComplete) -> Result<(), ProtocolViolation> {
        if complete.id != self.id {
            return Err(ProtocolViolation::WrongJob {
                expected: self.id.clone(),
                actual: complete.id,
            });
        }
        let mut status = complete.status;
        status.complete = true;
        self.record(status);
        Ok(())
    }

    /// Merge a snapshot and fire completion callbacks if it completes the job.
    fn record(&self, incoming: JobStatus) {
        let callbacks = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let current = &mut state.status;

            if current.complete && !incoming.complete {
                debug!("Ignoring stale running snapshot for completed job {}", self.id);
                return;
            }

            let was_complete = current.complete;
            let progress = match (current.progress, incoming.progress) {
                (Some(old), Some(new)) if !incoming.complete => Some(old.max(new)),
                (old, new) => new.or(old),
            };
            *current = JobStatus {
                complete: incoming.complete,
                progress,
                elapsed: incoming.elapsed.or(current.elapsed),
                code: incoming.code.or(current.code),
                description: incoming.description.or(current.description.take()),
            };

            if current.complete && !was_complete {
                std::mem::take(&mut state.callbacks)
            } else {
                Vec::new()
            }
        };

        for callback in callbacks {
            callback(self);
        }
    }

    /// Run `callback` once the job completes; immediately if it already has.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(&Job) + Send + 'static,
    {
        let mut state = self.lock();
        if state.status.complete {
            drop(state);
            callback(self);
        } else {
            state.callbacks.push(Box::new(callback));
        }
    }

    /// Block until the job completes and return the final snapshot.
    pub fn wait_for_complete(&self) -> JobStatus {
        wait_for_callback(|callback| self.on_complete(move |job| callback(job.status())))
    }
}
