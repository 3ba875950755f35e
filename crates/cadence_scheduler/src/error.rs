//! Error taxonomy for scheduler orchestration.

use cadence_ids::{CorrelationId, JobId};
use cadence_protocol::NotificationError;
use thiserror::Error;

/// Failure talking to the scheduler control API. Never retried by the client.
#[derive(Debug, Error)]
pub enum RemoteCallError {
    #[error("Invalid API request: {0}")]
    InvalidRequest(String),
    #[error("API call {method} failed: {message}")]
    Transport { method: String, message: String },
    #[error("API call {method} failed: {status} {reason}")]
    Status {
        method: String,
        status: u16,
        reason: String,
    },
    #[error("API call {method} returned unparsable data: {message}")]
    Unparsable { method: String, message: String },
    #[error("API call {method} failed with result: '({code}) {description}'")]
    Application {
        method: String,
        code: String,
        description: String,
    },
}

/// A webhook notification that does not fit the state of its correlation entry.
#[derive(Debug, Error)]
pub enum ProtocolViolation {
    #[error("Saw a request for an unknown web hook: {0}")]
    UnknownCorrelation(String),
    #[error("Malformed notification for hook {id}: {source}")]
    MalformedNotification {
        id: CorrelationId,
        #[source]
        source: NotificationError,
    },
    #[error("Saw unknown job action: {0}")]
    UnknownAction(String),
    #[error("Saw job_start for a job that already started ({0})")]
    AlreadyStarted(JobId),
    #[error("Saw job_launch_failure for a job that already started ({0})")]
    LaunchFailureAfterStart(JobId),
    #[error("Saw job_complete for a job that never started")]
    CompleteBeforeStart,
    #[error("Received a complete notification for the wrong job: expected {expected}, got {actual}")]
    WrongJob { expected: JobId, actual: JobId },
    #[error("Queued job for event {0} was already resolved")]
    AlreadyResolved(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unsupported scheme for API: {0}")]
    UnsupportedScheme(String),
    #[error("Invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },
    #[error("Event {0} is not enabled")]
    EventDisabled(String),
    #[error("Event {0} is multiplexed; running multiplexed events is not supported")]
    Multiplexed(String),
    #[error("No events to run")]
    NoEvents,
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Remote(#[from] RemoteCallError),
    #[error(transparent)]
    Protocol(#[from] ProtocolViolation),
    #[error("Event {title} failed to start")]
    LaunchFailure { title: String },
    #[error("Event {title} failed with code {code}: {description}")]
    JobFailure {
        title: String,
        code: i64,
        description: String,
    },
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    #[error("Webhook listener failed: {0}")]
    Listener(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

impl SchedulerError {
    /// Numeric code reported to the host plugin runner.
    pub fn code(&self) -> i64 {
        match self {
            SchedulerError::Remote(_)
            | SchedulerError::Protocol(_)
            | SchedulerError::Listener(_) => 100,
            SchedulerError::LaunchFailure { .. } => 101,
            SchedulerError::JobFailure { .. } => 3,
            SchedulerError::Configuration(config) => match config {
                ConfigError::UnsupportedScheme(_) | ConfigError::InvalidUrl { .. } => 100,
                ConfigError::Multiplexed(_) => 2,
                ConfigError::EventDisabled(_)
                | ConfigError::NoEvents
                | ConfigError::InvalidParams(_) => 1,
            },
        }
    }
}
