//! Wire types for the remote scheduler.
//!
//! Three surfaces share these types:
//! - the scheduler's JSON control API (`/api/app/{method}/v1`)
//! - the webhook notifications the scheduler posts back to us
//! - the line-oriented JSON the host plugin runner reads from stdout

pub mod api;
pub mod defaults;
pub mod hook;
pub mod lenient;
pub mod plugin;
pub mod types;

pub use api::{
    ApiEnvelope, ApiRequest, EventLookup, GetEventRequest, GetEventResponse, JobStatusRequest,
    JobStatusResponse, RunEventRequest, RunEventResponse,
};
pub use cadence_ids::{CorrelationId, EventId, JobId};
pub use hook::{HookNotification, JobComplete, JobStart, NotificationError};
pub use plugin::{CompleteLine, PerfLine, PluginInput, ProgressLine};
pub use types::{Event, JobStatus};
