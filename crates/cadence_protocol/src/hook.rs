//! Webhook notifications posted by the scheduler.
//!
//! The raw body is decoded once, here, into a closed set of actions. Anything
//! the listener does not understand becomes [`HookNotification::Unknown`].

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::types::JobStatus;
use cadence_ids::JobId;

pub const ACTION_JOB_LAUNCH_FAILURE: &str = "job_launch_failure";
pub const ACTION_JOB_START: &str = "job_start";
pub const ACTION_JOB_COMPLETE: &str = "job_complete";

#[derive(Debug, Clone, PartialEq)]
pub enum HookNotification {
    /// The scheduler accepted the run but could not launch a job.
    JobLaunchFailure,
    JobStart(JobStart),
    JobComplete(JobComplete),
    Unknown { action: String },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobStart {
    pub id: JobId,
    #[serde(default)]
    pub job_details_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobComplete {
    pub id: JobId,
    /// Final status carried by the notification; `complete` is always set.
    pub status: JobStatus,
}

#[derive(Debug, Deserialize)]
struct JobCompleteIdentity {
    id: JobId,
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notification body is not a JSON object")]
    NotAnObject,
    #[error("notification has no action")]
    MissingAction,
    #[error("invalid {action} notification: {source}")]
    InvalidPayload {
        action: String,
        #[source]
        source: serde_json::Error,
    },
}

impl HookNotification {
    pub fn decode(payload: &Value) -> Result<Self, NotificationError> {
        let object = payload.as_object().ok_or(NotificationError::NotAnObject)?;
        let action = object
            .get("action")
            .and_then(Value::as_str)
            .ok_or(NotificationError::MissingAction)?;

        let invalid = |source| NotificationError::InvalidPayload {
            action: action.to_string(),
            source,
        };

        match action {
            ACTION_JOB_LAUNCH_FAILURE => Ok(HookNotification::JobLaunchFailure),
            ACTION_JOB_START => {
                let start = JobStart::deserialize(payload).map_err(invalid)?;
                Ok(HookNotification::JobStart(start))
            }
            ACTION_JOB_COMPLETE => {
                let identity = JobCompleteIdentity::deserialize(payload).map_err(invalid)?;
                let mut status = JobStatus::deserialize(payload).map_err(invalid)?;
                status.complete = true;
                Ok(HookNotification::JobComplete(JobComplete {
                    id: identity.id,
                    status,
                }))
            }
            other => Ok(HookNotification::Unknown {
                action: other.to_string(),
            }),
        }
    }

    pub fn action(&self) -> &str {
        match self {
            HookNotification::JobLaunchFailure => ACTION_JOB_LAUNCH_FAILURE,
            HookNotification::JobStart(_) => ACTION_JOB_START,
            HookNotification::JobComplete(_) => ACTION_JOB_COMPLETE,
            HookNotification::Unknown { action } => action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_job_start() {
        let notification = HookNotification::decode(&json!({
            "action": "job_start",
            "id": "jk1",
            "job_details_url": "http://sched/#JobDetails?id=jk1",
            "hostname": "worker-3"
        }))
        .unwrap();

        match notification {
            HookNotification::JobStart(start) => {
                assert_eq!(start.id.as_str(), "jk1");
                assert_eq!(
                    start.job_details_url.as_deref(),
                    Some("http://sched/#JobDetails?id=jk1")
                );
            }
            other => panic!("unexpected notification: {:?}", other),
        }
    }

    #[test]
    fn test_decode_job_complete_forces_complete() {
        let notification = HookNotification::decode(&json!({
            "action": "job_complete",
            "id": "jk1",
            "code": 7,
            "description": "disk full",
            "elapsed": 31.5
        }))
        .unwrap();

        let HookNotification::JobComplete(complete) = notification else {
            panic!("expected job_complete");
        };
        assert_eq!(complete.id.as_str(), "jk1");
        assert!(complete.status.complete);
        assert_eq!(complete.status.code, Some(7));
        assert_eq!(complete.status.elapsed, Some(31.5));
        assert!(complete.status.is_failed());
    }

    #[test]
    fn test_unknown_action_is_preserved() {
        let notification =
            HookNotification::decode(&json!({"action": "job_warning", "id": "jk1"})).unwrap();
        assert_eq!(notification.action(), "job_warning");
        assert!(matches!(notification, HookNotification::Unknown { .. }));
    }

    #[test]
    fn test_malformed_notifications() {
        assert!(matches!(
            HookNotification::decode(&json!([1, 2])),
            Err(NotificationError::NotAnObject)
        ));
        assert!(matches!(
            HookNotification::decode(&json!({"id": "jk1"})),
            Err(NotificationError::MissingAction)
        ));
        assert!(matches!(
            HookNotification::decode(&json!({"action": "job_start"})),
            Err(NotificationError::InvalidPayload { .. })
        ));
    }
}
