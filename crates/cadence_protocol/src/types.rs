//! Event and job status snapshots as reported by the scheduler.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::lenient;
use cadence_ids::EventId;

/// A remotely defined unit of work, fetched by id or title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub title: String,
    #[serde(default = "default_enabled", deserialize_with = "lenient::flag")]
    pub enabled: bool,
    /// Downstream URL that receives a copy of every webhook notification.
    #[serde(
        default,
        rename = "web_hook",
        deserialize_with = "lenient::optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub web_hook: Option<String>,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub multiplex: bool,
}

fn default_enabled() -> bool {
    true
}

/// Last known status of a job.
///
/// Every field is optional on the wire; an absent `complete` means the job is
/// still running.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawJobStatus")]
pub struct JobStatus {
    pub complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl JobStatus {
    pub fn running(progress: f64) -> Self {
        Self {
            progress: Some(progress),
            ..Self::default()
        }
    }

    pub fn finished(code: i64, description: impl Into<String>, elapsed: f64) -> Self {
        Self {
            complete: true,
            progress: Some(1.0),
            elapsed: Some(elapsed),
            code: Some(code),
            description: Some(description.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.code.unwrap_or(0) != 0
    }
}

#[derive(Deserialize)]
struct RawJobStatus {
    #[serde(default, deserialize_with = "lenient::flag")]
    complete: bool,
    #[serde(default, deserialize_with = "lenient::optional_f64")]
    progress: Option<f64>,
    #[serde(default, deserialize_with = "lenient::optional_f64")]
    elapsed: Option<f64>,
    #[serde(default)]
    code: Option<Value>,
    #[serde(default, deserialize_with = "lenient::optional_string")]
    description: Option<String>,
}

impl From<RawJobStatus> for JobStatus {
    fn from(raw: RawJobStatus) -> Self {
        let mut description = raw.description;
        let code = match raw.code {
            None | Some(Value::Null) => None,
            Some(value) => match lenient::value_as_f64(&value) {
                Some(number) => Some(number as i64),
                None => match value {
                    // Plugins may report a textual code such as "warning".
                    Value::String(text) if !text.trim().is_empty() => {
                        description = Some(match description {
                            Some(desc) => format!("{}: {}", text, desc),
                            None => text,
                        });
                        Some(1)
                    }
                    _ => None,
                },
            },
        };

        Self {
            complete: raw.complete,
            progress: raw.progress,
            elapsed: raw.elapsed,
            code,
            description,
        }
    }
}
