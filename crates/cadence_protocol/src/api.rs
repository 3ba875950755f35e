//! Request and response bodies for the scheduler control API.
//!
//! Every call is `POST {base}/api/app/{method}/v1` with a JSON object that
//! carries the `api_key` next to the method parameters. Every response carries
//! a `code` discriminator (`0` on success) and a `description` otherwise.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{Event, JobStatus};
use cadence_ids::{EventId, JobId};

/// Method parameters plus the API key, flattened into one JSON object.
#[derive(Debug, Serialize)]
pub struct ApiRequest<'a, P: Serialize> {
    #[serde(flatten)]
    pub params: P,
    pub api_key: &'a str,
}

/// How to find an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLookup<'a> {
    Id(&'a str),
    Title(&'a str),
}

impl<'a> EventLookup<'a> {
    pub fn is_empty(&self) -> bool {
        match self {
            EventLookup::Id(value) | EventLookup::Title(value) => value.trim().is_empty(),
        }
    }
}

impl std::fmt::Display for EventLookup<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventLookup::Id(id) => write!(f, "id '{}'", id),
            EventLookup::Title(title) => write!(f, "title '{}'", title),
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct GetEventRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
}

impl<'a> From<EventLookup<'a>> for GetEventRequest<'a> {
    fn from(lookup: EventLookup<'a>) -> Self {
        match lookup {
            EventLookup::Id(id) => Self {
                id: Some(id),
                title: None,
            },
            EventLookup::Title(title) => Self {
                id: None,
                title: Some(title),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GetEventResponse {
    pub event: Event,
}

#[derive(Debug, Serialize)]
pub struct RunEventRequest<'a> {
    pub id: &'a EventId,
    /// Callback URL the scheduler posts job lifecycle notifications to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_hook: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub struct RunEventResponse {
    #[serde(default)]
    pub ids: Vec<JobId>,
}

#[derive(Debug, Serialize)]
pub struct JobStatusRequest<'a> {
    pub id: &'a JobId,
}

#[derive(Debug, Deserialize)]
pub struct JobStatusResponse {
    pub job: JobStatus,
}

/// Common envelope of every API response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope {
    #[serde(default)]
    pub code: Value,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl ApiEnvelope {
    pub fn is_success(&self) -> bool {
        match &self.code {
            Value::Number(n) => n.as_f64() == Some(0.0),
            Value::String(s) => s.trim() == "0",
            _ => false,
        }
    }

    /// The `code` rendered for error messages.
    pub fn code_text(&self) -> String {
        match &self.code {
            Value::String(s) => s.clone(),
            Value::Null => "missing".to_string(),
            other => other.to_string(),
        }
    }

    /// Re-assemble the payload fields into a typed response.
    pub fn into_body<T: serde::de::DeserializeOwned>(self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.body))
    }
}
