//! Scheduler API Client
//!
//! A synchronous client for the scheduler's JSON control API. One TCP
//! connection per call, no pooling and no retries; callers decide whether a
//! failure is worth repeating.

use crate::error::{ConfigError, RemoteCallError};
use cadence_ids::{EventId, JobId};
use cadence_protocol::defaults::{
    API_PATH, DEFAULT_REQUEST_TIMEOUT_SECS, METHOD_GET_EVENT, METHOD_GET_JOB_STATUS,
    METHOD_RUN_EVENT,
};
use cadence_protocol::{
    ApiEnvelope, ApiRequest, Event, EventLookup, GetEventRequest, GetEventResponse, JobStatus,
    JobStatusRequest, JobStatusResponse, RunEventRequest, RunEventResponse,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Operations the orchestrator needs from the remote scheduler.
pub trait SchedulerApi: Send + Sync {
    fn get_event(&self, lookup: EventLookup<'_>) -> Result<Event, RemoteCallError>;

    /// Start an event. `web_hook` is the URL the scheduler reports job
    /// lifecycle notifications to. Returns the launched job ids, if known.
    fn run_event(
        &self,
        event_id: &EventId,
        web_hook: Option<&str>,
    ) -> Result<Vec<JobId>, RemoteCallError>;

    fn get_job_status(&self, job_id: &JobId) -> Result<JobStatus, RemoteCallError>;
}

/// HTTP implementation of [`SchedulerApi`].
pub struct SchedulerClient {
    api_url: Url,
    api_key: String,
    agent: ureq::Agent,
}

impl SchedulerClient {
    /// Create a client for the scheduler at `host` (e.g. `http://sched:3012`).
    pub fn new(host: &str, api_key: impl Into<String>) -> Result<Self, ConfigError> {
        Self::with_timeout(
            host,
            api_key,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn with_timeout(
        host: &str,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let base = Url::parse(host).map_err(|e| ConfigError::InvalidUrl {
            url: host.to_string(),
            message: e.to_string(),
        })?;
        let api_url = base.join(API_PATH).map_err(|e| ConfigError::InvalidUrl {
            url: host.to_string(),
            message: e.to_string(),
        })?;
        if api_url.scheme() != "http" {
            return Err(ConfigError::UnsupportedScheme(host.to_string()));
        }

        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .redirects(0)
            .max_idle_connections(0)
            .max_idle_connections_per_host(0)
            .user_agent(concat!("cadence/", env!("CARGO_PKG_VERSION")))
            .build();

        Ok(Self {
            api_url,
            api_key: api_key.into(),
            agent,
        })
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    fn method_url(&self, method: &str) -> Result<Url, RemoteCallError> {
        self.api_url
            .join(&format!("app/{}/v1", method))
            .map_err(|e| RemoteCallError::InvalidRequest(format!("bad method {}: {}", method, e)))
    }

    /// POST `params` to `method` and decode the successful response body.
    pub fn call<P, T>(&self, method: &str, params: P) -> Result<T, RemoteCallError>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        let url = self.method_url(method)?;
        let body = serde_json::to_string(&ApiRequest {
            params,
            api_key: &self.api_key,
        })
        .map_err(|e| RemoteCallError::InvalidRequest(e.to_string()))?;

        debug!("POST {}", url);
        let response = match self
            .agent
            .post(url.as_str())
            .set("Content-Type", "application/json")
            .send_string(&body)
        {
            Ok(response) => response,
            Err(ureq::Error::Status(status, response)) => {
                return Err(RemoteCallError::Status {
                    method: method.to_string(),
                    status,
                    reason: response.status_text().to_string(),
                });
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(RemoteCallError::Transport {
                    method: method.to_string(),
                    message: transport.to_string(),
                });
            }
        };

        let status = response.status();
        if !(200..300).contains(&status) {
            return Err(RemoteCallError::Status {
                method: method.to_string(),
                status,
                reason: response.status_text().to_string(),
            });
        }

        let text = response
            .into_string()
            .map_err(|e| RemoteCallError::Unparsable {
                method: method.to_string(),
                message: e.to_string(),
            })?;
        let envelope: ApiEnvelope =
            serde_json::from_str(&text).map_err(|e| RemoteCallError::Unparsable {
                method: method.to_string(),
                message: e.to_string(),
            })?;

        if !envelope.is_success() {
            return Err(RemoteCallError::Application {
                method: method.to_string(),
                code: envelope.code_text(),
                description: envelope.description.unwrap_or_default(),
            });
        }

        envelope
            .into_body()
            .map_err(|e| RemoteCallError::Unparsable {
                method: method.to_string(),
                message: e.to_string(),
            })
    }
}

impl SchedulerApi for SchedulerClient {
    fn get_event(&self, lookup: EventLookup<'_>) -> Result<Event, RemoteCallError> {
        if lookup.is_empty() {
            return Err(RemoteCallError::InvalidRequest(
                "Attempt to retrieve an event with no id or title".to_string(),
            ));
        }
        let response: GetEventResponse =
            self.call(METHOD_GET_EVENT, GetEventRequest::from(lookup))?;
        Ok(response.event)
    }

    fn run_event(
        &self,
        event_id: &EventId,
        web_hook: Option<&str>,
    ) -> Result<Vec<JobId>, RemoteCallError> {
        let response: RunEventResponse = self.call(
            METHOD_RUN_EVENT,
            RunEventRequest {
                id: event_id,
                web_hook,
            },
        )?;
        Ok(response.ids)
    }

    fn get_job_status(&self, job_id: &JobId) -> Result<JobStatus, RemoteCallError> {
        let response: JobStatusResponse =
            self.call(METHOD_GET_JOB_STATUS, JobStatusRequest { id: job_id })?;
        Ok(response.job)
    }
}
