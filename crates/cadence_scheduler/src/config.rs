//! Tunable timing for polling and webhook handling.

use cadence_protocol::defaults::{
    DEFAULT_HOOK_BIND_HOST, DEFAULT_POLL_INTERVAL_MS, DEFAULT_POLL_SLICES,
    DEFAULT_REFRESH_ATTEMPTS, DEFAULT_RETRY_BACKOFF_MS, MIN_POLL_INTERVAL_MS,
};
use serde::Deserialize;
use std::time::Duration;

/// How a job status refresh retries transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first.
    pub attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_REFRESH_ATTEMPTS,
            Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
        )
    }
}

/// Wait loop timing used while a job runs.
///
/// The caller waits `slice_count` slices of `slice_interval` for a completion
/// notification before forcing a status refresh. Every field also decodes from
/// a numeric string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    #[serde(rename = "poll_interval_ms", with = "millis")]
    pub slice_interval: Duration,
    #[serde(rename = "poll_slices", with = "count")]
    pub slice_count: u32,
    /// Attempts per forced refresh, applied through [`Self::retry_policy`].
    #[serde(with = "count")]
    pub refresh_attempts: u32,
    #[serde(rename = "retry_backoff_ms", with = "millis")]
    pub retry_backoff: Duration,
}

impl PollingConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.refresh_attempts, self.retry_backoff)
    }

    /// One wait slice, never shorter than [`MIN_POLL_INTERVAL_MS`].
    pub fn slice(&self) -> Duration {
        self.slice_interval
            .max(Duration::from_millis(MIN_POLL_INTERVAL_MS))
    }

    /// Length of one full wait window before a forced refresh.
    pub fn window(&self) -> Duration {
        self.slice() * self.slice_count.max(1)
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            slice_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            slice_count: DEFAULT_POLL_SLICES,
            refresh_attempts: DEFAULT_REFRESH_ATTEMPTS,
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
        }
    }
}

/// Webhook listener settings.
#[derive(Debug, Clone)]
pub struct HookConfig {
    /// Interface the listener binds; the port is always ephemeral.
    pub bind_host: String,
    /// Host written into callback URLs. Defaults to `bind_host`.
    pub advertise_host: Option<String>,
    /// Retry policy for jobs created from `job_start` notifications.
    pub retry: RetryPolicy,
}

impl HookConfig {
    pub fn callback_host(&self) -> &str {
        self.advertise_host.as_deref().unwrap_or(&self.bind_host)
    }
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            bind_host: DEFAULT_HOOK_BIND_HOST.to_string(),
            advertise_host: None,
            retry: RetryPolicy::default(),
        }
    }
}

mod millis {
    use cadence_protocol::lenient;
    use serde::Deserializer;
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        lenient::count(deserializer).map(Duration::from_millis)
    }
}

mod count {
    use cadence_protocol::lenient;
    use serde::de::Error;
    use serde::Deserializer;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u32, D::Error>
    where
        D: Deserializer<'de>,
    {
        let n = lenient::count(deserializer)?;
        u32::try_from(n).map_err(|_| D::Error::custom(format!("{} is out of range", n)))
    }
}
