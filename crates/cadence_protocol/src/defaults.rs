//! Canonical default values shared across the client, listener and CLI.

/// Path joined onto the configured scheduler host.
pub const API_PATH: &str = "/api/";

pub const METHOD_GET_EVENT: &str = "get_event";
pub const METHOD_RUN_EVENT: &str = "run_event";
pub const METHOD_GET_JOB_STATUS: &str = "get_job_status";

pub const DEFAULT_HOOK_BIND_HOST: &str = "127.0.0.1";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_FORWARD_TIMEOUT_SECS: u64 = 10;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 200;
/// Shortest completion wait slice; keeps a zero interval from spinning.
pub const MIN_POLL_INTERVAL_MS: u64 = 10;
pub const DEFAULT_POLL_SLICES: u32 = 25;
pub const DEFAULT_REFRESH_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 2000;
