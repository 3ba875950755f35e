//! Lines exchanged with the host plugin runner.
//!
//! The runner writes one JSON object to our stdin and reads newline-delimited
//! JSON objects from our stdout, the last of which must be a [`CompleteLine`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Deserialize)]
pub struct PluginInput {
    pub params: Value,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProgressLine {
    pub progress: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerfLine<'a> {
    pub perf: &'a BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompleteLine {
    pub complete: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CompleteLine {
    pub fn success() -> Self {
        Self {
            complete: 1,
            code: None,
            description: None,
        }
    }

    pub fn failure(code: i64, description: impl Into<String>) -> Self {
        Self {
            complete: 1,
            code: Some(code),
            description: Some(description.into()),
        }
    }
}
