//! Host plugin protocol: one JSON object on stdin, JSON lines on stdout.

use crate::session::{run_sequence, SessionConfig};
use cadence_protocol::{CompleteLine, PerfLine, PluginInput, ProgressLine};
use cadence_scheduler::{
    CompletedEvent, ConfigError, PollingConfig, SchedulerError, SequenceReporter,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{self, Read, Write};
use tracing::{info, warn};

const INVALID_INPUT: &str = "Invalid input arguments";

/// Parameters accepted under `params`.
#[derive(Debug, Clone, Deserialize)]
pub struct PluginParams {
    pub api_host: String,
    pub api_key: String,
    /// Newline separated event titles.
    pub events: String,
    #[serde(default)]
    pub bind_host: Option<String>,
    #[serde(default)]
    pub advertise_host: Option<String>,
    #[serde(flatten)]
    pub polling: PollingConfig,
}

impl PluginParams {
    pub fn titles(&self) -> Vec<&str> {
        self.events
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect()
    }

    fn session(&self) -> SessionConfig {
        SessionConfig {
            api_host: self.api_host.clone(),
            api_key: self.api_key.clone(),
            bind_host: self.bind_host.clone(),
            advertise_host: self.advertise_host.clone(),
            polling: self.polling,
        }
    }
}

pub fn parse_input<R: Read>(mut input: R) -> Result<PluginParams, SchedulerError> {
    let mut raw = String::new();
    input
        .read_to_string(&mut raw)
        .map_err(|err| invalid_params(format!("failed to read stdin: {}", err)))?;

    let envelope: PluginInput =
        serde_json::from_str(&raw).map_err(|err| invalid_params(err.to_string()))?;
    serde_json::from_value(envelope.params).map_err(|err| invalid_params(err.to_string()))
}

fn invalid_params(message: String) -> SchedulerError {
    ConfigError::InvalidParams(message).into()
}

/// Writes protocol lines and remembers what has been reported.
pub struct PluginOutput<W: Write> {
    out: W,
    last_progress: Option<f64>,
    perf: BTreeMap<String, f64>,
}

impl<W: Write> PluginOutput<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            last_progress: None,
            perf: BTreeMap::new(),
        }
    }

    fn write_json<T: Serialize>(&mut self, line: &T) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, line)?;
        self.out.write_all(b"\n")?;
        self.out.flush()
    }

    fn write_text(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{}", text)?;
        self.out.flush()
    }

    /// Emit the perf block after a successful run, then the single
    /// completion line.
    pub fn finish(
        mut self,
        outcome: &Result<Vec<CompletedEvent>, SchedulerError>,
    ) -> io::Result<W> {
        if outcome.is_ok() && !self.perf.is_empty() {
            let perf = std::mem::take(&mut self.perf);
            self.write_json(&PerfLine { perf: &perf })?;
        }

        let line = match outcome {
            Ok(_) => CompleteLine::success(),
            Err(SchedulerError::Configuration(ConfigError::InvalidParams(_))) => {
                CompleteLine::failure(1, INVALID_INPUT)
            }
            Err(err) => CompleteLine::failure(err.code(), err.to_string()),
        };
        self.write_json(&line)?;
        Ok(self.out)
    }
}

impl<W: Write> SequenceReporter for PluginOutput<W> {
    fn progress(&mut self, fraction: f64) {
        if self.last_progress == Some(fraction) {
            return;
        }
        self.last_progress = Some(fraction);
        if let Err(err) = self.write_json(&ProgressLine { progress: fraction }) {
            warn!("Failed to write progress: {}", err);
        }
    }

    fn perf(&mut self, name: &str, seconds: f64) {
        self.perf.insert(name.to_string(), seconds);
    }

    fn message(&mut self, text: &str) {
        if let Err(err) = self.write_text(text) {
            warn!("Failed to write message: {}", err);
        }
    }
}

/// Run one plugin invocation over the given streams.
pub fn run_plugin<R: Read, W: Write>(input: R, output: W) -> io::Result<W> {
    let mut output = PluginOutput::new(output);
    let outcome = parse_input(input).and_then(|params| {
        let titles = params.titles();
        info!("Plugin invoked for {} events", titles.len());
        run_sequence(&params.session(), &titles, &mut output)
    });

    if let Err(err) = &outcome {
        warn!("Sequence failed: {}", err);
    }
    output.finish(&outcome)
}

pub fn run_stdio() -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = run_plugin(io::stdin().lock(), stdout.lock())?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::time::Duration;

    fn lines(bytes: &[u8]) -> Vec<String> {
        String::from_utf8_lossy(bytes)
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn last_json(bytes: &[u8]) -> Value {
        let all = lines(bytes);
        serde_json::from_str(all.last().unwrap()).unwrap()
    }

    #[test]
    fn test_parse_params_with_polling_overrides() {
        let input = r#"{"params": {
            "api_host": "http://scheduler:3012",
            "api_key": "abc",
            "events": "Backup\n\n  Prune  \n",
            "poll_interval_ms": 50,
            "refresh_attempts": "5"
        }}"#;

        let params = parse_input(input.as_bytes()).unwrap();
        assert_eq!(params.titles(), vec!["Backup", "Prune"]);
        assert_eq!(params.polling.slice_interval, Duration::from_millis(50));
        assert_eq!(params.polling.refresh_attempts, 5);
        assert_eq!(params.polling.slice_count, 25);
        assert!(params.bind_host.is_none());
    }

    #[test]
    fn test_invalid_input_reports_code_1() {
        for input in ["not json", r#"{"params": {"api_host": "http://x"}}"#, "{}"] {
            let out = run_plugin(input.as_bytes(), Vec::new()).unwrap();
            let all = lines(&out);
            assert_eq!(all.len(), 1, "input {:?} produced {:?}", input, all);

            let complete = last_json(&out);
            assert_eq!(complete["complete"], 1);
            assert_eq!(complete["code"], 1);
            assert_eq!(complete["description"], INVALID_INPUT);
        }
    }

    #[test]
    fn test_empty_event_list_fails_without_network() {
        let input = r#"{"params": {"api_host": "http://127.0.0.1:1", "api_key": "k", "events": "\n \n"}}"#;
        let out = run_plugin(input.as_bytes(), Vec::new()).unwrap();

        let complete = last_json(&out);
        assert_eq!(complete["code"], 1);
        assert_eq!(complete["description"], "No events to run");
    }

    #[test]
    fn test_unreachable_scheduler_reports_code_100() {
        let input = r#"{"params": {"api_host": "http://127.0.0.1:1", "api_key": "k", "events": "Backup"}}"#;
        let out = run_plugin(input.as_bytes(), Vec::new()).unwrap();

        let complete = last_json(&out);
        assert_eq!(complete["complete"], 1);
        assert_eq!(complete["code"], 100);
    }

    #[test]
    fn test_progress_written_only_on_change() {
        let mut output = PluginOutput::new(Vec::new());
        output.progress(0.0);
        output.progress(0.0);
        output.progress(0.25);
        output.message("Running event Backup.");
        output.progress(0.25);
        output.progress(0.5);

        let out = output.finish(&Ok(Vec::new())).unwrap();
        assert_eq!(
            lines(&out),
            vec![
                r#"{"progress":0.0}"#,
                r#"{"progress":0.25}"#,
                "Running event Backup.",
                r#"{"progress":0.5}"#,
                r#"{"complete":1}"#,
            ]
        );
    }

    #[test]
    fn test_perf_block_precedes_success() {
        let mut output = PluginOutput::new(Vec::new());
        output.perf("Backup", 12.5);
        output.perf("Prune", 1.0);

        let out = output.finish(&Ok(Vec::new())).unwrap();
        assert_eq!(
            lines(&out),
            vec![
                r#"{"perf":{"Backup":12.5,"Prune":1.0}}"#,
                r#"{"complete":1}"#,
            ]
        );
    }

    #[test]
    fn test_failure_omits_perf_block() {
        let mut output = PluginOutput::new(Vec::new());
        output.perf("Backup", 12.5);

        let outcome = Err(SchedulerError::JobFailure {
            title: "Vacuum".to_string(),
            code: 7,
            description: "disk full".to_string(),
        });
        let out = output.finish(&outcome).unwrap();
        assert_eq!(lines(&out).len(), 1);

        let complete = last_json(&out);
        assert_eq!(complete["code"], 3);
        assert_eq!(complete["description"], "Event Vacuum failed with code 7: disk full");
    }
}
