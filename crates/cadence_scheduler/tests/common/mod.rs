//! Fake scheduler that reports job lifecycle over real HTTP webhooks.

#![allow(dead_code)]

use cadence_ids::{EventId, JobId};
use cadence_protocol::{Event, EventLookup, JobStatus};
use cadence_scheduler::{
    HookConfig, PollingConfig, RemoteCallError, SchedulerApi, SequenceReporter,
};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// How the fake scheduler plays out one event's job.
#[derive(Debug, Clone)]
pub struct JobPlan {
    /// Progress reported by status polls while the job runs.
    pub progress: f64,
    pub run_for: Duration,
    pub code: i64,
    pub description: String,
    pub elapsed: f64,
    /// Post `job_complete`; when false only polling can observe completion.
    pub push_complete: bool,
    pub launch_fails: bool,
    /// Every status query for the job fails with HTTP 503.
    pub status_fails: bool,
}

impl Default for JobPlan {
    fn default() -> Self {
        Self {
            progress: 0.0,
            run_for: Duration::from_millis(50),
            code: 0,
            description: "Success".to_string(),
            elapsed: 1.0,
            push_complete: true,
            launch_fails: false,
            status_fails: false,
        }
    }
}

#[derive(Default)]
struct FakeState {
    started: Vec<String>,
    jobs: HashMap<JobId, JobStatus>,
    failing: HashSet<JobId>,
    next_job: u32,
    status_calls: usize,
}

#[derive(Default)]
pub struct FakeScheduler {
    events: Vec<(Event, JobPlan)>,
    state: Arc<Mutex<FakeState>>,
}

impl FakeScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event(mut self, title: &str, plan: JobPlan) -> Self {
        let event = Event {
            id: EventId::new(format!("ev-{}", self.events.len() + 1)),
            title: title.to_string(),
            enabled: true,
            web_hook: None,
            multiplex: false,
        };
        self.events.push((event, plan));
        self
    }

    /// Titles of the events started so far, in order.
    pub fn started(&self) -> Vec<String> {
        self.state.lock().unwrap().started.clone()
    }

    pub fn status_calls(&self) -> usize {
        self.state.lock().unwrap().status_calls
    }
}

fn post(url: &str, body: serde_json::Value) {
    let _ = ureq::post(url)
        .set("Content-Type", "application/json")
        .send_string(&body.to_string());
}

impl SchedulerApi for FakeScheduler {
    fn get_event(&self, lookup: EventLookup<'_>) -> Result<Event, RemoteCallError> {
        self.events
            .iter()
            .map(|(event, _)| event)
            .find(|event| match lookup {
                EventLookup::Id(id) => event.id.as_str() == id,
                EventLookup::Title(title) => event.title == title,
            })
            .cloned()
            .ok_or_else(|| RemoteCallError::Application {
                method: "get_event".to_string(),
                code: "event".to_string(),
                description: format!("Failed to locate event: {}", lookup),
            })
    }

    fn run_event(
        &self,
        event_id: &EventId,
        web_hook: Option<&str>,
    ) -> Result<Vec<JobId>, RemoteCallError> {
        let (event, plan) = self
            .events
            .iter()
            .find(|(event, _)| &event.id == event_id)
            .cloned()
            .ok_or_else(|| RemoteCallError::Application {
                method: "run_event".to_string(),
                code: "event".to_string(),
                description: "Failed to locate event".to_string(),
            })?;
        let hook = web_hook.map(str::to_string).ok_or_else(|| {
            RemoteCallError::InvalidRequest("fake scheduler needs a web_hook".to_string())
        })?;

        let job_id = {
            let mut state = self.state.lock().unwrap();
            state.next_job += 1;
            let job_id = JobId::new(format!("job-{}", state.next_job));
            state.started.push(event.title.clone());
            state
                .jobs
                .insert(job_id.clone(), JobStatus::running(plan.progress));
            if plan.status_fails {
                state.failing.insert(job_id.clone());
            }
            job_id
        };

        let state = Arc::clone(&self.state);
        let id = job_id.clone();
        thread::spawn(move || {
            if plan.launch_fails {
                post(
                    &hook,
                    json!({"action": "job_launch_failure", "code": 1, "description": "No eligible servers"}),
                );
                return;
            }

            post(
                &hook,
                json!({
                    "action": "job_start",
                    "id": id.as_str(),
                    "job_details_url": format!("http://fake/#JobDetails?id={}", id)
                }),
            );

            thread::sleep(plan.run_for);
            state.lock().unwrap().jobs.insert(
                id.clone(),
                JobStatus::finished(plan.code, plan.description.clone(), plan.elapsed),
            );

            if plan.push_complete {
                post(
                    &hook,
                    json!({
                        "action": "job_complete",
                        "id": id.as_str(),
                        "complete": 1,
                        "code": plan.code,
                        "description": plan.description,
                        "elapsed": plan.elapsed
                    }),
                );
            }
        });

        Ok(vec![job_id])
    }

    fn get_job_status(&self, job_id: &JobId) -> Result<JobStatus, RemoteCallError> {
        let mut state = self.state.lock().unwrap();
        state.status_calls += 1;
        if state.failing.contains(job_id) {
            return Err(RemoteCallError::Status {
                method: "get_job_status".to_string(),
                status: 503,
                reason: "Service Unavailable".to_string(),
            });
        }
        state
            .jobs
            .get(job_id)
            .cloned()
            .ok_or_else(|| RemoteCallError::Application {
                method: "get_job_status".to_string(),
                code: "job".to_string(),
                description: format!("Failed to locate job: {}", job_id),
            })
    }
}

#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub progress: Vec<f64>,
    pub perf: Vec<(String, f64)>,
    pub messages: Vec<String>,
}

impl SequenceReporter for RecordingReporter {
    fn progress(&mut self, fraction: f64) {
        self.progress.push(fraction);
    }

    fn perf(&mut self, name: &str, seconds: f64) {
        self.perf.push((name.to_string(), seconds));
    }

    fn message(&mut self, text: &str) {
        self.messages.push(text.to_string());
    }
}

pub fn fast_polling() -> PollingConfig {
    PollingConfig {
        slice_interval: Duration::from_millis(10),
        slice_count: 5,
        refresh_attempts: 3,
        retry_backoff: Duration::from_millis(10),
    }
}

pub fn hook_config(polling: &PollingConfig) -> HookConfig {
    HookConfig {
        retry: polling.retry_policy(),
        ..HookConfig::default()
    }
}
