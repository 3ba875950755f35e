//! In-memory scheduler for unit tests.

use crate::client::SchedulerApi;
use crate::error::RemoteCallError;
use cadence_ids::{EventId, JobId};
use cadence_protocol::{Event, EventLookup, JobStatus};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;

pub(crate) fn event(id: &str, title: &str) -> Event {
    Event {
        id: EventId::new(id),
        title: title.to_string(),
        enabled: true,
        web_hook: None,
        multiplex: false,
    }
}

#[derive(Default)]
pub(crate) struct ScriptedScheduler {
    events: Mutex<Vec<Event>>,
    status: Mutex<JobStatus>,
    status_failures_left: AtomicU32,
    status_calls: AtomicUsize,
    run_fails: AtomicBool,
    run_requests: Mutex<Vec<(EventId, Option<String>)>>,
}

impl ScriptedScheduler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_event(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    pub(crate) fn set_status(&self, status: JobStatus) {
        *self.status.lock().unwrap() = status;
    }

    /// The next `times` status calls fail with a transport error.
    pub(crate) fn fail_status_times(&self, times: u32) {
        self.status_failures_left.store(times, Ordering::SeqCst);
    }

    pub(crate) fn fail_run_event(&self, fail: bool) {
        self.run_fails.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn run_requests(&self) -> Vec<(EventId, Option<String>)> {
        self.run_requests.lock().unwrap().clone()
    }
}

impl SchedulerApi for ScriptedScheduler {
    fn get_event(&self, lookup: EventLookup<'_>) -> Result<Event, RemoteCallError> {
        let events = self.events.lock().unwrap();
        events
            .iter()
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
        if self.run_fails.load(Ordering::SeqCst) {
            return Err(RemoteCallError::Status {
                method: "run_event".to_string(),
                status: 500,
                reason: "Internal Server Error".to_string(),
            });
        }
        self.run_requests
            .lock()
            .unwrap()
            .push((event_id.clone(), web_hook.map(str::to_string)));
        Ok(Vec::new())
    }

    fn get_job_status(&self, _job_id: &JobId) -> Result<JobStatus, RemoteCallError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .status_failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(RemoteCallError::Transport {
                method: "get_job_status".to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(self.status.lock().unwrap().clone())
    }
}
