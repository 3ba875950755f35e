//! Sequential event orchestration.
//!
//! Runs a list of events strictly one after another. Each event is started
//! through the [`WebhookCorrelator`], then the caller blocks until its job
//! completes, either by push notification or by a forced status refresh once
//! a polling window passes quietly. The first failure aborts the sequence.

use crate::client::SchedulerApi;
use crate::config::PollingConfig;
use crate::error::{ConfigError, Result, SchedulerError};
use crate::hooks::WebhookCorrelator;
use crate::metrics::METRICS;
use crate::oneshot::OneShot;
use cadence_ids::JobId;
use cadence_protocol::{Event, EventLookup};
use std::sync::Arc;
use tracing::{debug, info};

/// Receives progress and performance data while a sequence runs.
pub trait SequenceReporter {
    /// Aggregate completion of the whole sequence, in `[0, 1]`.
    fn progress(&mut self, fraction: f64);

    /// Named performance metric, in seconds.
    fn perf(&mut self, name: &str, seconds: f64);

    /// Human readable status line.
    fn message(&mut self, _text: &str) {}
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletedEvent {
    pub title: String,
    pub job_id: JobId,
    pub elapsed: Option<f64>,
}

pub struct SequenceRunner<'a> {
    api: Arc<dyn SchedulerApi>,
    hooks: &'a WebhookCorrelator,
    polling: PollingConfig,
}

impl<'a> SequenceRunner<'a> {
    pub fn new(
        api: Arc<dyn SchedulerApi>,
        hooks: &'a WebhookCorrelator,
        polling: PollingConfig,
    ) -> Self {
        Self {
            api,
            hooks,
            polling,
        }
    }

    /// Look up every title. Nothing is started if any event is disabled or
    /// multiplexed.
    pub fn resolve<S: AsRef<str>>(&self, titles: &[S]) -> Result<Vec<Event>> {
        if titles.is_empty() {
            return Err(ConfigError::NoEvents.into());
        }

        let mut events = Vec::with_capacity(titles.len());
        for title in titles {
            let event = self.api.get_event(EventLookup::Title(title.as_ref()))?;
            if !event.enabled {
                return Err(ConfigError::EventDisabled(event.title).into());
            }
            if event.multiplex {
                return Err(ConfigError::Multiplexed(event.title).into());
            }
            events.push(event);
        }
        Ok(events)
    }

    pub fn execute<S: AsRef<str>>(
        &self,
        titles: &[S],
        reporter: &mut dyn SequenceReporter,
    ) -> Result<Vec<CompletedEvent>> {
        let events = self.resolve(titles)?;
        let total = events.len();
        info!("Running sequence of {} events", total);

        let mut completed = Vec::with_capacity(total);
        for (index, event) in events.iter().enumerate() {
            completed.push(self.run_event(event, index, total, reporter)?);
        }

        info!("Sequence finished: {}", METRICS.snapshot());
        Ok(completed)
    }

    fn run_event(
        &self,
        event: &Event,
        index: usize,
        total: usize,
        reporter: &mut dyn SequenceReporter,
    ) -> Result<CompletedEvent> {
        reporter.message(&format!("Running event {}.", event.title));

        let queued = self.hooks.start_event(event)?;
        let job = queued.wait_for_job()?;

        let finished = OneShot::new();
        let signal = finished.clone();
        job.on_complete(move |_| {
            let _ = signal.set(());
        });

        let base = index as f64;
        let total_f = total as f64;
        while !job.is_complete() {
            reporter.progress((base + job.progress()) / total_f);

            let mut notified = false;
            for _ in 0..self.polling.slice_count.max(1) {
                if finished.wait_timeout(self.polling.slice()).is_some() {
                    notified = true;
                    break;
                }
            }

            if !notified {
                debug!(
                    "No completion notification for job {} within {:?}; polling",
                    job.id(),
                    self.polling.window()
                );
                job.refresh()?;
            }
        }

        if job.is_failed() {
            METRICS.inc_events_failed();
            return Err(SchedulerError::JobFailure {
                title: event.title.clone(),
                code: job.code().unwrap_or(-1),
                description: job.description().unwrap_or_default(),
            });
        }

        METRICS.inc_events_completed();
        reporter.progress((base + 1.0) / total_f);
        let elapsed = job.elapsed();
        reporter.perf(&event.title, elapsed.unwrap_or(0.0));
        reporter.message(&format!("Event {} completed successfully.", event.title));

        Ok(CompletedEvent {
            title: event.title.clone(),
            job_id: job.id().clone(),
            elapsed,
        })
    }
}
