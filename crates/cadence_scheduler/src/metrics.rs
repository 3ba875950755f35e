//! In-process counters for webhook and polling activity.
//!
//! Lock-free atomics; the listener thread and the orchestrating thread both
//! write, anyone may read a snapshot.

use std::sync::atomic::{AtomicU64, Ordering};

pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    pub notifications_received: AtomicU64,
    pub protocol_violations: AtomicU64,
    pub forwards_failed: AtomicU64,
    pub status_polls: AtomicU64,
    pub status_poll_failures: AtomicU64,
    pub events_started: AtomicU64,
    pub events_completed: AtomicU64,
    pub events_failed: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            notifications_received: AtomicU64::new(0),
            protocol_violations: AtomicU64::new(0),
            forwards_failed: AtomicU64::new(0),
            status_polls: AtomicU64::new(0),
            status_poll_failures: AtomicU64::new(0),
            events_started: AtomicU64::new(0),
            events_completed: AtomicU64::new(0),
            events_failed: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn inc_notifications_received(&self) {
        self.notifications_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_protocol_violations(&self) {
        self.protocol_violations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_forwards_failed(&self) {
        self.forwards_failed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_status_polls(&self) {
        self.status_polls.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_status_poll_failures(&self) {
        self.status_poll_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_events_started(&self) {
        self.events_started.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_events_completed(&self) {
        self.events_completed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_events_failed(&self) {
        self.events_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            notifications_received: self.notifications_received.load(Ordering::Relaxed),
            protocol_violations: self.protocol_violations.load(Ordering::Relaxed),
            forwards_failed: self.forwards_failed.load(Ordering::Relaxed),
            status_polls: self.status_polls.load(Ordering::Relaxed),
            status_poll_failures: self.status_poll_failures.load(Ordering::Relaxed),
            events_started: self.events_started.load(Ordering::Relaxed),
            events_completed: self.events_completed.load(Ordering::Relaxed),
            events_failed: self.events_failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub notifications_received: u64,
    pub protocol_violations: u64,
    pub forwards_failed: u64,
    pub status_polls: u64,
    pub status_poll_failures: u64,
    pub events_started: u64,
    pub events_completed: u64,
    pub events_failed: u64,
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "events started={} completed={} failed={}; notifications={} violations={} forward_failures={}; polls={} poll_failures={}",
            self.events_started,
            self.events_completed,
            self.events_failed,
            self.notifications_received,
            self.protocol_violations,
            self.forwards_failed,
            self.status_polls,
            self.status_poll_failures
        )
    }
}
