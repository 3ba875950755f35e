//! Single-assignment value with blocking waiters.
//!
//! Bridges callback-style notification delivery to a blocking caller. The value
//! may be written before or after anyone waits; a waiter that arrives late sees
//! it immediately.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Returned when a second write is attempted. Carries the rejected value.
#[derive(Debug, PartialEq, Eq)]
pub struct AlreadySet<T>(pub T);

/// Clone is cheap and shares state.
#[derive(Debug)]
pub struct OneShot<T> {
    inner: Arc<Inner<T>>,
}

#[derive(Debug)]
struct Inner<T> {
    value: Mutex<Option<T>>,
    ready: Condvar,
}

impl<T> Clone for OneShot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for OneShot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> OneShot<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                value: Mutex::new(None),
                ready: Condvar::new(),
            }),
        }
    }

    /// Store the value and wake every waiter. Only the first call succeeds.
    pub fn set(&self, value: T) -> Result<(), AlreadySet<T>> {
        let mut slot = self
            .inner
            .value
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return Err(AlreadySet(value));
        }
        *slot = Some(value);
        drop(slot);
        self.inner.ready.notify_all();
        Ok(())
    }

    pub fn is_set(&self) -> bool {
        self.inner
            .value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl<T: Clone> OneShot<T> {
    pub fn get(&self) -> Option<T> {
        self.inner
            .value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Block until the value is set.
    pub fn wait(&self) -> T {
        let mut slot = self
            .inner
            .value
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(value) = slot.as_ref() {
                return value.clone();
            }
            slot = self
                .inner
                .ready
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block for at most `timeout`. Returns `None` if nothing was set in time.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut slot = self
            .inner
            .value
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(value) = slot.as_ref() {
                return Some(value.clone());
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            let (guard, _) = self
                .inner
                .ready
                .wait_timeout(slot, remaining)
                .unwrap_or_else(PoisonError::into_inner);
            slot = guard;
        }
    }
}

/// Register a callback through `register` and block until it delivers a value.
///
/// Works whether the callback runs synchronously inside `register` or later
/// from another thread. A callback delivering twice is a contract violation;
/// the second value is dropped and logged.
pub fn wait_for_callback<T, F>(register: F) -> T
where
    T: Clone + Send + 'static,
    F: FnOnce(Box<dyn FnOnce(T) + Send>),
{
    let signal = OneShot::new();
    let writer = signal.clone();
    register(Box::new(move |value| {
        if writer.set(value).is_err() {
            tracing::error!("callback delivered a value twice");
        }
    }));
    signal.wait()
}
