//! Webhook correlation.
//!
//! Every event run gets a fresh correlation id embedded in the callback URL it
//! hands the scheduler. Notifications posted to that URL are routed back to the
//! run's [`QueuedJob`] and, once started, its [`Job`]. The registry lock is only
//! held for map operations; forwarding and callbacks run outside it.

use crate::client::SchedulerApi;
use crate::config::{HookConfig, RetryPolicy};
use crate::error::{ConfigError, ProtocolViolation, SchedulerError};
use crate::job::{Job, QueuedJob};
use crate::listener::{spawn_listener, ListenerHandle};
use crate::metrics::METRICS;
use cadence_ids::CorrelationId;
use cadence_protocol::defaults::DEFAULT_FORWARD_TIMEOUT_SECS;
use cadence_protocol::{Event, HookNotification};
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What happened to a correlation entry after a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookDisposition {
    /// Still waiting for a completion notification.
    Pending,
    /// Terminal; the entry has been removed.
    Finished,
}

/// Returned by [`WebhookCorrelator::register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookRegistration {
    pub correlation_id: CorrelationId,
    pub callback_url: String,
}

/// One in-flight run.
struct Hook {
    event: Event,
    queued_job: Arc<QueuedJob>,
    job: Mutex<Option<Arc<Job>>>,
}

impl Hook {
    fn started_job(&self) -> Option<Arc<Job>> {
        self.job
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn apply(
        &self,
        registry: &HookRegistry,
        id: &CorrelationId,
        notification: HookNotification,
    ) -> Result<HookDisposition, ProtocolViolation> {
        match notification {
            HookNotification::JobLaunchFailure => {
                if let Some(job) = self.started_job() {
                    return Err(ProtocolViolation::LaunchFailureAfterStart(job.id().clone()));
                }
                info!("Event {} failed to launch", self.event.title);
                self.queued_job.on_job_launch_failure()?;
                Ok(HookDisposition::Finished)
            }
            HookNotification::JobStart(start) => {
                let job = {
                    let mut slot = self.job.lock().unwrap_or_else(PoisonError::into_inner);
                    if let Some(existing) = slot.as_ref() {
                        return Err(ProtocolViolation::AlreadyStarted(existing.id().clone()));
                    }
                    let job = Arc::new(Job::new(
                        Arc::clone(&registry.api),
                        self.event.title.clone(),
                        start,
                        registry.retry,
                    ));
                    *slot = Some(Arc::clone(&job));
                    job
                };

                info!("Event {} started job {}", self.event.title, job.id());
                // Registered before anyone else can observe the job, so the
                // entry is gone by the time a waiter sees completion.
                job.on_complete(registry.release_on_complete(id.clone()));
                if let Err(e) = job.refresh_status(1) {
                    warn!("Initial status fetch for job {} failed: {}", job.id(), e);
                }
                self.queued_job.on_job_start(job)?;
                Ok(HookDisposition::Pending)
            }
            HookNotification::JobComplete(complete) => {
                let job = self
                    .started_job()
                    .ok_or(ProtocolViolation::CompleteBeforeStart)?;
                job.on_job_complete(complete)?;
                info!(
                    "Job {} for event {} completed with code {}",
                    job.id(),
                    self.event.title,
                    job.code().unwrap_or(0)
                );
                Ok(HookDisposition::Finished)
            }
            HookNotification::Unknown { action } => Err(ProtocolViolation::UnknownAction(action)),
        }
    }
}

/// Correlation registry shared between callers and the listener thread.
pub(crate) struct HookRegistry {
    api: Arc<dyn SchedulerApi>,
    retry: RetryPolicy,
    hooks: Mutex<HashMap<CorrelationId, Arc<Hook>>>,
    forwarder: ureq::Agent,
    this: Weak<HookRegistry>,
}

impl HookRegistry {
    fn new(api: Arc<dyn SchedulerApi>, retry: RetryPolicy) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            api,
            retry,
            hooks: Mutex::new(HashMap::new()),
            forwarder: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(DEFAULT_FORWARD_TIMEOUT_SECS))
                .build(),
        })
    }

    /// Completion callback that drops the entry, however completion was seen.
    fn release_on_complete(&self, id: CorrelationId) -> impl FnOnce(&Job) + Send + 'static {
        let registry = self.this.clone();
        move |job: &Job| {
            if let Some(registry) = registry.upgrade() {
                if registry.remove(&id) {
                    debug!("Released hook {} after job {} completed", id, job.id());
                }
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CorrelationId, Arc<Hook>>> {
        self.hooks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, event: Event, queued_job: Arc<QueuedJob>) -> CorrelationId {
        let hook = Arc::new(Hook {
            event,
            queued_job,
            job: Mutex::new(None),
        });

        let mut hooks = self.lock();
        let mut id = CorrelationId::new();
        while hooks.contains_key(&id) {
            id = CorrelationId::new();
        }
        hooks.insert(id.clone(), hook);
        id
    }

    fn remove(&self, id: &CorrelationId) -> bool {
        self.lock().remove(id).is_some()
    }

    fn get(&self, id: &CorrelationId) -> Option<Arc<Hook>> {
        self.lock().get(id).cloned()
    }

    fn len(&self) -> usize {
        self.lock().len()
    }

    /// Route one decoded notification body to its correlation entry.
    pub(crate) fn dispatch(
        &self,
        raw_id: &str,
        payload: &Value,
    ) -> Result<HookDisposition, ProtocolViolation> {
        METRICS.inc_notifications_received();
        let result = self.dispatch_inner(raw_id, payload);
        if result.is_err() {
            METRICS.inc_protocol_violations();
        }
        result
    }

    fn dispatch_inner(
        &self,
        raw_id: &str,
        payload: &Value,
    ) -> Result<HookDisposition, ProtocolViolation> {
        let unknown = || ProtocolViolation::UnknownCorrelation(raw_id.to_string());
        let id = CorrelationId::parse(raw_id).map_err(|_| unknown())?;
        let hook = self.get(&id).ok_or_else(unknown)?;

        if let Some(next_hook) = hook.event.web_hook.as_deref() {
            self.forward(next_hook, payload);
        }

        let notification = HookNotification::decode(payload).map_err(|source| {
            ProtocolViolation::MalformedNotification {
                id: id.clone(),
                source,
            }
        })?;
        debug!(
            "Hook {} received {} for event {}",
            id,
            notification.action(),
            hook.event.title
        );

        let disposition = hook.apply(self, &id, notification)?;
        if disposition == HookDisposition::Finished {
            self.remove(&id);
        }
        Ok(disposition)
    }

    /// Best-effort copy of the raw notification to the event's own webhook.
    fn forward(&self, url: &str, payload: &Value) {
        let agent = self.forwarder.clone();
        let target = url.to_string();
        let body = payload.to_string();
        let spawned = thread::Builder::new()
            .name("cadence-hook-forward".to_string())
            .spawn(move || {
                if let Err(e) = agent
                    .post(&target)
                    .set("Content-Type", "application/json")
                    .send_string(&body)
                {
                    METRICS.inc_forwards_failed();
                    debug!("Forwarding notification to {} failed: {}", target, e);
                }
            });
        if let Err(e) = spawned {
            METRICS.inc_forwards_failed();
            warn!("Could not spawn notification forwarder: {}", e);
        }
    }
}

/// Local webhook listener plus the registry it dispatches into.
///
/// Construct once per process and share by reference; dropping it stops the
/// listener thread.
pub struct WebhookCorrelator {
    api: Arc<dyn SchedulerApi>,
    registry: Arc<HookRegistry>,
    local_addr: SocketAddr,
    callback_base: String,
    listener: Option<ListenerHandle>,
}

impl WebhookCorrelator {
    /// Bind the listener and start its thread.
    pub fn start(api: Arc<dyn SchedulerApi>, config: HookConfig) -> Result<Self, SchedulerError> {
        let registry = HookRegistry::new(Arc::clone(&api), config.retry);
        let (local_addr, listener) = spawn_listener(&config.bind_host, Arc::clone(&registry))?;
        let callback_base = format!("http://{}:{}", config.callback_host(), local_addr.port());

        Ok(Self {
            api,
            registry,
            local_addr,
            callback_base,
            listener: Some(listener),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn callback_url(&self, id: &CorrelationId) -> String {
        format!("{}/{}", self.callback_base, id)
    }

    /// Number of runs still waiting on a notification.
    pub fn pending(&self) -> usize {
        self.registry.len()
    }

    pub fn register(&self, event: Event, queued_job: Arc<QueuedJob>) -> HookRegistration {
        let correlation_id = self.registry.insert(event, queued_job);
        let callback_url = self.callback_url(&correlation_id);
        HookRegistration {
            correlation_id,
            callback_url,
        }
    }

    pub fn deregister(&self, id: &CorrelationId) -> bool {
        self.registry.remove(id)
    }

    /// Start `event` on the scheduler with a callback URL routed to us.
    pub fn start_event(&self, event: &Event) -> Result<Arc<QueuedJob>, SchedulerError> {
        if event.multiplex {
            return Err(ConfigError::Multiplexed(event.title.clone()).into());
        }

        let queued_job = Arc::new(QueuedJob::new(event.clone()));
        let registration = self.register(event.clone(), Arc::clone(&queued_job));

        match self
            .api
            .run_event(&event.id, Some(&registration.callback_url))
        {
            Ok(job_ids) => {
                METRICS.inc_events_started();
                debug!(
                    "Started event {} (jobs {:?}), callback {}",
                    event.title, job_ids, registration.callback_url
                );
                Ok(queued_job)
            }
            Err(e) => {
                self.deregister(&registration.correlation_id);
                Err(e.into())
            }
        }
    }

    /// Dispatch a notification as if it had arrived over HTTP.
    pub fn handle_notification(
        &self,
        correlation_id: &str,
        payload: &Value,
    ) -> Result<HookDisposition, ProtocolViolation> {
        self.registry.dispatch(correlation_id, payload)
    }

    /// Stop the listener and join its thread. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(mut listener) = self.listener.take() {
            listener.stop();
            debug!("Webhook listener on {} stopped", self.local_addr);
        }
    }
}

impl Drop for WebhookCorrelator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
