//! Wiring shared by every front end: client, listener, runner.

use cadence_scheduler::{
    CompletedEvent, HookConfig, PollingConfig, Result, SchedulerApi, SchedulerClient,
    SequenceReporter, SequenceRunner, WebhookCorrelator,
};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub api_host: String,
    pub api_key: String,
    pub bind_host: Option<String>,
    pub advertise_host: Option<String>,
    pub polling: PollingConfig,
}

impl SessionConfig {
    fn hook_config(&self) -> HookConfig {
        let defaults = HookConfig::default();
        HookConfig {
            bind_host: self.bind_host.clone().unwrap_or(defaults.bind_host),
            advertise_host: self.advertise_host.clone(),
            retry: self.polling.retry_policy(),
        }
    }
}

/// Connect to the scheduler and run `titles` in order.
///
/// The webhook listener lives for the duration of the call and is shut down
/// before returning.
pub fn run_sequence<S: AsRef<str>>(
    config: &SessionConfig,
    titles: &[S],
    reporter: &mut dyn SequenceReporter,
) -> Result<Vec<CompletedEvent>> {
    let client = SchedulerClient::new(&config.api_host, config.api_key.clone())?;
    info!("Using scheduler API at {}", client.api_url());

    let api: Arc<dyn SchedulerApi> = Arc::new(client);
    let mut hooks = WebhookCorrelator::start(Arc::clone(&api), config.hook_config())?;
    let result = SequenceRunner::new(api, &hooks, config.polling).execute(titles, reporter);
    hooks.shutdown();
    result
}
