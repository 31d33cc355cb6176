//! Lifetime owner of the command-tracking subsystem.
//!
//! [`CommandTracker::activate`] builds the registry, subscribes the push
//! listener to the bus once and starts the watchdog, each on its own task
//! under a child of the tracker's master [`CancellationToken`].
//! [`CommandTracker::teardown`] cancels that token, waits for both tasks
//! and closes the registry, dropping every pending entry without running
//! its callbacks.

use std::sync::Arc;
use std::time::Duration;

use cmdwatch_core::{CommandResponse, CorrelationId};
use cmdwatch_events::EventBus;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::JobService;
use crate::config::TrackerConfig;
use crate::fetcher::ResultFetcher;
use crate::issuer::{CommandHandle, CommandIssuer, LaunchError, Launched};
use crate::listener::PushListener;
use crate::registry::PendingRegistry;
use crate::watchdog::Watchdog;

/// How long teardown waits for each background task.
const TASK_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Active command-tracking subsystem.
///
/// Created via [`CommandTracker::activate`]; the returned `Arc` can be
/// cloned into whatever needs to launch commands.
pub struct CommandTracker {
    registry: Arc<PendingRegistry>,
    issuer: CommandIssuer,
    fetcher: Arc<ResultFetcher>,
    /// Background tasks (push listener, watchdog) by name.
    tasks: Mutex<Vec<(&'static str, JoinHandle<()>)>>,
    /// Master cancellation token -- cancelled during teardown.
    cancel: CancellationToken,
}

impl CommandTracker {
    /// Start tracking: subscribe to `bus` and start the watchdog.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn activate(
        service: Arc<dyn JobService>,
        bus: &EventBus,
        config: &TrackerConfig,
    ) -> Arc<Self> {
        let cancel = CancellationToken::new();
        let registry = Arc::new(PendingRegistry::new());
        let fetcher = Arc::new(ResultFetcher::new(
            Arc::clone(&service),
            Arc::clone(&registry),
            cancel.clone(),
        ));
        let issuer = CommandIssuer::new(service, Arc::clone(&registry), cancel.clone());

        let listener = PushListener::new(Arc::clone(&fetcher), Arc::clone(&registry));
        let rx = bus.subscribe();
        let listener_cancel = cancel.child_token();
        let listener_task = tokio::spawn(async move {
            listener.run(rx, listener_cancel).await;
        });

        let watchdog = Watchdog::new(
            Arc::clone(&fetcher),
            Arc::clone(&registry),
            config.watchdog_period,
        );
        let watchdog_cancel = cancel.child_token();
        let watchdog_task = tokio::spawn(async move {
            watchdog.run(watchdog_cancel).await;
        });

        tracing::info!(
            watchdog_secs = config.watchdog_period.as_secs(),
            "Command tracker activated",
        );

        Arc::new(Self {
            registry,
            issuer,
            fetcher,
            tasks: Mutex::new(vec![
                ("push_listener", listener_task),
                ("watchdog", watchdog_task),
            ]),
            cancel,
        })
    }

    pub fn issuer(&self) -> &CommandIssuer {
        &self.issuer
    }

    pub fn registry(&self) -> &Arc<PendingRegistry> {
        &self.registry
    }

    /// Fetcher shared by the listener and the watchdog, for callers that
    /// want to force a re-check of one id.
    pub fn fetcher(&self) -> &Arc<ResultFetcher> {
        &self.fetcher
    }

    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Ids of every command still awaiting a terminal result.
    pub async fn pending_ids(&self) -> Vec<CorrelationId> {
        self.registry.ids().await
    }

    /// Launch through the tracker's [`JobService`] with a callback pair.
    pub async fn launch<S, X>(
        &self,
        path: &str,
        body: &serde_json::Value,
        on_success: S,
        on_failure: X,
    ) -> Result<Launched, LaunchError>
    where
        S: FnOnce(CommandResponse) + Send + 'static,
        X: FnOnce(CommandResponse) + Send + 'static,
    {
        self.issuer
            .launch_with(path, body, on_success, on_failure)
            .await
    }

    /// Launch through the tracker's [`JobService`] and get a handle to
    /// await the outcome.
    pub async fn launch_and_wait(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<CommandHandle, LaunchError> {
        self.issuer.launch_and_wait_with(path, body).await
    }

    /// Stop the listener and the watchdog and drop all pending entries.
    ///
    /// Polls still in flight resolve into no-ops. Calling this twice is
    /// harmless.
    pub async fn teardown(&self) {
        tracing::info!("Tearing down command tracker");
        self.cancel.cancel();
        let dropped = self.registry.close().await;

        let mut tasks = self.tasks.lock().await;
        for (name, handle) in tasks.drain(..) {
            if tokio::time::timeout(TASK_SHUTDOWN_TIMEOUT, handle).await.is_err() {
                tracing::warn!(task = name, "Background task did not stop in time");
            }
        }

        tracing::info!(dropped, "Command tracker torn down");
    }
}
