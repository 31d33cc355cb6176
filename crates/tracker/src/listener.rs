//! Push-driven result fetching.
//!
//! [`PushListener`] consumes [`CommandChanged`] notifications from the bus
//! and polls every announced id that is still pending. Ids that are not in
//! the registry are ignored; there is no buffering, so a notification that
//! arrives before its command has been registered is lost and left to the
//! watchdog.

use std::sync::Arc;

use cmdwatch_events::CommandChanged;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::fetcher::ResultFetcher;
use crate::registry::PendingRegistry;

pub struct PushListener {
    fetcher: Arc<ResultFetcher>,
    registry: Arc<PendingRegistry>,
}

impl PushListener {
    pub fn new(fetcher: Arc<ResultFetcher>, registry: Arc<PendingRegistry>) -> Self {
        Self { fetcher, registry }
    }

    /// Handle one notification. Returns `true` if a fetch was started.
    ///
    /// The fetch runs on `tasks` so a slow poll never holds up the
    /// notifications behind it.
    pub async fn handle(&self, event: CommandChanged, tasks: &TaskTracker) -> bool {
        let id = event.correlation_id;
        if !self.registry.contains(&id).await {
            tracing::debug!(correlation_id = %id, "Push for unknown command ignored");
            return false;
        }

        tracing::debug!(correlation_id = %id, "Push received, fetching result");
        let fetcher = Arc::clone(&self.fetcher);
        tasks.spawn(async move {
            fetcher.fetch(&id).await;
        });
        true
    }

    /// Consume notifications until `cancel` fires or the bus closes, then
    /// wait for the fetches it started.
    pub async fn run(&self, mut rx: broadcast::Receiver<CommandChanged>, cancel: CancellationToken) {
        let tasks = TaskTracker::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Push listener cancelled");
                    break;
                }
                received = rx.recv() => match received {
                    Ok(event) => {
                        self.handle(event, &tasks).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Push listener lagged, watchdog will catch up");
                    }
                    Err(RecvError::Closed) => {
                        tracing::info!("Event bus closed, push listener exiting");
                        break;
                    }
                }
            }
        }

        tasks.close();
        tasks.wait().await;
    }
}
