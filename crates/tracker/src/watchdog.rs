//! Periodic re-check of every pending command.
//!
//! Push delivery is best-effort, so [`Watchdog`] polls every id in the
//! registry once per period regardless of push activity. This bounds how
//! stale a completed-but-unnoticed command can get to one period.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::fetcher::{FetchOutcome, ResultFetcher};
use crate::registry::PendingRegistry;

pub struct Watchdog {
    fetcher: Arc<ResultFetcher>,
    registry: Arc<PendingRegistry>,
    period: Duration,
}

impl Watchdog {
    pub fn new(fetcher: Arc<ResultFetcher>, registry: Arc<PendingRegistry>, period: Duration) -> Self {
        Self {
            fetcher,
            registry,
            period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Poll every currently pending id once, concurrently.
    ///
    /// Returns the outcome of each poll; its length is the number of ids
    /// that were pending when the sweep started.
    pub async fn sweep(&self) -> Vec<FetchOutcome> {
        let ids = self.registry.ids().await;
        if ids.is_empty() {
            return Vec::new();
        }

        tracing::debug!(count = ids.len(), "Watchdog sweep");
        join_all(ids.iter().map(|id| self.fetcher.fetch(id))).await
    }

    /// Run a sweep every period until `cancel` fires.
    ///
    /// The first sweep happens one full period after start. A sweep that
    /// outlasts the period delays the next one instead of bunching ticks.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(period_secs = self.period.as_secs(), "Watchdog started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Watchdog cancelled");
                    break;
                }
                _ = interval.tick() => {
                    let outcomes = self.sweep().await;
                    let resolved = outcomes
                        .iter()
                        .filter(|o| matches!(o, FetchOutcome::Resolved(_)))
                        .count();
                    if resolved > 0 {
                        tracing::info!(polled = outcomes.len(), resolved, "Watchdog resolved commands");
                    }
                }
            }
        }
    }
}
