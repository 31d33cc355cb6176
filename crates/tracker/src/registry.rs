//! Registry of commands that have been launched but not yet resolved.
//!
//! [`PendingRegistry`] maps each correlation id to the callback pair that
//! must run when the command reaches a terminal state. It is the single
//! source of truth for what is still outstanding: an id leaves the map
//! exactly once, through [`PendingRegistry::take`], and only the caller
//! that won the take may run the callbacks.

use std::collections::HashMap;

use cmdwatch_core::{CommandResponse, CorrelationId};
use tokio::sync::RwLock;

/// Terminal outcome delivered to a pending entry.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// The command completed successfully. Carries the full response.
    Succeeded(CommandResponse),
    /// The command completed with a business failure. Carries the full
    /// response; the error detail is `result.results[0]`.
    Failed(CommandResponse),
}

impl CommandOutcome {
    pub fn response(&self) -> &CommandResponse {
        match self {
            Self::Succeeded(r) | Self::Failed(r) => r,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }
}

type Resolver = Box<dyn FnOnce(CommandOutcome) + Send + 'static>;

/// Callback pair registered for one correlation id.
///
/// Consumed by [`resolve`](Self::resolve), so it can run at most once.
pub struct PendingEntry {
    resolver: std::sync::Mutex<Resolver>,
}

impl PendingEntry {
    /// Pair a success and a failure callback.
    pub fn new<S, F>(on_success: S, on_failure: F) -> Self
    where
        S: FnOnce(CommandResponse) + Send + 'static,
        F: FnOnce(CommandResponse) + Send + 'static,
    {
        Self::from_outcome(move |outcome| match outcome {
            CommandOutcome::Succeeded(response) => on_success(response),
            CommandOutcome::Failed(response) => on_failure(response),
        })
    }

    /// Use a single callback that receives the outcome either way.
    pub fn from_outcome<C>(callback: C) -> Self
    where
        C: FnOnce(CommandOutcome) + Send + 'static,
    {
        Self {
            resolver: std::sync::Mutex::new(Box::new(callback)),
        }
    }

    /// Invoke the callback matching `outcome`.
    pub fn resolve(self, outcome: CommandOutcome) {
        let resolver = self
            .resolver
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        resolver(outcome);
    }
}

impl std::fmt::Debug for PendingEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingEntry").finish_non_exhaustive()
    }
}

/// Returned by [`PendingRegistry::insert`] once the registry is closed.
#[derive(Debug, thiserror::Error)]
#[error("Pending registry is closed")]
pub struct RegistryClosed;

#[derive(Debug, Default)]
struct Entries {
    by_id: HashMap<CorrelationId, PendingEntry>,
    closed: bool,
}

/// Instance-owned map from correlation id to [`PendingEntry`].
///
/// Created by the tracker on activation and closed on teardown. Shared by
/// reference (`Arc`) with the issuer, the fetcher, the listener and the
/// watchdog.
#[derive(Debug, Default)]
pub struct PendingRegistry {
    entries: RwLock<Entries>,
}

impl PendingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `entry` under `id`.
    ///
    /// At most one entry exists per id; a previous entry is replaced and
    /// returned so the caller can decide what to do with it. Once the
    /// registry is closed nothing is accepted and `entry` is dropped.
    pub async fn insert(
        &self,
        id: CorrelationId,
        entry: PendingEntry,
    ) -> Result<Option<PendingEntry>, RegistryClosed> {
        let mut entries = self.entries.write().await;
        if entries.closed {
            return Err(RegistryClosed);
        }
        Ok(entries.by_id.insert(id, entry))
    }

    /// Atomically remove the entry for `id`.
    ///
    /// Returns `None` if the id is unknown or another caller already took
    /// it. Only a `Some` result entitles the caller to resolve the entry.
    pub async fn take(&self, id: &CorrelationId) -> Option<PendingEntry> {
        self.entries.write().await.by_id.remove(id)
    }

    pub async fn contains(&self, id: &CorrelationId) -> bool {
        self.entries.read().await.by_id.contains_key(id)
    }

    /// Snapshot of every id currently pending, in no particular order.
    pub async fn ids(&self) -> Vec<CorrelationId> {
        self.entries.read().await.by_id.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.by_id.is_empty()
    }

    pub async fn is_closed(&self) -> bool {
        self.entries.read().await.closed
    }

    /// Refuse further inserts and drop every entry without invoking its
    /// callbacks. Returns how many entries were discarded.
    pub async fn close(&self) -> usize {
        let mut entries = self.entries.write().await;
        entries.closed = true;
        let count = entries.by_id.len();
        entries.by_id.clear();
        count
    }
}
