//! Single status poll for one pending command.
//!
//! [`ResultFetcher::fetch`] is shared by the push listener and the
//! watchdog. Both may poll the same id at the same time; whichever call
//! wins [`PendingRegistry::take`] resolves the entry, the other one
//! observes [`FetchOutcome::AlreadyResolved`] and does nothing.
//!
//! Poll failures are swallowed here. The entry stays pending and is
//! retried on the next push event or watchdog tick, without any error
//! counter or back-off: a status endpoint that never answers leaves the
//! command pending until teardown.

use std::sync::Arc;

use cmdwatch_core::{CommandResponse, CommandStatus, CorrelationId};
use tokio_util::sync::CancellationToken;

use crate::api::{JobService, JobServiceError};
use crate::registry::{CommandOutcome, PendingRegistry};

/// Why a poll did not produce a usable status.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error(transparent)]
    Transport(#[from] JobServiceError),

    #[error("Status query rejected: {status}")]
    Rejected { status: String },

    #[error("Status response carries no result")]
    MissingResult,
}

/// What a single [`ResultFetcher::fetch`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The command is still running; nothing happened.
    Pending,
    /// The command was terminal and this call resolved its entry.
    Resolved(CommandStatus),
    /// The command was terminal but its entry was already gone.
    AlreadyResolved,
    /// The poll failed; the entry stays pending.
    Unreachable,
    /// The tracker was torn down before the poll finished.
    Cancelled,
}

/// Polls the job service and resolves pending entries.
pub struct ResultFetcher {
    service: Arc<dyn JobService>,
    registry: Arc<PendingRegistry>,
    cancel: CancellationToken,
}

impl ResultFetcher {
    pub fn new(
        service: Arc<dyn JobService>,
        registry: Arc<PendingRegistry>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            service,
            registry,
            cancel,
        }
    }

    /// Poll `id` once and act on the answer.
    pub async fn fetch(&self, id: &CorrelationId) -> FetchOutcome {
        let polled = tokio::select! {
            _ = self.cancel.cancelled() => return FetchOutcome::Cancelled,
            polled = self.poll(id) => polled,
        };

        let (response, status) = match polled {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!(correlation_id = %id, error = %e, "Status poll failed, will retry");
                return FetchOutcome::Unreachable;
            }
        };

        if !status.is_terminal() {
            tracing::debug!(correlation_id = %id, "Command still pending");
            return FetchOutcome::Pending;
        }

        // A poll that resolves after teardown must not reach the callbacks.
        if self.cancel.is_cancelled() {
            return FetchOutcome::Cancelled;
        }

        let Some(entry) = self.registry.take(id).await else {
            tracing::debug!(correlation_id = %id, "Command already resolved elsewhere");
            return FetchOutcome::AlreadyResolved;
        };

        let outcome = match status {
            CommandStatus::Failed => CommandOutcome::Failed(response),
            _ => CommandOutcome::Succeeded(response),
        };

        tracing::info!(
            correlation_id = %id,
            success = outcome.is_success(),
            "Command completed",
        );
        entry.resolve(outcome);

        FetchOutcome::Resolved(status)
    }

    /// Query the service and validate the envelope.
    async fn poll(&self, id: &CorrelationId) -> Result<(CommandResponse, CommandStatus), PollError> {
        let response = self.service.poll(id).await?;

        if !response.is_ok() {
            return Err(PollError::Rejected {
                status: response.status,
            });
        }

        let status = response
            .result
            .as_ref()
            .map(|r| r.status())
            .ok_or(PollError::MissingResult)?;

        Ok((response, status))
    }
}
