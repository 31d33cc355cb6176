//! Entry point for launching tracked commands.
//!
//! [`CommandIssuer::launch`] runs a caller-supplied submit thunk, checks
//! the immediate response and, if the command is still running, registers
//! its callback pair in the [`PendingRegistry`].
//!
//! A command that the service reports as already done (`is_done: true`)
//! is resolved on the spot and never registered, so a later push event or
//! watchdog sweep cannot dispatch it a second time.

use std::future::Future;
use std::sync::Arc;

use cmdwatch_core::{CommandResponse, CommandStatus, CorrelationId};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::api::JobService;
use crate::registry::{CommandOutcome, PendingEntry, PendingRegistry};

/// Errors surfaced to the caller of a launch. None of them leaves an
/// entry in the registry.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    /// The service answered with a `status` other than `"ok"`.
    #[error("Launch rejected with status {status:?}")]
    Rejected {
        status: String,
        response: CommandResponse,
    },

    /// The service accepted the launch but returned no command.
    #[error("Launch response carries no result")]
    MissingResult,

    /// The submit call itself failed.
    #[error("Launch request failed: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The tracker has been torn down.
    #[error("Command tracker is not active")]
    Inactive,
}

/// How a successful launch was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Launched {
    /// The command is running and now tracked under its id.
    Tracking(CorrelationId),
    /// The command finished during launch; its callback already ran.
    Completed(CorrelationId),
}

impl Launched {
    pub fn id(&self) -> &CorrelationId {
        match self {
            Self::Tracking(id) | Self::Completed(id) => id,
        }
    }
}

/// Handle returned by [`CommandIssuer::launch_and_wait`].
#[derive(Debug)]
pub struct CommandHandle {
    pub launched: Launched,
    outcome: oneshot::Receiver<CommandOutcome>,
}

impl CommandHandle {
    pub fn id(&self) -> &CorrelationId {
        self.launched.id()
    }

    /// Wait for the terminal outcome. `None` means the tracker was torn
    /// down before the command resolved.
    pub async fn wait(self) -> Option<CommandOutcome> {
        self.outcome.await.ok()
    }
}

/// Launches commands and registers them for tracking.
pub struct CommandIssuer {
    service: Arc<dyn JobService>,
    registry: Arc<PendingRegistry>,
    cancel: CancellationToken,
}

impl CommandIssuer {
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

    /// Run `submit` and track the command it launched.
    ///
    /// `submit` performs the actual network call, which lets callers pick
    /// the endpoint and payload while reusing the tracking logic.
    pub async fn launch<F, Fut, E, S, X>(
        &self,
        submit: F,
        on_success: S,
        on_failure: X,
    ) -> Result<Launched, LaunchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CommandResponse, E>>,
        E: std::error::Error + Send + Sync + 'static,
        S: FnOnce(CommandResponse) + Send + 'static,
        X: FnOnce(CommandResponse) + Send + 'static,
    {
        self.launch_entry(submit, PendingEntry::new(on_success, on_failure))
            .await
    }

    /// Launch through the tracker's own [`JobService`].
    pub async fn launch_with<S, X>(
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
        let service = Arc::clone(&self.service);
        self.launch(
            || async move { service.launch(path, body).await },
            on_success,
            on_failure,
        )
        .await
    }

    /// Run `submit` and hand back a [`CommandHandle`] to await the outcome.
    pub async fn launch_and_wait<F, Fut, E>(&self, submit: F) -> Result<CommandHandle, LaunchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CommandResponse, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let entry = PendingEntry::from_outcome(move |outcome| {
            // The receiver may have been dropped; nobody is waiting then.
            let _ = tx.send(outcome);
        });

        let launched = self.launch_entry(submit, entry).await?;
        Ok(CommandHandle {
            launched,
            outcome: rx,
        })
    }

    /// [`launch_and_wait`](Self::launch_and_wait) through the tracker's
    /// own [`JobService`].
    pub async fn launch_and_wait_with(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<CommandHandle, LaunchError> {
        let service = Arc::clone(&self.service);
        self.launch_and_wait(|| async move { service.launch(path, body).await })
            .await
    }

    async fn launch_entry<F, Fut, E>(&self, submit: F, entry: PendingEntry) -> Result<Launched, LaunchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CommandResponse, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        if self.cancel.is_cancelled() {
            return Err(LaunchError::Inactive);
        }

        let response = submit().await.map_err(|e| {
            tracing::error!(error = %e, "Launch request failed");
            LaunchError::Transport(Box::new(e))
        })?;

        if !response.is_ok() {
            tracing::error!(status = %response.status, "Launch rejected");
            return Err(LaunchError::Rejected {
                status: response.status.clone(),
                response,
            });
        }

        let Some(result) = response.result.as_ref() else {
            tracing::error!("Launch accepted without a result");
            return Err(LaunchError::MissingResult);
        };
        let id = result.id.clone();
        let status = result.status();

        if status.is_terminal() {
            tracing::info!(correlation_id = %id, "Command completed during launch");
            let outcome = match status {
                CommandStatus::Failed => CommandOutcome::Failed(response),
                _ => CommandOutcome::Succeeded(response),
            };
            entry.resolve(outcome);
            return Ok(Launched::Completed(id));
        }

        // Refused once teardown has closed the registry.
        match self.registry.insert(id.clone(), entry).await {
            Ok(Some(_)) => {
                tracing::warn!(correlation_id = %id, "Replaced an existing pending entry");
            }
            Ok(None) => {}
            Err(_) => {
                tracing::warn!(
                    correlation_id = %id,
                    "Tracker torn down during launch, command untracked"
                );
                return Err(LaunchError::Inactive);
            }
        }
        tracing::info!(correlation_id = %id, "Command launched, tracking");

        Ok(Launched::Tracking(id))
    }
}
