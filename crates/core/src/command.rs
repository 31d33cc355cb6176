//! Launch and poll response envelope.
//!
//! The job-launching service answers both the launch request and every
//! status query with the same shape:
//!
//! ```json
//! { "status": "ok", "result": { "id": "cmd1", "is_done": true, "failed": false, "results": [] } }
//! ```
//!
//! Any `status` other than `"ok"` means the request itself was rejected.

use serde::{Deserialize, Serialize};

use crate::types::CorrelationId;

/// The only `status` value that marks an accepted request.
pub const STATUS_OK: &str = "ok";

/// Full response body from a launch or poll call.
///
/// This is what `on_success` / `on_failure` callbacks receive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<CommandResult>,
}

/// Server-side view of one command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub id: CorrelationId,
    /// `false` while the command is still running.
    pub is_done: bool,
    /// Only meaningful once `is_done` is set.
    #[serde(default)]
    pub failed: bool,
    /// One payload per underlying unit of work, in order. On failure the
    /// first entry carries the error detail.
    #[serde(default)]
    pub results: Vec<serde_json::Value>,
}

/// Tri-state completion status of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Pending,
    Succeeded,
    Failed,
}

impl CommandStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl CommandResult {
    pub fn status(&self) -> CommandStatus {
        match (self.is_done, self.failed) {
            (false, _) => CommandStatus::Pending,
            (true, false) => CommandStatus::Succeeded,
            (true, true) => CommandStatus::Failed,
        }
    }
}

impl CommandResponse {
    /// Build an accepted response around `result`.
    pub fn ok(result: CommandResult) -> Self {
        Self {
            status: STATUS_OK.to_string(),
            result: Some(result),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }

    /// Status of the wrapped command, or `None` when the envelope was
    /// rejected or carries no result.
    pub fn command_status(&self) -> Option<CommandStatus> {
        if !self.is_ok() {
            return None;
        }
        self.result.as_ref().map(CommandResult::status)
    }
}
