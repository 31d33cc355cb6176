//! Shared types for the cmdwatch command-tracking subsystem.
//!
//! Holds the launch/poll wire envelope, correlation ids, the tri-state
//! command status and the helper callers use to pull the error detail
//! out of a failed command. Nothing in this crate performs I/O.

pub mod command;
pub mod error;
pub mod extract;
pub mod message_types;
pub mod types;

pub use command::{CommandResponse, CommandResult, CommandStatus, STATUS_OK};
pub use extract::{extract_error, extract_error_message};
pub use types::CorrelationId;
