//! Wire constants shared by the push bridge and its peers.

/// `type` tag of a push frame announcing that a command may have changed.
pub const MSG_TYPE_COMMAND_CHANGED: &str = "command_changed";

/// Event name under which command-changed notifications travel on the bus.
pub const EVENT_COMMAND_CHANGED: &str = "command.changed";
