//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the single-topic hub for [`CommandChanged`]
//! notifications. It is designed to be shared via `Arc<EventBus>` between
//! whatever feeds it (the push bridge, tests) and the tracker's listener.

use chrono::{DateTime, Utc};
use cmdwatch_core::message_types::EVENT_COMMAND_CHANGED;
use cmdwatch_core::CorrelationId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// CommandChanged
// ---------------------------------------------------------------------------

/// Notification that the command identified by `correlation_id` may have
/// changed state. Carries no status; receivers must poll to find out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandChanged {
    pub correlation_id: CorrelationId,

    /// When the notification entered this process (UTC).
    pub received_at: DateTime<Utc>,
}

impl CommandChanged {
    pub fn new(correlation_id: impl Into<CorrelationId>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            received_at: Utc::now(),
        }
    }

    /// Dot-separated event name used in logs.
    pub fn event_type(&self) -> &'static str {
        EVENT_COMMAND_CHANGED
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out bus for command-changed notifications.
///
/// # Usage
///
/// ```rust
/// use cmdwatch_events::bus::{CommandChanged, EventBus};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(CommandChanged::new("cmd1"));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<CommandChanged>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed notifications are
    /// dropped and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a notification to all current subscribers.
    ///
    /// If there are no active subscribers the notification is silently
    /// dropped; nothing is buffered for future subscribers.
    pub fn publish(&self, event: CommandChanged) {
        // Ignore the SendError — it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all notifications published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<CommandChanged> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
