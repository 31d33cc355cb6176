//! Push-notification plumbing for cmdwatch.
//!
//! - [`EventBus`] — in-process publish/subscribe hub carrying
//!   [`CommandChanged`] notifications, backed by `tokio::sync::broadcast`.
//! - [`PushBridge`] — WebSocket client that feeds the bus from the
//!   backend's push socket, reconnecting with exponential back-off.
//!
//! Delivery is best-effort end to end: frames may be dropped by the
//! backend, the socket may be down, and slow subscribers lag.

pub mod bridge;
pub mod bus;

pub use bridge::{PushBridge, PushBridgeConfig, PushBridgeError};
pub use bus::{CommandChanged, EventBus};
