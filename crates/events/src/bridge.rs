//! WebSocket bridge from the backend's push socket onto the [`EventBus`].
//!
//! The backend announces state changes with text frames of the form
//! `{"type": "command_changed", "id": "<correlation id>"}`. Each valid
//! frame becomes one [`CommandChanged`] on the bus. Everything else is
//! logged and dropped.

use std::time::Duration;

use futures::StreamExt;
use serde::Deserialize;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream};
use tokio_util::sync::CancellationToken;

use cmdwatch_core::message_types::MSG_TYPE_COMMAND_CHANGED;
use cmdwatch_core::CorrelationId;

use crate::bus::{CommandChanged, EventBus};

/// Live WebSocket stream to the push socket.
pub type PushStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Incoming frame envelope, tagged by `type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum IncomingMessage {
    #[serde(rename = "command_changed")]
    CommandChanged { id: String },
}

/// Errors that can occur when working with the push socket.
#[derive(Debug, thiserror::Error)]
pub enum PushBridgeError {
    /// Failed to establish the WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),
}

/// Retry pacing for the push socket.
///
/// The wait between attempts starts at `retry_floor` and grows by
/// `retry_growth` after every failed connect, up to `retry_ceiling`. Once a
/// session has been established the wait drops back to `retry_floor`.
/// Commands keep making progress through the watchdog while the socket is
/// down, so the ceiling only bounds how long push latency stays degraded.
#[derive(Debug, Clone)]
pub struct PushBridgeConfig {
    pub retry_floor: Duration,
    pub retry_ceiling: Duration,
    /// Must be at least 1.0.
    pub retry_growth: f64,
}

impl Default for PushBridgeConfig {
    fn default() -> Self {
        Self {
            retry_floor: Duration::from_secs(1),
            retry_ceiling: Duration::from_secs(30),
            retry_growth: 2.0,
        }
    }
}

/// Connection handle for the backend's push socket.
pub struct PushBridge {
    ws_url: String,
    config: PushBridgeConfig,
}

impl PushBridge {
    /// Create a bridge targeting `ws_url`, e.g. `ws://host:8080/ws/commands`.
    pub fn new(ws_url: String) -> Self {
        Self::with_config(ws_url, PushBridgeConfig::default())
    }

    pub fn with_config(ws_url: String, config: PushBridgeConfig) -> Self {
        Self { ws_url, config }
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Connect to the push socket.
    ///
    /// Generates a unique `client_id` (UUID v4) and appends it as a query
    /// parameter so the backend can address this console instance.
    pub async fn connect(&self) -> Result<PushStream, PushBridgeError> {
        let client_id = uuid::Uuid::new_v4().to_string();
        let separator = if self.ws_url.contains('?') { '&' } else { '?' };
        let url = format!("{}{separator}client_id={client_id}", self.ws_url);

        let (ws_stream, _response) = connect_async(&url).await.map_err(|e| {
            PushBridgeError::Connection(format!(
                "Failed to connect to push socket at {}: {e}",
                self.ws_url
            ))
        })?;

        tracing::info!(client_id = %client_id, "Connected to push socket at {}", self.ws_url);
        Ok(ws_stream)
    }

    /// Keep a session open and forward its frames onto `bus`, opening a
    /// new one whenever the socket drops or cannot be reached. Runs until
    /// `cancel` is triggered.
    pub async fn run(&self, bus: &EventBus, cancel: CancellationToken) {
        let mut retry_in = self.config.retry_floor;
        let mut failures = 0u32;

        loop {
            let connected = tokio::select! {
                _ = cancel.cancelled() => break,
                connected = self.connect() => connected,
            };

            let wait = match connected {
                Ok(mut stream) => {
                    failures = 0;
                    retry_in = self.config.retry_floor;
                    let published = forward_frames(&mut stream, bus, &cancel).await;
                    tracing::info!(published, "Push session ended");
                    retry_in
                }
                Err(e) => {
                    failures += 1;
                    let wait = retry_in;
                    retry_in = retry_in
                        .mul_f64(self.config.retry_growth)
                        .min(self.config.retry_ceiling);
                    tracing::warn!(
                        error = %e,
                        failures,
                        retry_in_ms = wait.as_millis() as u64,
                        "Push socket unavailable",
                    );
                    wait
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        tracing::info!(url = %self.ws_url, "Push bridge stopped");
    }
}

/// Read frames until the socket closes, errors, or `cancel` fires.
/// Returns how many notifications were published.
async fn forward_frames(stream: &mut PushStream, bus: &EventBus, cancel: &CancellationToken) -> usize {
    let mut published = 0;
    loop {
        let msg = tokio::select! {
            _ = cancel.cancelled() => return published,
            msg = stream.next() => msg,
        };

        match msg {
            Some(Ok(Message::Text(text))) => {
                if let Some(id) = parse_frame(&text) {
                    let event = CommandChanged::new(id);
                    tracing::debug!(
                        event = event.event_type(),
                        correlation_id = %event.correlation_id,
                        "Push notification received",
                    );
                    bus.publish(event);
                    published += 1;
                }
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                // Handled automatically by tungstenite.
            }
            Some(Ok(Message::Close(frame))) => {
                tracing::info!(?frame, "Push socket closed");
                return published;
            }
            Some(Ok(_)) => {
                // Binary / Frame — ignore.
            }
            Some(Err(e)) => {
                tracing::error!(error = %e, "Push socket receive error");
                return published;
            }
            None => {
                tracing::info!("Push socket stream exhausted");
                return published;
            }
        }
    }
}

/// Parse one text frame into the correlation id it announces.
pub fn parse_frame(text: &str) -> Option<CorrelationId> {
    match serde_json::from_str::<IncomingMessage>(text) {
        Ok(IncomingMessage::CommandChanged { id }) => match CorrelationId::parse(&id) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(error = %e, kind = MSG_TYPE_COMMAND_CHANGED, "Dropping push frame");
                None
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, raw = %text, "Unknown or malformed push frame");
            None
        }
    }
}
