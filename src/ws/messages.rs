//! WebSocket wire messages.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Top-level WebSocket message envelope. Server to client only; inbound
/// frames are parsed field-by-field by the event router.
#[derive(Debug, Clone, Serialize)]
pub struct WsMessage {
    /// Server-generated message ID.
    pub id: String,
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub msg_type: WsMessageType,
    /// ISO-8601 timestamp.
    pub timestamp: DateTime<Utc>,
    /// Variant-specific payload.
    pub payload: serde_json::Value,
}

/// Discriminator for WebSocket message types.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WsMessageType {
    /// Server → Client pushed event (notifications, acks).
    Event,
    /// Server → Client error.
    Error,
}

impl WsMessage {
    /// Builds an event message carrying a named payload.
    #[must_use]
    pub fn event(event: &str, data: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            msg_type: WsMessageType::Event,
            timestamp: Utc::now(),
            payload: serde_json::json!({
                "event": event,
                "data": data,
            }),
        }
    }

    /// Builds an error message with a numeric code.
    #[must_use]
    pub fn error(code: u32, message: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            msg_type: WsMessageType::Error,
            timestamp: Utc::now(),
            payload: serde_json::json!({
                "code": code,
                "message": message,
            }),
        }
    }
}
