//! Inbound event routing.
//!
//! [`EventRouter`] is the per-connection dispatcher: a fixed table from the
//! closed [`EventKind`] enum to handlers. Every payload is validated before
//! dispatch — well-formed object, required fields present, string fields
//! within length bounds. Malformed payloads are logged and dropped; the
//! connection is never torn down for a bad payload. Unknown event names are
//! ignored rather than matched by convention.

use std::sync::Arc;

use serde_json::Value;

use crate::domain::{ConnectionId, UserId};
use crate::error::PresenceError;
use crate::service::PresenceService;

/// Upper bound on any string field in an inbound payload.
const MAX_FIELD_LEN: usize = 256;

/// Closed set of inbound event names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Mark one stored notification as read.
    MarkNotificationRead,
    /// Declare a conversation window opened.
    EnterConversation,
    /// Declare a conversation window closed.
    LeaveConversation,
    /// Alias of [`Self::EnterConversation`] used by newer clients.
    ConversationOpened,
    /// Alias of [`Self::LeaveConversation`] used by newer clients.
    ConversationClosed,
}

impl EventKind {
    /// Maps a wire event name to its kind. Unknown names return `None` and
    /// are ignored by the router.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "mark_notification_read" => Some(Self::MarkNotificationRead),
            "enter_conversation" => Some(Self::EnterConversation),
            "leave_conversation" => Some(Self::LeaveConversation),
            "conversation:opened" => Some(Self::ConversationOpened),
            "conversation:closed" => Some(Self::ConversationClosed),
            _ => None,
        }
    }
}

/// A validated inbound event, ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// `mark_notification_read`
    MarkNotificationRead {
        /// Notification to mark.
        notification_id: uuid::Uuid,
    },
    /// `enter_conversation` / `conversation:opened`
    EnterConversation {
        /// Chat partner whose window opened.
        participant_id: UserId,
        /// Conversation identifier, when the client supplied one.
        conversation_id: Option<uuid::Uuid>,
    },
    /// `leave_conversation` / `conversation:closed`
    LeaveConversation {
        /// Chat partner whose window closed.
        participant_id: UserId,
    },
}

/// Per-connection inbound dispatcher.
#[derive(Debug, Clone)]
pub struct EventRouter {
    service: Arc<PresenceService>,
}

impl EventRouter {
    /// Creates a router over the shared service context.
    #[must_use]
    pub fn new(service: Arc<PresenceService>) -> Self {
        Self { service }
    }

    /// Parses and validates a raw text frame.
    ///
    /// Returns `Ok(None)` for unknown event names (ignored by contract).
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError::InvalidPayload`] for malformed JSON, a
    /// missing event name, a payload that is not an object, missing or
    /// non-string required fields, fields over [`MAX_FIELD_LEN`], and
    /// identifiers that do not parse as UUIDs.
    pub fn parse(text: &str) -> Result<Option<ClientEvent>, PresenceError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|_| PresenceError::InvalidPayload("malformed JSON".to_string()))?;

        let Some(name) = value.get("event").and_then(Value::as_str) else {
            return Err(PresenceError::InvalidPayload(
                "missing event name".to_string(),
            ));
        };
        let Some(kind) = EventKind::from_name(name) else {
            return Ok(None);
        };

        let Some(data) = value.get("data").and_then(Value::as_object) else {
            return Err(PresenceError::InvalidPayload(
                "payload must be a JSON object".to_string(),
            ));
        };

        let event = match kind {
            EventKind::MarkNotificationRead => ClientEvent::MarkNotificationRead {
                notification_id: required_uuid(data, "notification_id")?,
            },
            EventKind::EnterConversation | EventKind::ConversationOpened => {
                ClientEvent::EnterConversation {
                    participant_id: UserId::from_uuid(required_uuid(data, "participant_id")?),
                    conversation_id: optional_uuid(data, "conversation_id")?,
                }
            }
            EventKind::LeaveConversation | EventKind::ConversationClosed => {
                ClientEvent::LeaveConversation {
                    participant_id: UserId::from_uuid(required_uuid(data, "participant_id")?),
                }
            }
        };
        Ok(Some(event))
    }

    /// Validates and dispatches one inbound frame from `user_id`'s
    /// connection `conn_id`.
    ///
    /// Failures never propagate to the socket lifecycle: malformed payloads
    /// are logged and dropped, and a storage failure during `mark_read`
    /// surfaces only as a failed acknowledgement.
    pub async fn handle(&self, conn_id: ConnectionId, user_id: UserId, text: &str) {
        let event = match Self::parse(text) {
            Ok(Some(event)) => event,
            Ok(None) => {
                tracing::debug!(%conn_id, "ignoring unknown event");
                return;
            }
            Err(err) => {
                tracing::warn!(%conn_id, %user_id, %err, "dropping malformed payload");
                return;
            }
        };

        match event {
            ClientEvent::MarkNotificationRead { notification_id } => {
                self.mark_notification_read(conn_id, user_id, notification_id)
                    .await;
            }
            ClientEvent::EnterConversation {
                participant_id,
                conversation_id,
            } => {
                self.service
                    .tracker()
                    .set_active(user_id, participant_id, conversation_id)
                    .await;
            }
            ClientEvent::LeaveConversation { participant_id } => {
                self.service
                    .tracker()
                    .remove_active(user_id, participant_id)
                    .await;
            }
        }
    }

    /// Delegates the mark to the notification-store collaborator and acks
    /// back on the same socket.
    async fn mark_notification_read(
        &self,
        conn_id: ConnectionId,
        user_id: UserId,
        notification_id: uuid::Uuid,
    ) {
        let result = self.service.store().mark_read(user_id, notification_id).await;

        // The await above is a suspension point: the connection may have
        // gone while the store call was in flight. A vanished connection is
        // a legal outcome, not an error.
        if !self.service.registry().is_registered(conn_id).await {
            return;
        }

        let ack = match result {
            Ok(newly_read) => serde_json::json!({
                "notification_id": notification_id,
                "ok": true,
                "newly_read": newly_read,
            }),
            Err(err) => {
                tracing::error!(%user_id, %notification_id, %err, "mark_read failed");
                serde_json::json!({
                    "notification_id": notification_id,
                    "ok": false,
                })
            }
        };
        let _ = self
            .service
            .send_to_socket(conn_id, "notification_read_ack", ack)
            .await;
    }
}

fn required_str<'a>(
    data: &'a serde_json::Map<String, Value>,
    key: &str,
) -> Result<&'a str, PresenceError> {
    let Some(s) = data.get(key).and_then(Value::as_str) else {
        return Err(PresenceError::InvalidPayload(format!(
            "missing required field '{key}'"
        )));
    };
    if s.is_empty() || s.len() > MAX_FIELD_LEN {
        return Err(PresenceError::InvalidPayload(format!(
            "field '{key}' out of length bounds"
        )));
    }
    Ok(s)
}

fn required_uuid(
    data: &serde_json::Map<String, Value>,
    key: &str,
) -> Result<uuid::Uuid, PresenceError> {
    required_str(data, key)?
        .parse()
        .map_err(|_| PresenceError::InvalidPayload(format!("field '{key}' is not a UUID")))
}

fn optional_uuid(
    data: &serde_json::Map<String, Value>,
    key: &str,
) -> Result<Option<uuid::Uuid>, PresenceError> {
    if data.get(key).is_none_or(Value::is_null) {
        return Ok(None);
    }
    required_uuid(data, key).map(Some)
}
