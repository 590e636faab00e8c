//! Transient notification envelope.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::UserId;

/// Kind discriminator for notifications fanned out to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A new chat message arrived.
    NewMessage,
    /// A listing the user watches changed (price drop, sold, relisted).
    ListingUpdate,
    /// An offer on the user's listing was made or answered.
    OfferActivity,
    /// Operational notice from the platform.
    System,
}

/// One logical notification, constructed per send call.
///
/// Not retained by the gateway after the delivery attempt: offline
/// recipients are not queued here (store-and-forward belongs to the
/// persistence collaborator).
#[derive(Debug, Clone, Serialize)]
pub struct NotificationEnvelope {
    /// Envelope identifier, fresh per send call.
    pub id: uuid::Uuid,
    /// Notification kind.
    pub kind: NotificationKind,
    /// Intended recipients. Informational; the fanout resolves actual
    /// delivery targets from live presence at call time.
    pub recipient_ids: Vec<UserId>,
    /// Kind-specific payload.
    pub payload: serde_json::Value,
    /// Construction timestamp.
    pub created_at: DateTime<Utc>,
}

impl NotificationEnvelope {
    /// Creates an envelope for the given recipients.
    #[must_use]
    pub fn new(kind: NotificationKind, recipient_ids: Vec<UserId>, payload: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            kind,
            recipient_ids,
            payload,
            created_at: Utc::now(),
        }
    }

    /// Wire event name for this notification kind.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self.kind {
            NotificationKind::NewMessage => "notification:new_message",
            NotificationKind::ListingUpdate => "notification:listing_update",
            NotificationKind::OfferActivity => "notification:offer_activity",
            NotificationKind::System => "notification:system",
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn event_names_are_namespaced() {
        let envelope = NotificationEnvelope::new(
            NotificationKind::NewMessage,
            vec![UserId::new()],
            serde_json::json!({"conversation_id": "c1"}),
        );
        assert_eq!(envelope.event_name(), "notification:new_message");
    }

    #[test]
    fn envelopes_get_fresh_ids() {
        let a = NotificationEnvelope::new(NotificationKind::System, vec![], serde_json::json!({}));
        let b = NotificationEnvelope::new(NotificationKind::System, vec![], serde_json::json!({}));
        assert_ne!(a.id, b.id);
    }
}
