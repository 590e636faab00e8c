//! Notification delivery to live sockets.
//!
//! [`NotificationFanout`] resolves a user to their live connection set via
//! the registry and pushes frames onto each connection's outbound channel.
//! The target set is resolved under a single read guard and dispatch does
//! not suspend per recipient, so one fanout call observes one consistent
//! snapshot of presence.

use std::sync::Arc;

use crate::domain::{
    ConnectionId, ConnectionRegistry, NotificationEnvelope, OutboundFrame, UserId,
};

/// Fans notifications out to every live socket of the targeted users.
///
/// Reads presence state; never mutates it. Delivery is at-least-once to
/// every connection live at the moment of the call; connections established
/// after the call returns receive nothing.
#[derive(Debug, Clone)]
pub struct NotificationFanout {
    registry: Arc<ConnectionRegistry>,
}

impl NotificationFanout {
    /// Creates a fanout over the given registry.
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Delivers `envelope` to every live connection of `user_id`.
    ///
    /// An empty connection set is a documented no-op returning 0, not an
    /// error: offline users are not queued by this gateway.
    pub async fn send_notification(
        &self,
        user_id: UserId,
        envelope: &NotificationEnvelope,
    ) -> usize {
        let senders = self.registry.user_senders(user_id).await;
        if senders.is_empty() {
            tracing::debug!(%user_id, envelope_id = %envelope.id, "recipient offline, skipping");
            return 0;
        }
        let frame = Self::frame(envelope);
        let mut delivered = 0;
        for sender in &senders {
            if sender.send(frame.clone()).is_ok() {
                delivered += 1;
            }
        }
        tracing::debug!(%user_id, envelope_id = %envelope.id, delivered, "notification fanned out");
        delivered
    }

    /// Delivers `envelope` to each user independently. One user's absence
    /// never blocks or rolls back delivery to others. Returns the total
    /// number of sockets reached.
    pub async fn send_notification_to_many(
        &self,
        user_ids: &[UserId],
        envelope: &NotificationEnvelope,
    ) -> usize {
        let mut delivered = 0;
        for user_id in user_ids {
            delivered += self.send_notification(*user_id, envelope).await;
        }
        delivered
    }

    /// Broadcasts `envelope` to every currently registered connection.
    pub async fn send_notification_to_all(&self, envelope: &NotificationEnvelope) -> usize {
        let senders = self.registry.all_senders().await;
        let frame = Self::frame(envelope);
        let mut delivered = 0;
        for sender in &senders {
            if sender.send(frame.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Low-level unicast to one connection, used for request/response-style
    /// acknowledgements. Returns `false` if the connection is gone, which
    /// callers treat as a legal outcome rather than a delivery failure.
    pub async fn send_to_socket(
        &self,
        conn_id: ConnectionId,
        event: &str,
        data: serde_json::Value,
    ) -> bool {
        let Some(sender) = self.registry.sender_for(conn_id).await else {
            return false;
        };
        sender
            .send(OutboundFrame::Event {
                event: event.to_string(),
                data,
            })
            .is_ok()
    }

    fn frame(envelope: &NotificationEnvelope) -> OutboundFrame {
        OutboundFrame::Event {
            event: envelope.event_name().to_string(),
            data: serde_json::to_value(envelope).unwrap_or_default(),
        }
    }
}
