//! Composition root for the presence gateway.
//!
//! [`PresenceService`] wires the registry, conversation tracker, fanout,
//! heartbeat monitor, auth gate, and notification-store collaborator into
//! one explicit context object with an `start()`/`shutdown()` lifecycle.
//! Handlers receive it through [`crate::app_state::AppState`] rather than
//! ambient globals, so tests construct isolated instances.

use std::sync::Arc;

use serde::Serialize;

use crate::auth::AuthGate;
use crate::config::PresenceConfig;
use crate::domain::{
    Connection, ConnectionId, ConnectionRegistry, ConversationPresenceTracker,
    NotificationEnvelope, OutboundSender, UserId,
};
use crate::error::PresenceError;

use super::fanout::NotificationFanout;
use super::heartbeat::{HeartbeatMonitor, HeartbeatStatus};
use super::store::NotificationStore;

/// Merged registry + presence + heartbeat snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStats {
    /// Registered connections across all users.
    pub total_connections: usize,
    /// Users with at least one live connection.
    pub online_users: usize,
    /// Open conversation windows across all users.
    pub active_conversations: usize,
    /// Heartbeat monitor status.
    pub heartbeat: HeartbeatStatus,
}

/// The presence gateway's service context.
///
/// Owns startup/shutdown and exposes the fanout and presence API consumed
/// by the rest of the application.
#[derive(Debug)]
pub struct PresenceService {
    config: PresenceConfig,
    registry: Arc<ConnectionRegistry>,
    tracker: Arc<ConversationPresenceTracker>,
    fanout: NotificationFanout,
    heartbeat: Arc<HeartbeatMonitor>,
    store: Arc<dyn NotificationStore>,
    auth: AuthGate,
}

impl PresenceService {
    /// Builds the service graph from configuration and the notification
    /// store collaborator. Nothing runs until [`Self::start`].
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError::Internal`] if the configured JWT secret is
    /// unusable.
    pub fn new(
        config: PresenceConfig,
        store: Arc<dyn NotificationStore>,
    ) -> Result<Self, PresenceError> {
        let auth = AuthGate::new(&config.jwt_secret)?;
        let registry = Arc::new(ConnectionRegistry::new(config.per_user_connection_cap));
        let tracker = Arc::new(ConversationPresenceTracker::new());
        let fanout = NotificationFanout::new(Arc::clone(&registry));
        let heartbeat = Arc::new(HeartbeatMonitor::new(
            Arc::clone(&registry),
            Arc::clone(&tracker),
            config.heartbeat_interval(),
            config.connection_idle_timeout_secs,
            config.conversation_idle_timeout_secs,
        ));

        Ok(Self {
            config,
            registry,
            tracker,
            fanout,
            heartbeat,
            store,
            auth,
        })
    }

    /// Starts background work (the heartbeat sweep).
    pub async fn start(&self) {
        self.heartbeat.start().await;
    }

    /// Tears the gateway down. Order matters: stop the sweep so it cannot
    /// race the teardown, force-disconnect every connection, then clear
    /// conversation state. Leaving any of these reachable after shutdown
    /// is a correctness bug.
    pub async fn shutdown(&self) {
        self.heartbeat.stop().await;
        let closed = self.registry.disconnect_all().await;
        self.tracker.clear_all().await;
        tracing::info!(closed, "presence service shut down");
    }

    /// The auth gate guarding the handshake.
    #[must_use]
    pub fn auth(&self) -> &AuthGate {
        &self.auth
    }

    /// The notification-store collaborator.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn NotificationStore> {
        &self.store
    }

    /// The connection registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// The conversation presence tracker.
    #[must_use]
    pub fn tracker(&self) -> &Arc<ConversationPresenceTracker> {
        &self.tracker
    }

    /// The notification fanout.
    #[must_use]
    pub fn fanout(&self) -> &NotificationFanout {
        &self.fanout
    }

    /// The heartbeat monitor.
    #[must_use]
    pub fn heartbeat(&self) -> &Arc<HeartbeatMonitor> {
        &self.heartbeat
    }

    /// The loaded configuration.
    #[must_use]
    pub fn config(&self) -> &PresenceConfig {
        &self.config
    }

    /// Registers an authenticated connection and its outbound channel.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError::ConnectionRejected`] when the user is at
    /// the per-user connection cap.
    pub async fn register_connection(
        &self,
        conn: Connection,
        sender: OutboundSender,
    ) -> Result<(), PresenceError> {
        self.registry.add_connection(conn, sender).await
    }

    /// Handles a disconnect from any source (client close, socket error,
    /// heartbeat eviction already gone). Idempotent. Clears the user's
    /// conversation state when their last connection goes.
    pub async fn handle_disconnect(&self, conn_id: ConnectionId) {
        if let Some(removal) = self.registry.remove_connection(conn_id).await
            && removal.user_went_offline
        {
            self.tracker.clear_user(removal.user_id).await;
        }
    }

    /// Whether the user has at least one live connection.
    pub async fn is_user_online(&self, user_id: UserId) -> bool {
        self.registry.is_user_online(user_id).await
    }

    /// Number of live connections the user holds.
    pub async fn user_connection_count(&self, user_id: UserId) -> usize {
        self.registry.user_connection_count(user_id).await
    }

    /// All currently online users.
    pub async fn online_users(&self) -> Vec<UserId> {
        self.registry.online_users().await
    }

    /// When the user last disconnected, or `None` while online/never seen.
    pub async fn user_last_seen(&self, user_id: UserId) -> Option<chrono::DateTime<chrono::Utc>> {
        self.registry.user_last_seen(user_id).await
    }

    /// Suppression decision for the message-send path: `false` iff the
    /// recipient currently has the sender's conversation window open.
    pub async fn should_send_message_notification(
        &self,
        recipient: UserId,
        sender: UserId,
    ) -> bool {
        self.tracker.should_notify(recipient, sender).await
    }

    /// Delivers to all of one user's live sockets. No-op when offline.
    pub async fn send_notification(
        &self,
        user_id: UserId,
        envelope: &NotificationEnvelope,
    ) -> usize {
        self.fanout.send_notification(user_id, envelope).await
    }

    /// Delivers to each user independently.
    pub async fn send_notification_to_many(
        &self,
        user_ids: &[UserId],
        envelope: &NotificationEnvelope,
    ) -> usize {
        self.fanout
            .send_notification_to_many(user_ids, envelope)
            .await
    }

    /// Broadcasts to every registered connection.
    pub async fn send_notification_to_all(&self, envelope: &NotificationEnvelope) -> usize {
        self.fanout.send_notification_to_all(envelope).await
    }

    /// Unicast to one connection (acknowledgements).
    pub async fn send_to_socket(
        &self,
        conn_id: ConnectionId,
        event: &str,
        data: serde_json::Value,
    ) -> bool {
        self.fanout.send_to_socket(conn_id, event, data).await
    }

    /// Force-closes every connection without full shutdown.
    pub async fn disconnect_all(&self) -> usize {
        self.registry.disconnect_all().await
    }

    /// Merged registry + presence + heartbeat statistics.
    pub async fn connection_stats(&self) -> ConnectionStats {
        ConnectionStats {
            total_connections: self.registry.total_connection_count().await,
            online_users: self.registry.online_users().await.len(),
            active_conversations: self.tracker.entry_count().await,
            heartbeat: self.heartbeat.status().await,
        }
    }
}
