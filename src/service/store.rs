//! Notification-store collaborator seam.
//!
//! The gateway decides *whether* and *where* to deliver; storing
//! notifications is the persistence collaborator's job. [`NotificationStore`]
//! is that boundary. The bundled [`InMemoryNotificationStore`] backs tests
//! and single-node development; production wires a real store behind the
//! same trait.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::UserId;
use crate::error::PresenceError;

/// Persistence boundary for notification documents.
///
/// Implementations must make `mark_read` idempotent: marking the same
/// notification twice changes the unread count exactly once. Clients
/// double-fire `mark_notification_read` routinely (retry on flaky radio),
/// and the gateway forwards events as they arrive.
#[async_trait]
pub trait NotificationStore: Send + Sync + std::fmt::Debug {
    /// Records a notification for `user`.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError::Storage`] if the store rejects the write.
    async fn create(&self, user: UserId, notification_id: uuid::Uuid)
    -> Result<(), PresenceError>;

    /// Marks one notification as read. Returns `true` iff it was unread.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError::Storage`] if the store rejects the write.
    async fn mark_read(
        &self,
        user: UserId,
        notification_id: uuid::Uuid,
    ) -> Result<bool, PresenceError>;

    /// Marks all of `user`'s notifications as read, returning how many
    /// transitioned.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError::Storage`] if the store rejects the write.
    async fn mark_all_read(&self, user: UserId) -> Result<usize, PresenceError>;

    /// Deletes one notification. Returns `true` iff it existed.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError::Storage`] if the store rejects the write.
    async fn delete(
        &self,
        user: UserId,
        notification_id: uuid::Uuid,
    ) -> Result<bool, PresenceError>;

    /// Number of unread notifications for `user`.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError::Storage`] if the store cannot answer.
    async fn unread_count(&self, user: UserId) -> Result<usize, PresenceError>;
}

/// Per-user notification sets.
#[derive(Debug, Default)]
struct UserNotifications {
    unread: HashSet<uuid::Uuid>,
    read: HashSet<uuid::Uuid>,
}

/// In-memory [`NotificationStore`] for tests and development.
#[derive(Debug, Default)]
pub struct InMemoryNotificationStore {
    by_user: RwLock<HashMap<UserId, UserNotifications>>,
}

impl InMemoryNotificationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn create(
        &self,
        user: UserId,
        notification_id: uuid::Uuid,
    ) -> Result<(), PresenceError> {
        let mut by_user = self.by_user.write().await;
        by_user.entry(user).or_default().unread.insert(notification_id);
        Ok(())
    }

    async fn mark_read(
        &self,
        user: UserId,
        notification_id: uuid::Uuid,
    ) -> Result<bool, PresenceError> {
        let mut by_user = self.by_user.write().await;
        let Some(notifications) = by_user.get_mut(&user) else {
            return Ok(false);
        };
        let newly_read = notifications.unread.remove(&notification_id);
        if newly_read {
            notifications.read.insert(notification_id);
        }
        Ok(newly_read)
    }

    async fn mark_all_read(&self, user: UserId) -> Result<usize, PresenceError> {
        let mut by_user = self.by_user.write().await;
        let Some(notifications) = by_user.get_mut(&user) else {
            return Ok(0);
        };
        let transitioned = notifications.unread.len();
        let drained: Vec<uuid::Uuid> = notifications.unread.drain().collect();
        notifications.read.extend(drained);
        Ok(transitioned)
    }

    async fn delete(
        &self,
        user: UserId,
        notification_id: uuid::Uuid,
    ) -> Result<bool, PresenceError> {
        let mut by_user = self.by_user.write().await;
        let Some(notifications) = by_user.get_mut(&user) else {
            return Ok(false);
        };
        let existed = notifications.unread.remove(&notification_id)
            || notifications.read.remove(&notification_id);
        Ok(existed)
    }

    async fn unread_count(&self, user: UserId) -> Result<usize, PresenceError> {
        let by_user = self.by_user.read().await;
        Ok(by_user.get(&user).map_or(0, |n| n.unread.len()))
    }
}
