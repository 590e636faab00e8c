//! Active-conversation tracking and notification suppression.
//!
//! [`ConversationPresenceTracker`] owns the per-user "which conversation
//! window is open" state. It is consulted by the message-send path to decide
//! whether a push notification is redundant: a user actively viewing a
//! conversation with the sender already sees the message live.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use super::UserId;

/// One open conversation window.
#[derive(Debug, Clone, Copy)]
pub struct ConversationEntry {
    /// Conversation identifier, when the client supplied one.
    pub conversation_id: Option<uuid::Uuid>,
    /// When the window was (last) opened. Refreshed on re-entry.
    pub entered_at: DateTime<Utc>,
}

/// Tracks which chat partner's window each user currently has open.
///
/// State shape: `user → (participant → entry)`. At most one entry exists per
/// `(user, participant)` pair at any time. Entries are removed on an
/// explicit leave/close event, by the idle sweep (a crashed tab never sends
/// its closing event), or wholesale when the user has zero live connections.
#[derive(Debug, Default)]
pub struct ConversationPresenceTracker {
    active: RwLock<HashMap<UserId, HashMap<UserId, ConversationEntry>>>,
}

impl ConversationPresenceTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `participant`'s conversation window as open for `user`.
    /// Re-entering an already-open conversation refreshes `entered_at`.
    pub async fn set_active(
        &self,
        user: UserId,
        participant: UserId,
        conversation_id: Option<uuid::Uuid>,
    ) {
        let mut active = self.active.write().await;
        active.entry(user).or_default().insert(
            participant,
            ConversationEntry {
                conversation_id,
                entered_at: Utc::now(),
            },
        );
    }

    /// Removes the `(user, participant)` entry. Idempotent: removing an
    /// absent pair is a no-op.
    pub async fn remove_active(&self, user: UserId, participant: UserId) {
        let mut active = self.active.write().await;
        if let Some(partners) = active.get_mut(&user) {
            partners.remove(&participant);
            if partners.is_empty() {
                active.remove(&user);
            }
        }
    }

    /// Returns `true` if `user` currently has `participant`'s window open.
    pub async fn is_active(&self, user: UserId, participant: UserId) -> bool {
        self.active
            .read()
            .await
            .get(&user)
            .is_some_and(|partners| partners.contains_key(&participant))
    }

    /// The suppression rule: a push notification for a message from `sender`
    /// should reach `recipient` unless the recipient is actively viewing the
    /// conversation with that sender. Offline recipients read as "not
    /// viewing", so this returns `true` for them; whether delivery is
    /// possible is the fanout's concern, not this tracker's.
    pub async fn should_notify(&self, recipient: UserId, sender: UserId) -> bool {
        !self.is_active(recipient, sender).await
    }

    /// Explicit clear of the `(user, participant)` suppression state,
    /// independent of open/close events (e.g. after a client confirms it
    /// has caught up).
    pub async fn reset(&self, user: UserId, participant: UserId) {
        self.remove_active(user, participant).await;
    }

    /// Drops every entry for `user`. Called when the user's last connection
    /// goes: a window cannot be open with no socket behind it.
    pub async fn clear_user(&self, user: UserId) {
        self.active.write().await.remove(&user);
    }

    /// Drops entries untouched for longer than `max_idle`. Returns the
    /// number pruned. Defense against clients that fail to emit the closing
    /// event (tab crash, network loss).
    pub async fn prune_idle(&self, now: DateTime<Utc>, max_idle: Duration) -> usize {
        let mut active = self.active.write().await;
        let mut pruned = 0;
        active.retain(|_, partners| {
            partners.retain(|_, entry| {
                let keep = now - entry.entered_at <= max_idle;
                if !keep {
                    pruned += 1;
                }
                keep
            });
            !partners.is_empty()
        });
        if pruned > 0 {
            tracing::debug!(pruned, "pruned idle conversation entries");
        }
        pruned
    }

    /// Total number of open conversation windows across all users.
    pub async fn entry_count(&self) -> usize {
        self.active.read().await.values().map(HashMap::len).sum()
    }

    /// Clears all state. Shutdown only.
    pub async fn clear_all(&self) {
        self.active.write().await.clear();
    }
}
