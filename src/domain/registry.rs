//! Concurrent connection storage with per-user presence indexing.
//!
//! [`ConnectionRegistry`] owns the mapping between users and their live
//! connections. All three internal indices live behind a single
//! [`tokio::sync::RwLock`] so that every mutation — registration, removal,
//! heartbeat eviction — updates the connection table, the per-user presence
//! index, and the last-seen record in one logical step. No index can ever
//! reference a dead connection.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use super::connection::{Connection, OutboundFrame, OutboundSender};
use super::{ConnectionId, UserId};
use crate::error::PresenceError;

/// One registered connection: immutable descriptor, outbound channel, and
/// the activity clock the heartbeat sweep reads.
#[derive(Debug)]
struct ConnectionSlot {
    conn: Connection,
    sender: OutboundSender,
    last_activity_at: DateTime<Utc>,
}

/// All registry indices, guarded together.
#[derive(Debug, Default)]
struct RegistryInner {
    /// Primary table, keyed by connection id.
    connections: HashMap<ConnectionId, ConnectionSlot>,
    /// Derived presence index. Invariant: a connection id belongs to exactly
    /// one user's set, and a set is removed (never left empty) the moment
    /// its owner has no connections.
    user_index: HashMap<UserId, HashSet<ConnectionId>>,
    /// Recorded when a user's last connection goes; cleared when they return.
    last_seen: HashMap<UserId, DateTime<Utc>>,
}

/// Result of removing a connection from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Removal {
    /// Owner of the removed connection.
    pub user_id: UserId,
    /// `true` iff this removal took the user's last connection, i.e. the
    /// user transitioned online → offline.
    pub user_went_offline: bool,
}

/// Central store for all live connections.
///
/// Multiple simultaneous connections per user (tabs/devices) are
/// first-class. All lookups are O(1) average via the connection-id and
/// user-id indices.
#[derive(Debug)]
pub struct ConnectionRegistry {
    inner: RwLock<RegistryInner>,
    per_user_cap: usize,
}

impl ConnectionRegistry {
    /// Creates an empty registry with the given per-user connection cap.
    #[must_use]
    pub fn new(per_user_cap: usize) -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
            per_user_cap,
        }
    }

    /// Registers a connection together with its outbound channel.
    ///
    /// If this is the user's first live connection, their presence
    /// transitions offline → online and any recorded last-seen timestamp is
    /// cleared.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError::ConnectionRejected`] if the user already
    /// holds the configured maximum number of connections. Rejection leaves
    /// no trace in any index.
    pub async fn add_connection(
        &self,
        conn: Connection,
        sender: OutboundSender,
    ) -> Result<(), PresenceError> {
        let mut inner = self.inner.write().await;

        let existing = inner
            .user_index
            .get(&conn.user_id)
            .map_or(0, HashSet::len);
        if existing >= self.per_user_cap {
            return Err(PresenceError::ConnectionRejected {
                cap: self.per_user_cap,
            });
        }

        let user_id = conn.user_id;
        let conn_id = conn.id;
        let came_online = existing == 0;

        inner.user_index.entry(user_id).or_default().insert(conn_id);
        inner.last_seen.remove(&user_id);
        inner.connections.insert(
            conn_id,
            ConnectionSlot {
                conn,
                sender,
                last_activity_at: Utc::now(),
            },
        );

        if came_online {
            tracing::debug!(%user_id, %conn_id, "user came online");
        }
        Ok(())
    }

    /// Removes a connection. Idempotent: removing an absent connection is a
    /// no-op returning `None`.
    ///
    /// If this was the user's last connection, `last_seen` is recorded and
    /// the user's (now empty) presence set is dropped, all under the same
    /// write guard.
    pub async fn remove_connection(&self, conn_id: ConnectionId) -> Option<Removal> {
        let mut inner = self.inner.write().await;
        Self::remove_slot(&mut inner, conn_id)
    }

    /// Removes the connection only if its activity clock still lags `now`
    /// by more than `timeout`.
    ///
    /// The staleness re-check and the removal share one write guard, so a
    /// `touch` that lands between the sweep's snapshot and its eviction
    /// keeps the connection alive. Returns `None` when the connection was
    /// touched since the snapshot or is already gone.
    pub async fn remove_if_stale(
        &self,
        conn_id: ConnectionId,
        now: DateTime<Utc>,
        timeout: Duration,
    ) -> Option<Removal> {
        let mut inner = self.inner.write().await;
        let slot = inner.connections.get(&conn_id)?;
        if now - slot.last_activity_at <= timeout {
            return None;
        }
        Self::remove_slot(&mut inner, conn_id)
    }

    /// Removal body shared by [`Self::remove_connection`] and
    /// [`Self::remove_if_stale`]; the caller holds the write guard.
    fn remove_slot(inner: &mut RegistryInner, conn_id: ConnectionId) -> Option<Removal> {
        let slot = inner.connections.remove(&conn_id)?;
        let user_id = slot.conn.user_id;

        let mut user_went_offline = false;
        if let Some(set) = inner.user_index.get_mut(&user_id) {
            set.remove(&conn_id);
            if set.is_empty() {
                inner.user_index.remove(&user_id);
                inner.last_seen.insert(user_id, Utc::now());
                user_went_offline = true;
                tracing::debug!(%user_id, %conn_id, "user went offline");
            }
        }

        Some(Removal {
            user_id,
            user_went_offline,
        })
    }

    /// Refreshes a connection's activity clock. Returns `false` if the
    /// connection is no longer registered.
    pub async fn touch(&self, conn_id: ConnectionId) -> bool {
        let mut inner = self.inner.write().await;
        match inner.connections.get_mut(&conn_id) {
            Some(slot) => {
                slot.last_activity_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Returns `true` if the connection is currently registered.
    pub async fn is_registered(&self, conn_id: ConnectionId) -> bool {
        self.inner.read().await.connections.contains_key(&conn_id)
    }

    /// Returns `true` if the user has at least one live connection.
    pub async fn is_user_online(&self, user_id: UserId) -> bool {
        self.inner.read().await.user_index.contains_key(&user_id)
    }

    /// Number of live connections the user currently holds.
    pub async fn user_connection_count(&self, user_id: UserId) -> usize {
        self.inner
            .read()
            .await
            .user_index
            .get(&user_id)
            .map_or(0, HashSet::len)
    }

    /// Total number of registered connections across all users.
    pub async fn total_connection_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }

    /// All users with at least one live connection.
    pub async fn online_users(&self) -> Vec<UserId> {
        self.inner.read().await.user_index.keys().copied().collect()
    }

    /// Timestamp of the user's last disconnect, or `None` while they are
    /// online or have never been seen.
    pub async fn user_last_seen(&self, user_id: UserId) -> Option<DateTime<Utc>> {
        self.inner.read().await.last_seen.get(&user_id).copied()
    }

    /// Connections whose activity clock lags `now` by more than `timeout`.
    /// Read-only; the heartbeat sweep decides what to do with them.
    pub async fn stale_connections(&self, now: DateTime<Utc>, timeout: Duration) -> Vec<ConnectionId> {
        let inner = self.inner.read().await;
        inner
            .connections
            .iter()
            .filter(|(_, slot)| now - slot.last_activity_at > timeout)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Seconds a connection has been idle, if it is still registered.
    pub async fn idle_seconds(&self, conn_id: ConnectionId, now: DateTime<Utc>) -> Option<i64> {
        let inner = self.inner.read().await;
        inner
            .connections
            .get(&conn_id)
            .map(|slot| (now - slot.last_activity_at).num_seconds())
    }

    /// Outbound channel for one connection, if it is still registered.
    pub async fn sender_for(&self, conn_id: ConnectionId) -> Option<OutboundSender> {
        let inner = self.inner.read().await;
        inner.connections.get(&conn_id).map(|s| s.sender.clone())
    }

    /// Snapshot of the outbound channels for all of a user's live
    /// connections, resolved under one read guard.
    pub async fn user_senders(&self, user_id: UserId) -> Vec<OutboundSender> {
        let inner = self.inner.read().await;
        let Some(set) = inner.user_index.get(&user_id) else {
            return Vec::new();
        };
        set.iter()
            .filter_map(|id| inner.connections.get(id))
            .map(|slot| slot.sender.clone())
            .collect()
    }

    /// Snapshot of the outbound channels for every registered connection.
    pub async fn all_senders(&self) -> Vec<OutboundSender> {
        let inner = self.inner.read().await;
        inner
            .connections
            .values()
            .map(|slot| slot.sender.clone())
            .collect()
    }

    /// Force-closes every connection and clears all indices. Shutdown only.
    ///
    /// Records `last_seen` for every user that was online, so presence reads
    /// issued during teardown stay coherent. Returns the number of
    /// connections closed.
    pub async fn disconnect_all(&self) -> usize {
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        let count = inner.connections.len();

        for slot in inner.connections.values() {
            // Receiver may already be gone; that is a legal outcome.
            let _ = slot.sender.send(OutboundFrame::Close);
        }
        let users: Vec<UserId> = inner.user_index.keys().copied().collect();
        for user_id in users {
            inner.last_seen.insert(user_id, now);
        }
        inner.connections.clear();
        inner.user_index.clear();

        tracing::info!(count, "disconnected all connections");
        count
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::connection::DeviceMeta;
    use tokio::sync::mpsc;

    fn make_conn(user_id: UserId) -> (Connection, OutboundSender) {
        let (tx, rx) = mpsc::unbounded_channel();
        // Registry tests never assert on delivered frames; a closed
        // receiver is a legal outcome for every send path.
        drop(rx);
        (Connection::new(user_id, DeviceMeta::default()), tx)
    }

    fn registry() -> ConnectionRegistry {
        ConnectionRegistry::new(8)
    }

    #[tokio::test]
    async fn first_connection_brings_user_online() {
        let reg = registry();
        let user = UserId::new();
        assert!(!reg.is_user_online(user).await);

        let (conn, tx) = make_conn(user);
        let Ok(()) = reg.add_connection(conn, tx).await else {
            panic!("add must succeed under cap");
        };
        assert!(reg.is_user_online(user).await);
        assert_eq!(reg.user_connection_count(user).await, 1);
        assert!(reg.user_last_seen(user).await.is_none());
    }

    #[tokio::test]
    async fn two_tabs_then_close_one_stays_online() {
        let reg = registry();
        let user = UserId::new();
        let (c1, t1) = make_conn(user);
        let (c2, t2) = make_conn(user);
        let id1 = c1.id;

        let _ = reg.add_connection(c1, t1).await;
        let _ = reg.add_connection(c2, t2).await;
        assert_eq!(reg.user_connection_count(user).await, 2);

        let Some(removal) = reg.remove_connection(id1).await else {
            panic!("removal of live connection must report");
        };
        assert!(!removal.user_went_offline);
        assert!(reg.is_user_online(user).await);
        assert_eq!(reg.user_connection_count(user).await, 1);
        assert!(reg.user_last_seen(user).await.is_none());
    }

    #[tokio::test]
    async fn last_disconnect_records_last_seen() {
        let reg = registry();
        let user = UserId::new();
        let (conn, tx) = make_conn(user);
        let id = conn.id;
        let _ = reg.add_connection(conn, tx).await;

        let Some(removal) = reg.remove_connection(id).await else {
            panic!("removal must report");
        };
        assert!(removal.user_went_offline);
        assert!(!reg.is_user_online(user).await);
        assert!(reg.user_last_seen(user).await.is_some());
        // The empty set is removed, not left behind.
        assert!(!reg.online_users().await.contains(&user));
    }

    #[tokio::test]
    async fn reconnect_clears_last_seen() {
        let reg = registry();
        let user = UserId::new();
        let (c1, t1) = make_conn(user);
        let id1 = c1.id;
        let _ = reg.add_connection(c1, t1).await;
        let _ = reg.remove_connection(id1).await;
        assert!(reg.user_last_seen(user).await.is_some());

        let (c2, t2) = make_conn(user);
        let _ = reg.add_connection(c2, t2).await;
        assert!(reg.user_last_seen(user).await.is_none());
    }

    #[tokio::test]
    async fn remove_absent_connection_is_noop() {
        let reg = registry();
        assert!(reg.remove_connection(ConnectionId::new()).await.is_none());
    }

    #[tokio::test]
    async fn cap_rejection_leaves_no_trace() {
        let reg = ConnectionRegistry::new(2);
        let user = UserId::new();
        for _ in 0..2 {
            let (conn, tx) = make_conn(user);
            let Ok(()) = reg.add_connection(conn, tx).await else {
                panic!("under cap");
            };
        }
        let (conn, tx) = make_conn(user);
        let rejected_id = conn.id;
        let Err(PresenceError::ConnectionRejected { cap }) = reg.add_connection(conn, tx).await
        else {
            panic!("third connection must be rejected");
        };
        assert_eq!(cap, 2);
        assert_eq!(reg.user_connection_count(user).await, 2);
        assert!(!reg.is_registered(rejected_id).await);
    }

    #[tokio::test]
    async fn stale_sweep_input_respects_timeout() {
        let reg = registry();
        let user = UserId::new();
        let (conn, tx) = make_conn(user);
        let id = conn.id;
        let _ = reg.add_connection(conn, tx).await;

        let now = Utc::now();
        assert!(
            reg.stale_connections(now, Duration::seconds(90))
                .await
                .is_empty()
        );

        let later = now + Duration::seconds(120);
        let stale = reg.stale_connections(later, Duration::seconds(90)).await;
        assert_eq!(stale, vec![id]);
    }

    #[tokio::test]
    async fn conditional_removal_spares_fresh_connection() {
        let reg = registry();
        let user = UserId::new();
        let (conn, tx) = make_conn(user);
        let id = conn.id;
        let _ = reg.add_connection(conn, tx).await;

        // Activity clock is current: the guarded removal declines, as it
        // would for a connection touched after a sweep snapshot.
        let timeout = Duration::seconds(90);
        assert!(reg.remove_if_stale(id, Utc::now(), timeout).await.is_none());
        assert!(reg.is_registered(id).await);
        assert!(reg.is_user_online(user).await);

        let later = Utc::now() + Duration::seconds(120);
        let Some(removal) = reg.remove_if_stale(id, later, timeout).await else {
            panic!("idle connection must be removed");
        };
        assert!(removal.user_went_offline);
        assert!(!reg.is_registered(id).await);

        // Already gone: idempotent.
        assert!(reg.remove_if_stale(id, later, timeout).await.is_none());
    }

    #[tokio::test]
    async fn touch_defers_staleness() {
        let reg = registry();
        let user = UserId::new();
        let (conn, tx) = make_conn(user);
        let id = conn.id;
        let _ = reg.add_connection(conn, tx).await;

        assert!(reg.touch(id).await);
        let Some(idle) = reg.idle_seconds(id, Utc::now()).await else {
            panic!("registered connection has an idle clock");
        };
        assert!(idle <= 1);
        assert!(!reg.touch(ConnectionId::new()).await);
    }

    #[tokio::test]
    async fn user_senders_snapshot_covers_all_tabs() {
        let reg = registry();
        let user = UserId::new();
        let (c1, t1) = make_conn(user);
        let (c2, t2) = make_conn(user);
        let _ = reg.add_connection(c1, t1).await;
        let _ = reg.add_connection(c2, t2).await;

        assert_eq!(reg.user_senders(user).await.len(), 2);
        assert_eq!(reg.user_senders(UserId::new()).await.len(), 0);
        assert_eq!(reg.all_senders().await.len(), 2);
    }

    #[tokio::test]
    async fn disconnect_all_clears_everything() {
        let reg = registry();
        let user_a = UserId::new();
        let user_b = UserId::new();
        for user in [user_a, user_a, user_b] {
            let (conn, tx) = make_conn(user);
            let _ = reg.add_connection(conn, tx).await;
        }

        assert_eq!(reg.disconnect_all().await, 3);
        assert_eq!(reg.total_connection_count().await, 0);
        assert!(reg.online_users().await.is_empty());
        assert!(reg.user_last_seen(user_a).await.is_some());
        assert!(reg.user_last_seen(user_b).await.is_some());
    }
}
