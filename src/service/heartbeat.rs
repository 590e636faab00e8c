//! Periodic liveness sweep over all registered connections.
//!
//! Transport-level disconnect signals can be lost or arrive late; the
//! heartbeat sweep is the authoritative liveness source. Any transport
//! keepalive or "connection state recovery" is purely an optimization and
//! never a correctness dependency. Each sweep compares every connection's
//! activity clock against the idle timeout and force-evicts the stale ones,
//! so the presence indices never lag behind actual liveness.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::domain::{ConnectionRegistry, ConversationPresenceTracker, OutboundFrame};
use crate::error::PresenceError;

/// Snapshot of the monitor's state for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct HeartbeatStatus {
    /// Connections currently registered.
    pub active_connections: usize,
    /// Completion time of the most recent sweep, if any ran yet.
    pub last_sweep_at: Option<DateTime<Utc>>,
}

/// Converts a configured timeout into a chrono duration, clamped so that
/// nonsense values cannot overflow duration arithmetic.
fn idle_duration(secs: u64) -> Duration {
    Duration::try_seconds(i64::try_from(secs).unwrap_or(i64::MAX))
        .unwrap_or_else(|| Duration::days(365))
}

/// Sweeps the registry for stale connections and evicts them.
#[derive(Debug)]
pub struct HeartbeatMonitor {
    registry: Arc<ConnectionRegistry>,
    tracker: Arc<ConversationPresenceTracker>,
    interval: std::time::Duration,
    connection_idle_timeout: Duration,
    conversation_idle_timeout: Duration,
    last_sweep_at: RwLock<Option<DateTime<Utc>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HeartbeatMonitor {
    /// Creates a monitor over the given registry and tracker.
    ///
    /// `interval` is the sweep period; `connection_idle_timeout_secs` and
    /// `conversation_idle_timeout_secs` bound how long a silent connection
    /// or an untouched conversation window survives.
    #[must_use]
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        tracker: Arc<ConversationPresenceTracker>,
        interval: std::time::Duration,
        connection_idle_timeout_secs: u64,
        conversation_idle_timeout_secs: u64,
    ) -> Self {
        Self {
            registry,
            tracker,
            interval,
            connection_idle_timeout: idle_duration(connection_idle_timeout_secs),
            conversation_idle_timeout: idle_duration(conversation_idle_timeout_secs),
            last_sweep_at: RwLock::new(None),
            task: Mutex::new(None),
        }
    }

    /// Begins the periodic sweep. Idempotent: a second call while running
    /// is a no-op.
    pub async fn start(self: &Arc<Self>) {
        let mut task = self.task.lock().await;
        if task.is_some() {
            return;
        }
        let monitor = Arc::clone(self);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        *task = Some(tokio::spawn(async move {
            loop {
                ticker.tick().await;
                monitor.sweep(Utc::now()).await;
            }
        }));
        tracing::info!(interval_secs = self.interval.as_secs(), "heartbeat started");
    }

    /// Cancels the sweep task. Used at shutdown; idempotent.
    pub async fn stop(&self) {
        let mut task = self.task.lock().await;
        if let Some(handle) = task.take() {
            handle.abort();
            tracing::info!("heartbeat stopped");
        }
    }

    /// Runs one sweep at the given instant, returning the number of
    /// connections evicted.
    ///
    /// Eviction order per stale connection: push a close frame so the write
    /// pump exits, then remove it from the registry; users taken offline by
    /// the eviction get their conversation state cleared in the same sweep.
    /// Idle conversation windows are pruned last.
    pub async fn sweep(&self, now: DateTime<Utc>) -> usize {
        let stale = self
            .registry
            .stale_connections(now, self.connection_idle_timeout)
            .await;

        let mut evicted = 0;
        for conn_id in stale {
            let idle_secs = self
                .registry
                .idle_seconds(conn_id, now)
                .await
                .unwrap_or_default();
            let sender = self.registry.sender_for(conn_id).await;

            // Re-checked under the registry's write guard: a touch that
            // landed after the snapshot spares the connection.
            let Some(removal) = self
                .registry
                .remove_if_stale(conn_id, now, self.connection_idle_timeout)
                .await
            else {
                continue;
            };
            evicted += 1;

            let failure = PresenceError::LivenessFailure { idle_secs };
            tracing::warn!(%conn_id, %failure, "evicting stale connection");
            if let Some(sender) = sender {
                let _ = sender.send(OutboundFrame::Close);
            }
            if removal.user_went_offline {
                self.tracker.clear_user(removal.user_id).await;
            }
        }

        self.tracker
            .prune_idle(now, self.conversation_idle_timeout)
            .await;

        *self.last_sweep_at.write().await = Some(now);
        evicted
    }

    /// Current monitor status.
    pub async fn status(&self) -> HeartbeatStatus {
        HeartbeatStatus {
            active_connections: self.registry.total_connection_count().await,
            last_sweep_at: *self.last_sweep_at.read().await,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::connection::DeviceMeta;
    use crate::domain::{Connection, UserId};
    use tokio::sync::mpsc;

    fn monitor(
        registry: &Arc<ConnectionRegistry>,
        tracker: &Arc<ConversationPresenceTracker>,
    ) -> Arc<HeartbeatMonitor> {
        Arc::new(HeartbeatMonitor::new(
            Arc::clone(registry),
            Arc::clone(tracker),
            std::time::Duration::from_secs(30),
            90,
            600,
        ))
    }

    #[tokio::test]
    async fn sweep_evicts_only_stale_connections() {
        let registry = Arc::new(ConnectionRegistry::new(8));
        let tracker = Arc::new(ConversationPresenceTracker::new());
        let monitor = monitor(&registry, &tracker);

        let user = UserId::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = Connection::new(user, DeviceMeta::default());
        let _ = registry.add_connection(conn, tx).await;

        // Fresh connection survives a sweep at "now".
        assert_eq!(monitor.sweep(Utc::now()).await, 0);
        assert!(registry.is_user_online(user).await);

        // Beyond the idle timeout it is force-closed and purged.
        let later = Utc::now() + Duration::seconds(120);
        assert_eq!(monitor.sweep(later).await, 1);
        assert!(!registry.is_user_online(user).await);
        assert!(registry.user_last_seen(user).await.is_some());

        let Some(OutboundFrame::Close) = rx.recv().await else {
            panic!("evicted connection must receive a close frame");
        };
    }

    #[tokio::test]
    async fn eviction_clears_conversation_state_of_offline_user() {
        let registry = Arc::new(ConnectionRegistry::new(8));
        let tracker = Arc::new(ConversationPresenceTracker::new());
        let monitor = monitor(&registry, &tracker);

        let user = UserId::new();
        let partner = UserId::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let _ = registry
            .add_connection(Connection::new(user, DeviceMeta::default()), tx)
            .await;
        tracker.set_active(user, partner, None).await;

        let _ = monitor.sweep(Utc::now() + Duration::seconds(120)).await;
        assert!(!tracker.is_active(user, partner).await);
    }

    #[tokio::test]
    async fn sweep_prunes_idle_conversations_even_without_evictions() {
        let registry = Arc::new(ConnectionRegistry::new(8));
        let tracker = Arc::new(ConversationPresenceTracker::new());
        let monitor = monitor(&registry, &tracker);

        let (a, b) = (UserId::new(), UserId::new());
        tracker.set_active(a, b, None).await;

        // 120 s: conversation still fresh relative to its 600 s bound, but
        // there are no connections to evict either.
        let _ = monitor.sweep(Utc::now() + Duration::seconds(120)).await;
        assert!(tracker.is_active(a, b).await);

        let _ = monitor.sweep(Utc::now() + Duration::seconds(700)).await;
        assert!(!tracker.is_active(a, b).await);
    }

    #[tokio::test]
    async fn status_reports_sweep_time() {
        let registry = Arc::new(ConnectionRegistry::new(8));
        let tracker = Arc::new(ConversationPresenceTracker::new());
        let monitor = monitor(&registry, &tracker);

        let status = monitor.status().await;
        assert_eq!(status.active_connections, 0);
        assert!(status.last_sweep_at.is_none());

        let now = Utc::now();
        let _ = monitor.sweep(now).await;
        let status = monitor.status().await;
        assert_eq!(status.last_sweep_at, Some(now));
    }

    #[tokio::test]
    async fn start_and_stop_are_idempotent() {
        let registry = Arc::new(ConnectionRegistry::new(8));
        let tracker = Arc::new(ConversationPresenceTracker::new());
        let monitor = monitor(&registry, &tracker);

        monitor.start().await;
        monitor.start().await;
        monitor.stop().await;
        monitor.stop().await;
    }
}
