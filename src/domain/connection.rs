//! Live connection metadata and the connection lifecycle state machine.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

use super::{ConnectionId, UserId};

/// Client device metadata captured at handshake time.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeviceMeta {
    /// Raw `User-Agent` header, if the client sent one.
    pub user_agent: Option<String>,
    /// Free-form device label supplied by the client (e.g. `"ios-app"`).
    pub device: Option<String>,
}

/// Immutable descriptor of one live socket.
///
/// Created on successful handshake, destroyed on disconnect or heartbeat
/// eviction. Exclusively owned by [`super::ConnectionRegistry`].
#[derive(Debug, Clone)]
pub struct Connection {
    /// Connection identifier (immutable after handshake).
    pub id: ConnectionId,
    /// Verified owner of this socket.
    pub user_id: UserId,
    /// Handshake timestamp.
    pub connected_at: DateTime<Utc>,
    /// Device metadata captured at handshake.
    pub device_meta: DeviceMeta,
}

impl Connection {
    /// Creates a new connection descriptor for a verified user.
    #[must_use]
    pub fn new(user_id: UserId, device_meta: DeviceMeta) -> Self {
        Self {
            id: ConnectionId::new(),
            user_id,
            connected_at: Utc::now(),
            device_meta,
        }
    }
}

/// A frame pushed to a connection's outbound channel.
///
/// The per-connection write pump in `ws::connection` turns these into wire
/// messages. Senders are cloned into fanout snapshots; a send to a channel
/// whose receiver is gone simply fails, which every caller treats as
/// "connection no longer present".
#[derive(Debug, Clone)]
pub enum OutboundFrame {
    /// Named event with a JSON payload.
    Event {
        /// Event name as delivered on the wire.
        event: String,
        /// Serialized payload.
        data: serde_json::Value,
    },
    /// Instructs the write pump to close the socket and exit.
    Close,
}

/// Sender half of a connection's outbound channel.
pub type OutboundSender = mpsc::UnboundedSender<OutboundFrame>;

/// Lifecycle of a single connection.
///
/// `Handshaking → Authenticated → Active → Closed`. `Closed` is terminal:
/// a later physical reconnection is a brand-new [`Connection`] with a fresh
/// identifier and no carried-over state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Upgrade received, token not yet verified.
    Handshaking,
    /// Token verified, identity attached, not yet registered.
    Authenticated,
    /// Registered in the connection registry; events flow.
    Active,
    /// Terminal: heartbeat timeout, client disconnect, or server shutdown.
    Closed,
}

impl ConnectionState {
    /// Attempts the transition to `next`, returning the new state or `None`
    /// if the transition is illegal. No transition leaves [`Self::Closed`].
    #[must_use]
    pub const fn advance(self, next: Self) -> Option<Self> {
        match (self, next) {
            (Self::Handshaking, Self::Authenticated)
            | (Self::Authenticated, Self::Active)
            | (Self::Handshaking | Self::Authenticated | Self::Active, Self::Closed) => Some(next),
            _ => None,
        }
    }

    /// Returns `true` once the connection can no longer carry traffic.
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }
}
