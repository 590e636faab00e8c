//! # agora-presence
//!
//! Real-time presence, connection-pooling, and notification-fanout gateway
//! for the agora marketplace's user-to-user messaging feature.
//!
//! The gateway tracks every live connection a user holds across tabs and
//! devices, knows which conversation window each user has open (to suppress
//! redundant push notifications), evicts dead connections with a heartbeat
//! sweep, and fans notifications out to all of a user's live sockets.
//! Offline users are never queued here; store-and-forward belongs to the
//! persistence collaborator behind [`service::NotificationStore`].
//!
//! ## Architecture
//!
//! ```text
//! Clients (WebSocket, REST reads)
//!     │
//!     ├── WS Handler + AuthGate (ws/, auth/)
//!     ├── EventRouter (ws/events)
//!     │
//!     ├── PresenceService (service/)
//!     ├── NotificationFanout, HeartbeatMonitor (service/)
//!     │
//!     ├── ConnectionRegistry (domain/)
//!     ├── ConversationPresenceTracker (domain/)
//!     │
//!     └── NotificationStore collaborator (external)
//! ```

pub mod api;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod ws;
