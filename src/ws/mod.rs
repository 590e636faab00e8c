//! WebSocket layer: authenticated upgrade, per-connection loop, inbound
//! event routing, and wire message types.
//!
//! The WebSocket endpoint at `/ws` is the transport behind all presence
//! and notification delivery.

pub mod connection;
pub mod events;
pub mod handler;
pub mod messages;
