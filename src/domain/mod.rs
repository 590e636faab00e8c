//! Domain layer: identifiers, connection state, presence indices, and
//! notification envelopes.
//!
//! [`ConnectionRegistry`] is the sole writer of connection and
//! user-presence state; [`ConversationPresenceTracker`] is the sole writer
//! of active-conversation state. Both are read by the fanout but never
//! mutated by it.

pub mod connection;
pub mod connection_id;
pub mod envelope;
pub mod presence;
pub mod registry;
pub mod user_id;

pub use connection::{Connection, ConnectionState, DeviceMeta, OutboundFrame, OutboundSender};
pub use connection_id::ConnectionId;
pub use envelope::{NotificationEnvelope, NotificationKind};
pub use presence::ConversationPresenceTracker;
pub use registry::{ConnectionRegistry, Removal};
pub use user_id::UserId;
