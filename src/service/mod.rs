//! Service layer: notification fanout, heartbeat liveness sweep, the
//! notification-store collaborator seam, and the composition root.

pub mod fanout;
pub mod heartbeat;
pub mod presence_service;
pub mod store;

pub use fanout::NotificationFanout;
pub use heartbeat::{HeartbeatMonitor, HeartbeatStatus};
pub use presence_service::{ConnectionStats, PresenceService};
pub use store::{InMemoryNotificationStore, NotificationStore};
