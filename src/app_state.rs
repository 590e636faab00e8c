//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::service::PresenceService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The presence service context (registry, tracker, fanout, heartbeat).
    pub service: Arc<PresenceService>,
}
