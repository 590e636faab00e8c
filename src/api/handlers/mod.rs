//! REST route handlers.

pub mod presence;
pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Routes nested under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new().merge(presence::routes())
}
