//! Presence read endpoints consumed by the rest of the application.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::domain::UserId;

/// Presence snapshot for one user.
#[derive(Debug, Serialize, ToSchema)]
struct UserPresenceResponse {
    user_id: String,
    online: bool,
    connection_count: usize,
    /// Last disconnect time; null while online or never seen.
    last_seen: Option<String>,
}

/// `GET /api/v1/presence/{user_id}` — Presence snapshot for one user.
///
/// Unknown users read as offline with zero connections; that is a valid
/// answer, not a 404.
#[utoipa::path(
    get,
    path = "/api/v1/presence/{user_id}",
    tag = "Presence",
    summary = "User presence",
    params(
        ("user_id" = uuid::Uuid, Path, description = "User to query"),
    ),
    responses(
        (status = 200, description = "Presence snapshot", body = UserPresenceResponse),
    )
)]
pub async fn user_presence_handler(
    Path(user_id): Path<uuid::Uuid>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let user_id = UserId::from_uuid(user_id);
    let response = UserPresenceResponse {
        user_id: user_id.to_string(),
        online: state.service.is_user_online(user_id).await,
        connection_count: state.service.user_connection_count(user_id).await,
        last_seen: state
            .service
            .user_last_seen(user_id)
            .await
            .map(|t| t.to_rfc3339()),
    };
    (StatusCode::OK, Json(response))
}

/// Online-user listing.
#[derive(Debug, Serialize, ToSchema)]
struct OnlineUsersResponse {
    count: usize,
    user_ids: Vec<String>,
}

/// `GET /api/v1/presence` — All currently online users.
#[utoipa::path(
    get,
    path = "/api/v1/presence",
    tag = "Presence",
    summary = "Online users",
    responses(
        (status = 200, description = "Currently online users", body = OnlineUsersResponse),
    )
)]
pub async fn online_users_handler(State(state): State<AppState>) -> impl IntoResponse {
    let users = state.service.online_users().await;
    (
        StatusCode::OK,
        Json(OnlineUsersResponse {
            count: users.len(),
            user_ids: users.iter().map(ToString::to_string).collect(),
        }),
    )
}

/// Presence routes, nested under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/presence", get(online_users_handler))
        .route("/presence/{user_id}", get(user_presence_handler))
}
