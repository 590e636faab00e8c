//! REST API layer: route handlers and router composition.
//!
//! Read-only surface: presence queries under `/api/v1`, health and stats
//! at the root. All mutation flows through the WebSocket endpoint.

pub mod handlers;

use axum::Router;
#[cfg(feature = "swagger-ui")]
use utoipa::OpenApi;

use crate::app_state::AppState;

/// Aggregated OpenAPI document for the REST read surface.
#[cfg(feature = "swagger-ui")]
#[derive(OpenApi)]
#[openapi(
    info(
        title = "agora-presence",
        description = "Real-time presence and notification-fanout gateway, read surface"
    ),
    paths(
        handlers::system::health_handler,
        handlers::system::stats_handler,
        handlers::presence::online_users_handler,
        handlers::presence::user_presence_handler,
    ),
    tags(
        (name = "System", description = "Health and gateway statistics"),
        (name = "Presence", description = "Online-user and per-user presence queries"),
    )
)]
struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
///
/// With the `swagger-ui` feature enabled (the default), the aggregated
/// OpenAPI document is browsable at `/swagger-ui` and served raw at
/// `/api-docs/openapi.json`.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router
}
