//! agora-presence server entry point.
//!
//! Starts the Axum HTTP server with the WebSocket endpoint and the REST
//! read surface, and owns the service lifecycle: heartbeat start, serve,
//! orderly shutdown.

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::get;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use agora_presence::api;
use agora_presence::app_state::AppState;
use agora_presence::config::PresenceConfig;
use agora_presence::service::{InMemoryNotificationStore, PresenceService};
use agora_presence::ws::handler::ws_handler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = PresenceConfig::from_env()?;
    tracing::info!(addr = %config.listen_addr, "starting agora-presence");

    // Notification persistence is an external collaborator; the bundled
    // in-memory store backs single-node deployments and development.
    let store = Arc::new(InMemoryNotificationStore::new());

    // Build and start the service graph
    let cors = cors_layer(&config.allowed_origins);
    let listen_addr = config.listen_addr;
    let service = Arc::new(PresenceService::new(config, store)?);
    service.start().await;

    let app_state = AppState {
        service: Arc::clone(&service),
    };

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(addr = %listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Teardown order matters: heartbeat, then connections, then
    // conversation state.
    service.shutdown().await;

    Ok(())
}

/// Builds the CORS layer from the configured allowed origins.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let list: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(list))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Resolves when the process receives Ctrl-C / SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => tracing::error!(%err, "failed to install SIGTERM handler"),
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
