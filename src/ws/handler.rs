//! Axum WebSocket upgrade handler.
//!
//! Authentication happens here, before the upgrade completes: a handshake
//! without a verifiable token is refused with a 401 and never creates a
//! connection object or registry entry.

use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use super::connection::run_connection;
use crate::app_state::AppState;
use crate::domain::connection::DeviceMeta;
use crate::error::PresenceError;

/// Query parameters accepted on the upgrade request. Browser WebSocket
/// clients cannot set arbitrary headers, so the token rides the URL.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Bearer token; alternative to the `Authorization` header.
    pub token: Option<String>,
    /// Free-form device label (e.g. `"ios-app"`).
    pub device: Option<String>,
}

/// `GET /ws` — Upgrade HTTP connection to an authenticated WebSocket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    let token = query.token.clone().or_else(|| bearer_token(&headers));
    let Some(token) = token else {
        return PresenceError::Unauthorized("missing handshake token".to_string()).into_response();
    };

    let identity = match state.service.auth().verify(&token) {
        Ok(identity) => identity,
        Err(err) => {
            tracing::warn!(%err, "ws handshake refused");
            return err.into_response();
        }
    };

    let device_meta = DeviceMeta {
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        device: query.device,
    };

    let service = Arc::clone(&state.service);
    ws.on_upgrade(move |socket| run_connection(socket, service, identity, device_meta))
}

/// Extracts a token from an `Authorization: Bearer ...` header.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(String::from)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_none());

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc.def.ghi"),
        );
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc.def.ghi"));

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Basic dXNlcg=="),
        );
        assert!(bearer_token(&headers).is_none());
    }
}
