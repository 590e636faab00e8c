//! Gateway error types with HTTP status code mapping.
//!
//! [`PresenceError`] is the central error type for the gateway. Each variant
//! maps to a specific numeric code and, where it can surface over HTTP, a
//! status code and structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2101,
///     "message": "unauthorized: token expired",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges below).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category              | HTTP Status                |
/// |-----------|-----------------------|----------------------------|
/// | 1000–1999 | Payload validation    | 400 Bad Request            |
/// | 2000–2999 | Auth / identity       | 401 Unauthorized           |
/// | 3000–3999 | Server / collaborator | 500 Internal Server Error  |
/// | 4000–4999 | Connection lifecycle  | 429 / internal-only        |
#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    /// Handshake token was missing, malformed, or failed verification.
    /// The connection upgrade is refused before any state is created.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Inbound event payload failed validation. Logged and dropped; the
    /// connection is never torn down for a bad payload.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// The user exceeded the per-user connection cap; the new connection is
    /// refused and leaves no trace in the registry.
    #[error("connection rejected: user already holds {cap} connections")]
    ConnectionRejected {
        /// Configured per-user connection cap.
        cap: usize,
    },

    /// A connection exceeded the heartbeat idle timeout and was evicted.
    /// Not attributable to client misbehavior; never surfaced over HTTP.
    #[error("liveness failure: connection idle for {idle_secs} s")]
    LivenessFailure {
        /// Seconds since the connection's last observed activity.
        idle_secs: i64,
    },

    /// The notification-store collaborator failed during an async step.
    /// Surfaced to the caller only as a failed acknowledgement.
    #[error("storage error: {0}")]
    Storage(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PresenceError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidPayload(_) => 1001,
            Self::Unauthorized(_) => 2101,
            Self::Internal(_) => 3000,
            Self::Storage(_) => 3001,
            Self::ConnectionRejected { .. } => 4001,
            Self::LivenessFailure { .. } => 4002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::ConnectionRejected { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Storage(_) | Self::Internal(_) | Self::LivenessFailure { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for PresenceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_ranges() {
        assert_eq!(
            PresenceError::InvalidPayload("x".to_string()).error_code(),
            1001
        );
        assert_eq!(
            PresenceError::Unauthorized("x".to_string()).error_code(),
            2101
        );
        assert_eq!(
            PresenceError::ConnectionRejected { cap: 8 }.error_code(),
            4001
        );
        assert_eq!(
            PresenceError::LivenessFailure { idle_secs: 91 }.error_code(),
            4002
        );
    }

    #[test]
    fn unauthorized_maps_to_401() {
        let err = PresenceError::Unauthorized("token expired".to_string());
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn cap_rejection_maps_to_429() {
        let err = PresenceError::ConnectionRejected { cap: 8 };
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
    }
}
