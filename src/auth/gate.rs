//! Handshake authentication.
//!
//! [`AuthGate`] verifies the bearer token presented at WebSocket upgrade
//! time. Verification happens before the upgrade completes: a connection
//! that fails here never reaches the registry and leaves no state behind.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::domain::UserId;
use crate::error::PresenceError;

/// Default lifetime of tokens issued by [`AuthGate::issue`].
pub const ACCESS_TOKEN_TTL_SECONDS: i64 = 15 * 60;

/// Claims carried by a handshake token.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct HandshakeClaims {
    sub: String,
    #[serde(default)]
    roles: Vec<String>,
    iat: i64,
    exp: i64,
}

/// Verified identity attached to a connection for all downstream
/// components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Authenticated user.
    pub user_id: UserId,
    /// Role strings from the token (e.g. `"seller"`, `"support"`).
    pub roles: Vec<String>,
}

/// HS256 token verifier guarding the connection handshake.
#[derive(Clone)]
pub struct AuthGate {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGate").finish_non_exhaustive()
    }
}

impl AuthGate {
    /// Creates a gate from the shared HS256 secret.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError::Internal`] if the secret is shorter than
    /// 32 characters.
    pub fn new(secret: &str) -> Result<Self, PresenceError> {
        if secret.len() < 32 {
            return Err(PresenceError::Internal(
                "jwt secret must be at least 32 characters long".to_string(),
            ));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    /// Verifies a handshake token, returning the identity it proves.
    ///
    /// Bounded, synchronous check: no network round trip, no state created
    /// on failure.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError::Unauthorized`] for malformed, expired, or
    /// improperly signed tokens, and for subjects that are not user UUIDs.
    pub fn verify(&self, token: &str) -> Result<Identity, PresenceError> {
        let claims = decode::<HandshakeClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|err| PresenceError::Unauthorized(err.to_string()))?
            .claims;

        let user_id: UserId = claims.sub.parse().map_err(|_| {
            PresenceError::Unauthorized(format!("token subject '{}' is not a user id", claims.sub))
        })?;

        Ok(Identity {
            user_id,
            roles: claims.roles,
        })
    }

    /// Issues a short-lived token for `user_id`. Used by tests and local
    /// tooling; production tokens come from the identity service.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError::Internal`] if encoding fails.
    pub fn issue(&self, user_id: UserId, roles: Vec<String>) -> Result<String, PresenceError> {
        let issued_at = chrono::Utc::now().timestamp();
        let claims = HandshakeClaims {
            sub: user_id.to_string(),
            roles,
            iat: issued_at,
            exp: issued_at + ACCESS_TOKEN_TTL_SECONDS,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|err| PresenceError::Internal(err.to_string()))
    }
}
