//! Gateway configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). The heartbeat and idle-timeout values
//! are deliberately explicit constants rather than inherited transport
//! defaults: the liveness sweep is the authoritative presence source, and
//! transport-level keepalive timing must not decide when a user reads as
//! offline.

use std::net::SocketAddr;
use std::time::Duration;

/// Top-level gateway configuration.
///
/// Loaded once at startup via [`PresenceConfig::from_env`].
#[derive(Debug, Clone)]
pub struct PresenceConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// Shared secret for HS256 handshake token verification.
    pub jwt_secret: String,

    /// Origins allowed for cross-origin connections. `["*"]` means any.
    pub allowed_origins: Vec<String>,

    /// Seconds between heartbeat liveness sweeps.
    pub heartbeat_interval_secs: u64,

    /// Seconds of inactivity after which a connection is considered dead
    /// and force-evicted by the next sweep. Three missed sweeps by default.
    pub connection_idle_timeout_secs: u64,

    /// Seconds after which an untouched active-conversation entry is
    /// dropped. Defense against clients that never signal closure.
    pub conversation_idle_timeout_secs: u64,

    /// Maximum simultaneous connections a single user may hold
    /// (tabs/devices). Further connections are refused.
    pub per_user_connection_cap: usize,
}

impl PresenceConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to sensible defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as
    /// a [`SocketAddr`].
    pub fn from_env() -> anyhow::Result<Self> {
        use anyhow::Context;

        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse()
            .context("LISTEN_ADDR is not a valid socket address")?;

        let jwt_secret = std::env::var("JWT_SECRET")
            .unwrap_or_else(|_| "agora-presence-dev-secret-do-not-deploy".to_string());

        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_else(|_| vec!["*".to_string()]);

        let heartbeat_interval_secs = parse_env("HEARTBEAT_INTERVAL_SECS", 30);
        let connection_idle_timeout_secs = parse_env("CONNECTION_IDLE_TIMEOUT_SECS", 90);
        let conversation_idle_timeout_secs = parse_env("CONVERSATION_IDLE_TIMEOUT_SECS", 600);
        let per_user_connection_cap = parse_env("PER_USER_CONNECTION_CAP", 8);

        Ok(Self {
            listen_addr,
            jwt_secret,
            allowed_origins,
            heartbeat_interval_secs,
            connection_idle_timeout_secs,
            conversation_idle_timeout_secs,
            per_user_connection_cap,
        })
    }

    /// Heartbeat sweep interval as a [`Duration`].
    #[must_use]
    pub const fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Returns a config with defaults suitable for isolated test instances.
    #[must_use]
    pub fn for_tests() -> Self {
        Self {
            listen_addr: std::net::SocketAddr::from(([127, 0, 0, 1], 0)),
            jwt_secret: "test-secret-at-least-32-characters-long".to_string(),
            allowed_origins: vec!["*".to_string()],
            heartbeat_interval_secs: 30,
            connection_idle_timeout_secs: 90,
            conversation_idle_timeout_secs: 600,
            per_user_connection_cap: 8,
        }
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
