//! Janus gateway endpoint, credentials, and reconnect policy.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where and how to reach the Janus gateway.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Janus HTTP API root, e.g. `http://127.0.0.1:8088/janus`.
    pub base_uri: String,
    /// Sent as `apisecret` on every request when non-empty.
    pub api_token: String,
    /// Janus admin API root.
    pub admin_uri: String,
    /// Sent as `admin_secret` on admin requests when non-empty.
    pub admin_token: String,
    /// Upper bound on a single gateway round-trip (valid range: 500-120000).
    pub request_timeout_ms: u64,
    /// `maxev` for the long-poll event loop (valid range: 1-100).
    pub long_poll_max_events: u32,
    /// Janus drops sessions idle for 60s by default (valid range: 5-55).
    pub keepalive_interval_secs: u64,
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_uri", &self.base_uri)
            .field("api_token", &"[REDACTED]")
            .field("admin_uri", &self.admin_uri)
            .field("admin_token", &"[REDACTED]")
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("long_poll_max_events", &self.long_poll_max_events)
            .field("keepalive_interval_secs", &self.keepalive_interval_secs)
            .finish()
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_uri: "http://127.0.0.1:8088/janus".into(),
            api_token: String::new(),
            admin_uri: "http://127.0.0.1:7088/admin".into(),
            admin_token: String::new(),
            request_timeout_ms: 10_000,
            long_poll_max_events: 10,
            keepalive_interval_secs: 25,
        }
    }
}

impl GatewayConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }
}

/// Backoff applied by the connection supervisor between reconnect attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000,
        }
    }
}

impl ReconnectConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}
