use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Host-facing WebSocket listener and viewer session housekeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Viewer sessions idle longer than this are logged out (valid range: 30-86400).
    pub session_ttl_secs: u64,
    pub reap_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:9340".into(),
            session_ttl_secs: 600,
            reap_interval_secs: 60,
        }
    }
}

impl ServerConfig {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }
}
