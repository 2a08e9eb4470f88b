//! Configuration schema types for rtcvoice.
//!
//! All structs use `serde(default)` so partial configs work correctly.
//! Missing fields are filled with defaults suitable for a Janus gateway
//! running on the same host.

mod gateway;
mod rooms;
mod server;
mod system;

pub use gateway::*;
pub use rooms::*;
pub use server::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration for the voice service.
///
/// Only override what you want to change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct RtcVoiceConfig {
    pub gateway: GatewayConfig,
    pub reconnect: ReconnectConfig,
    pub rooms: RoomsConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}
