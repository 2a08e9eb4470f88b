use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Scope id used when a provisioning request names no parcel.
pub const REGION_SCOPE_ID: i64 = -1;

/// AudioBridge room settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomsConfig {
    /// Scope id for region-wide (parcel-less) rooms.
    pub region_scope_id: i64,
    /// Opus sampling rate requested when creating rooms.
    pub sampling_rate: u32,
    /// How many times a failed gateway destroy is attempted before the
    /// room is dropped locally anyway (valid range: 1-10).
    pub destroy_attempts: u32,
    pub destroy_backoff_ms: u64,
    /// Participant cap passed to the gateway; 0 leaves it unlimited.
    pub max_participants: u32,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            region_scope_id: REGION_SCOPE_ID,
            sampling_rate: 48_000,
            destroy_attempts: 3,
            destroy_backoff_ms: 500,
            max_participants: 0,
        }
    }
}

impl RoomsConfig {
    pub fn destroy_backoff(&self) -> Duration {
        Duration::from_millis(self.destroy_backoff_ms)
    }
}
