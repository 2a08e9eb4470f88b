//! rtcvoice configuration system.
//!
//! Provides TOML-based configuration for the Janus gateway connection,
//! room policy, the host-facing listener, and logging. All sections use
//! defaults so partial configs work out of the box.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use rtcvoice_config::{load_config, config_to_json};
//!
//! let config = load_config().expect("failed to load config");
//! let json = config_to_json(&config);
//! println!("{json}");
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{
    GatewayConfig, LogLevel, LoggingConfig, ReconnectConfig, RoomsConfig, RtcVoiceConfig,
    ServerConfig, CONFIG_SCHEMA_VERSION, REGION_SCOPE_ID,
};

use std::path::Path;

use rtcvoice_common::ConfigError;

/// Load and validate config from the platform default path.
///
/// Creates a documented default file if none exists.
pub fn load_config() -> Result<RtcVoiceConfig, ConfigError> {
    let config = toml_loader::load_default()?;
    validation::validate(&config)?;
    Ok(config)
}

/// Load and validate config from an explicit path.
pub fn load_config_from(path: &Path) -> Result<RtcVoiceConfig, ConfigError> {
    let config = toml_loader::load_from_path(path)?;
    validation::validate(&config)?;
    Ok(config)
}

/// Serialize a config to a pretty-printed JSON string with secrets blanked.
pub fn config_to_json(config: &RtcVoiceConfig) -> String {
    let mut redacted = config.clone();
    if !redacted.gateway.api_token.is_empty() {
        redacted.gateway.api_token = "[REDACTED]".into();
    }
    if !redacted.gateway.admin_token.is_empty() {
        redacted.gateway.admin_token = "[REDACTED]".into();
    }
    serde_json::to_string_pretty(&redacted)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_to_json_contains_all_sections() {
        let config = RtcVoiceConfig::default();
        let json = config_to_json(&config);
        assert!(json.contains("\"gateway\""));
        assert!(json.contains("\"reconnect\""));
        assert!(json.contains("\"rooms\""));
        assert!(json.contains("\"server\""));
        assert!(json.contains("\"logging\""));
    }

    #[test]
    fn config_to_json_redacts_tokens() {
        let mut config = RtcVoiceConfig::default();
        config.gateway.api_token = "janusrocks".into();
        config.gateway.admin_token = "supersecret".into();
        let json = config_to_json(&config);
        assert!(!json.contains("janusrocks"));
        assert!(!json.contains("supersecret"));
        assert!(json.contains("[REDACTED]"));
    }

    #[test]
    fn gateway_debug_redacts_tokens() {
        let mut config = RtcVoiceConfig::default();
        config.gateway.api_token = "janusrocks".into();
        let debug = format!("{:?}", config.gateway);
        assert!(!debug.contains("janusrocks"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn config_schema_version_is_1() {
        assert_eq!(CONFIG_SCHEMA_VERSION, 1);
    }

    #[test]
    fn load_config_from_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[rooms]\nsampling_rate = 44100\n").unwrap();
        let err = load_config_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn log_level_maps_to_filter_directive() {
        assert_eq!(LogLevel::Warning.as_filter(), "warn");
        assert_eq!(LogLevel::default().as_filter(), "info");
    }
}
