//! Full configuration validation.
//!
//! Validates numeric ranges, endpoint URIs, and the listen address.
//! Each section has its own submodule; this orchestrator calls them all
//! and collects errors into a single `ConfigError`.

mod gateway;
mod helpers;
mod misc;


use crate::schema::RtcVoiceConfig;
use rtcvoice_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &RtcVoiceConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    gateway::validate_gateway(&mut errors, config);
    gateway::validate_reconnect(&mut errors, config);
    misc::validate_rooms(&mut errors, config);
    misc::validate_server(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}
