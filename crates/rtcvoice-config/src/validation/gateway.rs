//! Validation for the `[gateway]` and `[reconnect]` sections.

use crate::schema::RtcVoiceConfig;

use super::helpers::{validate_http_uri, validate_range};

pub(crate) fn validate_gateway(errors: &mut Vec<String>, config: &RtcVoiceConfig) {
    let gateway = &config.gateway;
    validate_http_uri(errors, "gateway.base_uri", &gateway.base_uri);
    if !gateway.admin_uri.is_empty() {
        validate_http_uri(errors, "gateway.admin_uri", &gateway.admin_uri);
    }
    validate_range(
        errors,
        "gateway.request_timeout_ms",
        gateway.request_timeout_ms,
        500,
        120_000,
    );
    validate_range(
        errors,
        "gateway.long_poll_max_events",
        u64::from(gateway.long_poll_max_events),
        1,
        100,
    );
    validate_range(
        errors,
        "gateway.keepalive_interval_secs",
        gateway.keepalive_interval_secs,
        5,
        55,
    );
}

pub(crate) fn validate_reconnect(errors: &mut Vec<String>, config: &RtcVoiceConfig) {
    let reconnect = &config.reconnect;
    validate_range(
        errors,
        "reconnect.initial_backoff_ms",
        reconnect.initial_backoff_ms,
        10,
        60_000,
    );
    if reconnect.max_backoff_ms < reconnect.initial_backoff_ms {
        errors.push(format!(
            "reconnect.max_backoff_ms = {} is below reconnect.initial_backoff_ms = {}",
            reconnect.max_backoff_ms, reconnect.initial_backoff_ms
        ));
    }
}
