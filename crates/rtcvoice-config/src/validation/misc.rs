//! Validation for the `[rooms]` and `[server]` sections.

use std::net::SocketAddr;

use crate::schema::RtcVoiceConfig;

use super::helpers::validate_range;

pub(crate) fn validate_rooms(errors: &mut Vec<String>, config: &RtcVoiceConfig) {
    let rooms = &config.rooms;
    if ![8_000, 12_000, 16_000, 24_000, 48_000].contains(&rooms.sampling_rate) {
        errors.push(format!(
            "rooms.sampling_rate = {} is not an Opus rate",
            rooms.sampling_rate
        ));
    }
    validate_range(
        errors,
        "rooms.destroy_attempts",
        u64::from(rooms.destroy_attempts),
        1,
        10,
    );
    validate_range(
        errors,
        "rooms.destroy_backoff_ms",
        rooms.destroy_backoff_ms,
        0,
        30_000,
    );
}

pub(crate) fn validate_server(errors: &mut Vec<String>, config: &RtcVoiceConfig) {
    let server = &config.server;
    if server.listen_addr.parse::<SocketAddr>().is_err() {
        errors.push(format!(
            "server.listen_addr = \"{}\" is not a socket address",
            server.listen_addr
        ));
    }
    validate_range(
        errors,
        "server.session_ttl_secs",
        server.session_ttl_secs,
        30,
        86_400,
    );
    validate_range(
        errors,
        "server.reap_interval_secs",
        server.reap_interval_secs,
        1,
        3_600,
    );
}
