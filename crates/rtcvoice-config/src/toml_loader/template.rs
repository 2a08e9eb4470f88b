//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# rtcvoice configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[gateway]
base_uri = "http://127.0.0.1:8088/janus"
# api_token = ""                  # sent as apisecret
admin_uri = "http://127.0.0.1:7088/admin"
# admin_token = ""                # sent as admin_secret
# request_timeout_ms = 10000      # 500-120000
# long_poll_max_events = 10       # 1-100
# keepalive_interval_secs = 25    # 5-55

[reconnect]
# initial_backoff_ms = 500
# max_backoff_ms = 30000

[rooms]
# region_scope_id = -1            # scope used when no parcel is given
# sampling_rate = 48000           # 8000, 12000, 16000, 24000, 48000
# destroy_attempts = 3            # 1-10
# destroy_backoff_ms = 500
# max_participants = 0            # 0 = unlimited

[server]
# listen_addr = "127.0.0.1:9340"
# session_ttl_secs = 600          # 30-86400
# reap_interval_secs = 60

[logging]
# level = "INFO"                  # TRACE, DEBUG, INFO, WARNING, ERROR
# log_spans = false
"##
    .to_string()
}
