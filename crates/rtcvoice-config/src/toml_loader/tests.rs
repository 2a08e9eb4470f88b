//! Tests for TOML config loading, creation, and path resolution.

use super::*;
use std::path::Path;

#[test]
fn load_from_nonexistent_returns_file_not_found() {
    let result = load_from_path(Path::new("/tmp/nonexistent_rtcvoice_config.toml"));
    let err = result.unwrap_err();
    assert!(matches!(err, rtcvoice_common::ConfigError::FileNotFound(_)));
}

#[test]
fn load_valid_partial_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[gateway]
base_uri = "https://janus.example.net/janus"
api_token = "s3cret"

[rooms]
max_participants = 50
"#,
    )
    .unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.gateway.base_uri, "https://janus.example.net/janus");
    assert_eq!(config.gateway.api_token, "s3cret");
    assert_eq!(config.rooms.max_participants, 50);
    // Defaults preserved
    assert_eq!(config.gateway.request_timeout_ms, 10_000);
    assert_eq!(config.rooms.region_scope_id, crate::schema::REGION_SCOPE_ID);
    assert_eq!(config.server.listen_addr, "127.0.0.1:9340");
}

#[test]
fn load_invalid_toml_returns_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "this is not valid toml {{{").unwrap();

    let err = load_from_path(&path).unwrap_err();
    assert!(matches!(err, rtcvoice_common::ConfigError::ParseError(_)));
}

#[test]
fn load_keeps_out_of_range_values_for_validation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[gateway]
keepalive_interval_secs = 120
"#,
    )
    .unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.gateway.keepalive_interval_secs, 120);
    assert!(crate::validation::validate(&config).is_err());
}

#[test]
fn create_and_load_default_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rtcvoice").join("config.toml");

    create_default_config(&path).unwrap();
    assert!(path.exists());

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.gateway.base_uri, "http://127.0.0.1:8088/janus");
    assert!(crate::validation::validate(&config).is_ok());
}

#[test]
fn default_config_toml_is_valid() {
    use super::template::default_config_toml;
    use crate::schema::RtcVoiceConfig;

    let content = default_config_toml();
    let config: RtcVoiceConfig = toml::from_str(&content).unwrap();
    assert_eq!(config.gateway.admin_uri, "http://127.0.0.1:7088/admin");
}

#[test]
fn default_config_path_is_reasonable() {
    if let Ok(path) = default_config_path() {
        let path_str = path.to_string_lossy();
        assert!(path_str.contains("rtcvoice"));
        assert!(path_str.ends_with("config.toml"));
    }
}

#[test]
fn explicit_config_path_wins() {
    use super::paths::resolve_config_path;

    let path = resolve_config_path(
        Some("/etc/rtcvoice.toml".into()),
        Some("/home/u/.config".into()),
    )
    .unwrap();
    assert_eq!(path, Path::new("/etc/rtcvoice.toml"));

    let path = resolve_config_path(Some("".into()), Some("/home/u/.config".into())).unwrap();
    assert_eq!(path, Path::new("/home/u/.config/rtcvoice/config.toml"));
}

#[test]
fn missing_config_dir_names_the_override() {
    use super::paths::resolve_config_path;

    let err = resolve_config_path(None, None).unwrap_err();
    assert!(err.to_string().contains(CONFIG_ENV));
}

#[test]
fn template_never_overwrites_an_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    create_default_config(&path).unwrap();
    assert!(load_from_path(&path).is_ok());

    std::fs::write(&path, "[server]\nlisten_addr = \"0.0.0.0:9000\"\n").unwrap();
    create_default_config(&path).unwrap();
    let config = load_from_path(&path).unwrap();
    assert_eq!(config.server.listen_addr, "0.0.0.0:9000");
}
