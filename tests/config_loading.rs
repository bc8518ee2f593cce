//! Integration test: Configuration utilities
//!
//! Tests the bin_common configuration loading functionality.

use rowa_pickup::bin_common::{load_client_config, load_config_from_env, ConfigError, ConfigType};
use rowa_pickup::wwks_link::{DispatchMode, HandshakeMode};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

fn yaml_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_custom_config() {
    let custom = ConfigType::Custom("custom/path.yaml".to_string());
    let config_path = load_config_from_env(custom);

    assert_eq!(config_path.to_str().unwrap(), "custom/path.yaml");
}

#[test]
fn test_config_type_env_var_names() {
    assert_eq!(ConfigType::Pickup.env_var_name(), "PICKUP_CONFIG_PATH");
}

#[test]
fn test_shipped_config_parses() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/pickup.yaml");
    let config = load_client_config(&path).unwrap();

    assert_eq!(config.read_timeout, Duration::from_secs(10));
    assert_eq!(config.max_consecutive_timeouts, 12);
    assert_eq!(config.max_reconnect_attempts, 10);
    assert_eq!(config.dispatch, DispatchMode::Ordered);
    assert!(matches!(config.handshake, HandshakeMode::FixedDelay(_)));
    assert_eq!(config.identity.destination, 999);
}

#[test]
fn test_partial_config_keeps_defaults() {
    let file = yaml_file("reconnect_interval_ms: 250\ndispatch: concurrent\n");
    let config = load_client_config(file.path()).unwrap();

    assert_eq!(config.reconnect_interval, Duration::from_millis(250));
    assert_eq!(config.dispatch, DispatchMode::Concurrent);
    assert_eq!(config.connect_timeout, Duration::from_secs(10));
    assert_eq!(config.delimiter, "</WWKS>");
}

#[test]
fn test_empty_file_is_default() {
    let file = yaml_file("");
    let config = load_client_config(file.path()).unwrap();
    assert_eq!(config, Default::default());
}

#[test]
fn test_invalid_values_rejected() {
    let file = yaml_file("max_reconnect_attempts: 0\n");
    assert!(matches!(
        load_client_config(file.path()),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn test_malformed_yaml_rejected() {
    let file = yaml_file("handshake:\n  mode: sometimes\n");
    assert!(matches!(
        load_client_config(file.path()),
        Err(ConfigError::Parse { .. })
    ));
}

#[test]
fn test_missing_file_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.yaml");
    assert!(matches!(
        load_client_config(&path),
        Err(ConfigError::Read { .. })
    ));
}
