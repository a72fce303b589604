// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn an_empty_toml_document_reproduces_every_controller_default() {
    let config = RuntimeConfig::from_toml_str("").unwrap();
    let defaults = RuntimeConfig::default();
    assert_eq!(config.machine_set_concurrency, defaults.machine_set_concurrency);
    assert_eq!(config.delete_older_than(), defaults.delete_older_than());
    assert_eq!(config.cert_refresh_tick_period(), defaults.cert_refresh_tick_period());
}

#[test]
fn a_partial_toml_document_only_overrides_the_fields_it_names() {
    let config = RuntimeConfig::from_toml_str("machine_set_concurrency = 4\n").unwrap();
    assert_eq!(config.machine_set_concurrency, 4);
    assert_eq!(config.talos_upgrade_concurrency, RuntimeConfig::default().talos_upgrade_concurrency);
}

#[test]
fn loading_a_missing_file_reports_a_read_error() {
    let err = RuntimeConfig::load(Path::new("/nonexistent/omni-ctrld.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn loading_a_file_from_disk_round_trips_through_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("omni-ctrld.toml");
    std::fs::write(&path, "redacted_config_diff_max_count = 5\n").unwrap();

    let config = RuntimeConfig::load(&path).unwrap();
    assert_eq!(config.redacted_config_diff_max_count, 5);
}
