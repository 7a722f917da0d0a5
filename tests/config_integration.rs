//! Integration tests for configuration files

use satmesh_rs::config::{AppConfig, DEFAULT_LOG_FILTER};
use satmesh_rs::SatMeshError;

#[test]
fn test_save_and_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("satmesh.toml");

    let mut config = AppConfig::default();
    config.engine.worker_count = 6;
    config.engine.proximity_threshold_km = 1500.0;
    config.path.include_start_node = true;
    config.demo.shell.total = 66;
    config.demo.shell.planes = 6;

    config.save(&path).unwrap();
    assert!(path.exists());

    let loaded = AppConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig::load_or_default(dir.path().join("absent.toml"));
    assert_eq!(config, AppConfig::default());
    assert!(AppConfig::load(dir.path().join("absent.toml")).is_err());
}

#[test]
fn test_invalid_values_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[engine]\nworker_count = 0\n").unwrap();

    assert!(matches!(AppConfig::load(&path), Err(SatMeshError::Config(_))));
    assert_eq!(AppConfig::load_or_default(&path), AppConfig::default());
}

#[test]
fn test_malformed_toml_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[engine\nworker_count = ").unwrap();

    let err = AppConfig::load(&path).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
}

#[test]
fn test_partial_file_keeps_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partial.toml");
    std::fs::write(&path, "[path]\niteration_cap = 250\n").unwrap();

    let config = AppConfig::load(&path).unwrap();
    assert_eq!(config.path.iteration_cap, 250);
    assert_eq!(config.logging.filter, DEFAULT_LOG_FILTER);
}
