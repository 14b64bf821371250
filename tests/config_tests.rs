// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration loading

use camera_pipeline::{AppError, PipelineConfig, Resolution};
use std::io::Write;

#[test]
fn test_missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");
    let config = PipelineConfig::load(Some(&path)).unwrap();
    assert_eq!(config, PipelineConfig::default());
}

#[test]
fn test_partial_file_overrides_named_fields() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{ "retry_backoff_ms": 250, "resolution_ladder": [{{ "width": 640, "height": 480 }}] }}"#
    )
    .unwrap();

    let config = PipelineConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.retry_backoff_ms, 250);
    assert_eq!(config.resolution_ladder, vec![Resolution::new(640, 480)]);
    // Untouched fields keep their defaults
    assert_eq!(
        config.watchdog_interval_ms,
        PipelineConfig::default().watchdog_interval_ms
    );
}

#[test]
fn test_malformed_file_is_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{{ not json").unwrap();
    assert!(matches!(
        PipelineConfig::load(Some(file.path())),
        Err(AppError::Config(_))
    ));
}

#[test]
fn test_invalid_values_rejected_on_load() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{ "resolution_ladder": [] }}"#).unwrap();
    assert!(PipelineConfig::load(Some(file.path())).is_err());
}

#[test]
fn test_round_trip_through_json() {
    let config = PipelineConfig {
        perf_test_dwell_ms: 1234,
        ..Default::default()
    };
    let json = serde_json::to_string(&config).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, json).unwrap();

    assert_eq!(PipelineConfig::load(Some(&path)).unwrap(), config);
}
