//! Unit tests for common-config crate

use common_config::{ExecutionConfig, LimitsSettings, OverflowMode, TributaryConfig};

#[test]
fn test_tributary_config_default() {
    let config = TributaryConfig::default();

    assert_eq!(config.execution.max_pipeline_depth, 1000);
    assert!(config.execution.collect_metrics);

    assert_eq!(config.limits.max_result_rows, 0);
    assert_eq!(config.limits.result_overflow_mode, OverflowMode::Throw);
    assert!(!config.limits.extremes);
    assert!(!config.limits.check_total_limits_at_every_node);
}

#[test]
fn test_overflow_mode_default() {
    assert_eq!(OverflowMode::default(), OverflowMode::Throw);
    assert_eq!(OverflowMode::Break.to_string(), "break");
}

#[test]
fn test_overflow_mode_serialization() {
    let json = serde_json::to_string(&OverflowMode::Break).unwrap();
    assert_eq!(json, "\"break\"");

    let mode: OverflowMode = serde_json::from_str("\"throw\"").unwrap();
    assert_eq!(mode, OverflowMode::Throw);

    assert!(serde_json::from_str::<OverflowMode>("\"ignore\"").is_err());
}

#[test]
fn test_config_serialization_roundtrip() {
    let mut config = TributaryConfig::default();
    config.execution.max_pipeline_depth = 64;
    config.limits = LimitsSettings::default()
        .with_max_result_rows(1000, OverflowMode::Break)
        .with_max_execution_time_ms(30_000, OverflowMode::Throw)
        .with_min_execution_speed(10_000, 5_000);
    config.limits.extremes = true;

    let json = serde_json::to_string(&config).unwrap();
    assert!(json.contains("\"break\""));

    let deserialized: TributaryConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized, config);
}

#[test]
fn test_partial_json_uses_defaults() {
    let json = r#"{ "limits": { "max_rows_to_read": 500, "read_overflow_mode": "break" } }"#;
    let config: TributaryConfig = serde_json::from_str(json).unwrap();

    assert_eq!(config.execution, ExecutionConfig::default());
    assert_eq!(config.limits.max_rows_to_read, 500);
    assert_eq!(config.limits.read_overflow_mode, OverflowMode::Break);
    assert_eq!(config.limits.max_bytes_to_read, 0);
    assert!(config.limits.has_read_limits());
}

#[test]
fn test_limits_builders() {
    let limits = LimitsSettings::default().with_max_rows_to_read(10, OverflowMode::Throw);
    assert!(limits.has_read_limits());
    assert!(!LimitsSettings::default().has_read_limits());

    let limits = LimitsSettings::default().with_min_execution_speed(1000, 0);
    assert_eq!(limits.min_execution_speed, 1000);
    assert_eq!(limits.timeout_before_checking_execution_speed_ms, 0);
}

#[test]
fn test_config_debug_format() {
    let config = TributaryConfig::default();
    let debug_str = format!("{:?}", config);
    assert!(debug_str.contains("TributaryConfig"));
    assert!(debug_str.contains("ExecutionConfig"));
    assert!(debug_str.contains("LimitsSettings"));
}
