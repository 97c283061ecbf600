//! Configuration management for Tributary.
//!
//! Provides the user-facing execution settings and the resource-limit knobs
//! that the stream core turns into per-node limits.

use serde::{Deserialize, Serialize};

/// Global Tributary configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TributaryConfig {
    /// Execution configuration.
    pub execution: ExecutionConfig,
    /// Resource limits applied to stream trees.
    pub limits: LimitsSettings,
}

/// Execution driver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Maximum depth of a stream tree, checked before execution (0 = unchecked).
    pub max_pipeline_depth: usize,
    /// Whether the driver records per-node metrics after a run.
    pub collect_metrics: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_pipeline_depth: 1000,
            collect_metrics: true,
        }
    }
}

/// What to do when a limit is exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OverflowMode {
    /// Raise an error.
    #[default]
    Throw,
    /// Stop reading and return what has been produced so far.
    Break,
}

impl std::fmt::Display for OverflowMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Throw => write!(f, "throw"),
            Self::Break => write!(f, "break"),
        }
    }
}

/// Resource limits for a query.
///
/// A value of zero disables the corresponding limit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsSettings {
    /// Maximum rows in the query result.
    pub max_result_rows: u64,
    /// Maximum bytes in the query result.
    pub max_result_bytes: u64,
    /// Overflow mode for the result limits.
    pub result_overflow_mode: OverflowMode,
    /// Maximum rows read from leaf sources, across the whole query.
    pub max_rows_to_read: u64,
    /// Maximum bytes read from leaf sources, across the whole query.
    pub max_bytes_to_read: u64,
    /// Overflow mode for the read limits.
    pub read_overflow_mode: OverflowMode,
    /// Maximum execution time in milliseconds.
    pub max_execution_time_ms: u64,
    /// Overflow mode for the execution time limit.
    pub timeout_overflow_mode: OverflowMode,
    /// Minimum execution speed in rows per second.
    pub min_execution_speed: u64,
    /// Grace period in milliseconds before the minimum speed is checked.
    pub timeout_before_checking_execution_speed_ms: u64,
    /// Whether extremes (per-column min/max) are computed for the result.
    pub extremes: bool,
    /// Check read limits at every node instead of at progress points only.
    pub check_total_limits_at_every_node: bool,
}

impl LimitsSettings {
    /// Set the result row limit.
    #[must_use]
    pub fn with_max_result_rows(mut self, rows: u64, mode: OverflowMode) -> Self {
        self.max_result_rows = rows;
        self.result_overflow_mode = mode;
        self
    }

    /// Set the read row limit.
    #[must_use]
    pub fn with_max_rows_to_read(mut self, rows: u64, mode: OverflowMode) -> Self {
        self.max_rows_to_read = rows;
        self.read_overflow_mode = mode;
        self
    }

    /// Set the execution time limit.
    #[must_use]
    pub fn with_max_execution_time_ms(mut self, millis: u64, mode: OverflowMode) -> Self {
        self.max_execution_time_ms = millis;
        self.timeout_overflow_mode = mode;
        self
    }

    /// Set the minimum execution speed and its grace period.
    #[must_use]
    pub fn with_min_execution_speed(mut self, rows_per_sec: u64, grace_ms: u64) -> Self {
        self.min_execution_speed = rows_per_sec;
        self.timeout_before_checking_execution_speed_ms = grace_ms;
        self
    }

    /// Whether any read (total) limit is configured.
    pub fn has_read_limits(&self) -> bool {
        self.max_rows_to_read != 0 || self.max_bytes_to_read != 0
    }
}
