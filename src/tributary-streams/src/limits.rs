//! Resource limits checked by streams at block boundaries.

use std::time::Duration;

use common_config::LimitsSettings;
pub use common_config::OverflowMode;
use common_error::{TributaryError, TributaryResult};

use crate::progress::Progress;

/// Which statistics the limits are checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LimitsMode {
    /// The stream's own profile (rows and bytes it returned).
    #[default]
    Current,
    /// Query-wide progress of leaf streams, read from the status handle.
    Total,
}

/// Row and byte bounds with an overflow policy.
///
/// Zero disables a bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SizeLimits {
    /// Maximum rows.
    pub max_rows: u64,
    /// Maximum bytes.
    pub max_bytes: u64,
    /// What to do on overflow.
    pub overflow_mode: OverflowMode,
}

impl SizeLimits {
    /// Create size limits.
    pub const fn new(max_rows: u64, max_bytes: u64, overflow_mode: OverflowMode) -> Self {
        Self {
            max_rows,
            max_bytes,
            overflow_mode,
        }
    }

    /// Whether any bound is configured.
    pub const fn is_set(&self) -> bool {
        self.max_rows != 0 || self.max_bytes != 0
    }

    /// Whether `rows` or `bytes` is over its bound.
    pub const fn exceeded(&self, rows: u64, bytes: u64) -> bool {
        (self.max_rows != 0 && rows > self.max_rows) || (self.max_bytes != 0 && bytes > self.max_bytes)
    }

    /// Check the bounds.
    ///
    /// Returns `Ok(true)` when within bounds, `Ok(false)` when exceeded with
    /// [`OverflowMode::Break`], and an error when exceeded with
    /// [`OverflowMode::Throw`].
    pub fn check(&self, rows: u64, bytes: u64, what: &str) -> TributaryResult<bool> {
        if self.max_rows != 0 && rows > self.max_rows {
            return handle_overflow(
                self.overflow_mode,
                format!(
                    "Limit for {what} exceeded: {rows} rows, maximum: {}",
                    self.max_rows
                ),
            );
        }
        if self.max_bytes != 0 && bytes > self.max_bytes {
            return handle_overflow(
                self.overflow_mode,
                format!(
                    "Limit for {what} exceeded: {bytes} bytes, maximum: {}",
                    self.max_bytes
                ),
            );
        }
        Ok(true)
    }
}

fn handle_overflow(mode: OverflowMode, message: String) -> TributaryResult<bool> {
    match mode {
        OverflowMode::Throw => Err(TributaryError::resource_limit(message)),
        OverflowMode::Break => {
            log::debug!("{message}; stopping silently");
            Ok(false)
        }
    }
}

/// Limits checked on every block of a stream.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LocalLimits {
    /// Statistics the size limits apply to.
    pub mode: LimitsMode,
    /// Row and byte bounds.
    pub size_limits: SizeLimits,
    /// Maximum wall-clock time since the first read (zero disables).
    pub max_execution_time: Duration,
    /// Overflow policy for `max_execution_time`.
    pub timeout_overflow_mode: OverflowMode,
    /// Minimum rows per second (zero disables).
    pub min_execution_speed: u64,
    /// Grace period before `min_execution_speed` is checked.
    pub timeout_before_checking_execution_speed: Duration,
    /// In [`LimitsMode::Total`], also check size limits at non-leaf streams.
    pub check_totals_at_every_node: bool,
    /// In [`LimitsMode::Total`], bounds on the rows and bytes this stream
    /// itself returns. Used when the root of a tree is also its only leaf.
    pub result_limits: SizeLimits,
}

impl LocalLimits {
    /// Limits on the rows and bytes a stream returns (result limits).
    pub fn current_from(settings: &LimitsSettings) -> Self {
        Self {
            mode: LimitsMode::Current,
            size_limits: SizeLimits::new(
                settings.max_result_rows,
                settings.max_result_bytes,
                settings.result_overflow_mode,
            ),
            ..Self::default()
        }
    }

    /// Limits on query-wide reading, for leaf streams.
    pub fn total_from(settings: &LimitsSettings) -> Self {
        Self {
            mode: LimitsMode::Total,
            size_limits: SizeLimits::new(
                settings.max_rows_to_read,
                settings.max_bytes_to_read,
                settings.read_overflow_mode,
            ),
            max_execution_time: Duration::from_millis(settings.max_execution_time_ms),
            timeout_overflow_mode: settings.timeout_overflow_mode,
            min_execution_speed: settings.min_execution_speed,
            timeout_before_checking_execution_speed: Duration::from_millis(
                settings.timeout_before_checking_execution_speed_ms,
            ),
            check_totals_at_every_node: settings.check_total_limits_at_every_node,
            result_limits: SizeLimits::default(),
        }
    }

    /// Set the mode.
    #[must_use]
    pub fn with_mode(mut self, mode: LimitsMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the size limits.
    #[must_use]
    pub fn with_size_limits(mut self, size_limits: SizeLimits) -> Self {
        self.size_limits = size_limits;
        self
    }

    /// Also bound the rows and bytes returned while in [`LimitsMode::Total`].
    #[must_use]
    pub fn with_result_limits(mut self, result_limits: SizeLimits) -> Self {
        self.result_limits = result_limits;
        self
    }

    /// Set the execution time limit.
    #[must_use]
    pub fn with_max_execution_time(mut self, max: Duration, mode: OverflowMode) -> Self {
        self.max_execution_time = max;
        self.timeout_overflow_mode = mode;
        self
    }

    /// Set the minimum execution speed and its grace period.
    #[must_use]
    pub fn with_min_execution_speed(mut self, rows_per_sec: u64, grace: Duration) -> Self {
        self.min_execution_speed = rows_per_sec;
        self.timeout_before_checking_execution_speed = grace;
        self
    }

    /// Whether nothing is configured.
    pub fn is_unlimited(&self) -> bool {
        !self.size_limits.is_set()
            && !self.result_limits.is_set()
            && self.max_execution_time.is_zero()
            && self.min_execution_speed == 0
    }

    /// Check the execution time. Same return convention as [`SizeLimits::check`].
    pub fn check_time_limit(&self, elapsed: Duration) -> TributaryResult<bool> {
        if self.max_execution_time.is_zero() || elapsed <= self.max_execution_time {
            return Ok(true);
        }
        handle_overflow(
            self.timeout_overflow_mode,
            format!(
                "Timeout exceeded: elapsed {:.3} seconds, maximum: {:.3}",
                elapsed.as_secs_f64(),
                self.max_execution_time.as_secs_f64()
            ),
        )
    }

    /// Fail if `rows` read over `elapsed` is slower than the minimum speed.
    ///
    /// Only checked once the grace period has passed.
    pub fn check_execution_speed(&self, rows: u64, elapsed: Duration) -> TributaryResult<()> {
        if self.min_execution_speed == 0 || elapsed <= self.timeout_before_checking_execution_speed {
            return Ok(());
        }
        let secs = elapsed.as_secs_f64();
        if secs <= 0.0 {
            return Ok(());
        }
        let speed = rows as f64 / secs;
        if speed < self.min_execution_speed as f64 {
            return Err(TributaryError::resource_limit(format!(
                "Query is executing too slow: {speed:.2} rows/sec., minimum: {}",
                self.min_execution_speed
            )));
        }
        Ok(())
    }

    /// Fail if the projected time to read `progress.total_rows` rows exceeds
    /// `max_execution_time`.
    pub fn check_estimated_time(&self, progress: &Progress, elapsed: Duration) -> TributaryResult<()> {
        if self.max_execution_time.is_zero() || progress.total_rows == 0 || progress.rows == 0 {
            return Ok(());
        }
        if elapsed <= self.timeout_before_checking_execution_speed {
            return Ok(());
        }
        let estimated = elapsed.as_secs_f64() * (progress.total_rows as f64 / progress.rows as f64);
        if estimated > self.max_execution_time.as_secs_f64() {
            return Err(TributaryError::resource_limit(format!(
                "Estimated query execution time ({estimated:.3} seconds) is too long. Maximum: {:.3}. Estimated rows to process: {}",
                self.max_execution_time.as_secs_f64(),
                progress.total_rows
            )));
        }
        Ok(())
    }

    /// Check read limits against query-wide progress.
    ///
    /// With [`OverflowMode::Throw`] the estimate (`max(rows, total_rows)`) is
    /// compared; with [`OverflowMode::Break`] reading stops only once the rows
    /// actually read exceed the bound.
    pub fn check_total_size(&self, progress: &Progress) -> TributaryResult<bool> {
        let limits = &self.size_limits;
        match limits.overflow_mode {
            OverflowMode::Throw => {
                let estimate = progress.rows.max(progress.total_rows);
                limits.check(estimate, progress.bytes, "rows or bytes to read")
            }
            OverflowMode::Break => limits.check(progress.rows, progress.bytes, "rows or bytes to read"),
        }
    }
}
