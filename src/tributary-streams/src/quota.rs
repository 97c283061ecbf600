//! Per-query read quotas.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use common_error::{TributaryError, TributaryResult};

/// Gate charged with the rows and bytes read by leaf streams.
///
/// Implementations are shared by every leaf of a tree and must synchronize
/// internally.
pub trait QuotaGate: Send + Sync + fmt::Debug {
    /// Add a read and fail if the quota is now exceeded.
    fn check_and_add_read(&self, rows: u64, bytes: u64) -> TributaryResult<()>;
}

/// Shared handle to a [`QuotaGate`].
pub type QuotaHandle = Arc<dyn QuotaGate>;

/// Bounds for one quota window. Zero disables a bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaInterval {
    /// Window length; counters reset when it elapses.
    pub duration: Duration,
    /// Maximum rows read per window.
    pub max_read_rows: u64,
    /// Maximum bytes read per window.
    pub max_read_bytes: u64,
}

impl QuotaInterval {
    /// Create a window with no bounds.
    pub const fn new(duration: Duration) -> Self {
        Self {
            duration,
            max_read_rows: 0,
            max_read_bytes: 0,
        }
    }

    /// Bound the rows read per window.
    #[must_use]
    pub const fn with_max_read_rows(mut self, rows: u64) -> Self {
        self.max_read_rows = rows;
        self
    }

    /// Bound the bytes read per window.
    #[must_use]
    pub const fn with_max_read_bytes(mut self, bytes: u64) -> Self {
        self.max_read_bytes = bytes;
        self
    }
}

#[derive(Debug)]
struct QuotaWindow {
    started_at: Instant,
    read_rows: u64,
    read_bytes: u64,
}

/// Fixed-window quota on rows and bytes read.
#[derive(Debug)]
pub struct IntervalQuota {
    interval: QuotaInterval,
    window: Mutex<QuotaWindow>,
}

impl IntervalQuota {
    /// Create a quota whose first window starts now.
    pub fn new(interval: QuotaInterval) -> Self {
        Self {
            interval,
            window: Mutex::new(QuotaWindow {
                started_at: Instant::now(),
                read_rows: 0,
                read_bytes: 0,
            }),
        }
    }

    /// The configured bounds.
    pub const fn interval(&self) -> &QuotaInterval {
        &self.interval
    }

    /// Rows and bytes charged in the current window.
    pub fn used(&self) -> (u64, u64) {
        let window = self.window.lock();
        (window.read_rows, window.read_bytes)
    }

    /// Charge a read as of `now`.
    pub fn check_and_add_read_at(&self, now: Instant, rows: u64, bytes: u64) -> TributaryResult<()> {
        let mut window = self.window.lock();

        if !self.interval.duration.is_zero()
            && now.saturating_duration_since(window.started_at) >= self.interval.duration
        {
            log::trace!(
                "Quota window rolled over after {:?} ({} rows, {} bytes)",
                self.interval.duration,
                window.read_rows,
                window.read_bytes
            );
            window.started_at = now;
            window.read_rows = 0;
            window.read_bytes = 0;
        }

        window.read_rows = window.read_rows.saturating_add(rows);
        window.read_bytes = window.read_bytes.saturating_add(bytes);

        if self.interval.max_read_rows != 0 && window.read_rows > self.interval.max_read_rows {
            return Err(TributaryError::quota_exceeded(format!(
                "Quota for read rows exceeded: {} rows read in {:?}, maximum: {}",
                window.read_rows, self.interval.duration, self.interval.max_read_rows
            )));
        }
        if self.interval.max_read_bytes != 0 && window.read_bytes > self.interval.max_read_bytes {
            return Err(TributaryError::quota_exceeded(format!(
                "Quota for read bytes exceeded: {} bytes read in {:?}, maximum: {}",
                window.read_bytes, self.interval.duration, self.interval.max_read_bytes
            )));
        }
        Ok(())
    }
}

impl QuotaGate for IntervalQuota {
    fn check_and_add_read(&self, rows: u64, bytes: u64) -> TributaryResult<()> {
        self.check_and_add_read_at(Instant::now(), rows, bytes)
    }
}
