//! Per-stream execution statistics.

use std::time::{Duration, Instant};

use arrow::record_batch::RecordBatch;

use crate::block::block_bytes;
use crate::stream::{BlockInputStream, BlockInputStreamExt};

/// Name under which limit streams report themselves.
pub const LIMIT_STREAM_NAME: &str = "Limit";

/// Statistics accumulated by one stream: rows, bytes and blocks returned by
/// `read`, plus wall-clock time since the first `read` call.
#[derive(Debug, Clone, Default)]
pub struct StreamProfile {
    started_at: Option<Instant>,
    /// Rows returned so far.
    pub rows: u64,
    /// Blocks returned so far.
    pub blocks: u64,
    /// Bytes returned so far.
    pub bytes: u64,
}

impl StreamProfile {
    /// Start the stopwatch if it is not running yet.
    pub fn start(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
    }

    /// Whether `read` has been called at least once.
    pub const fn is_started(&self) -> bool {
        self.started_at.is_some()
    }

    /// Time since the first `read` call.
    pub fn elapsed(&self) -> Duration {
        self.started_at.map_or(Duration::ZERO, |t| t.elapsed())
    }

    /// Account for one returned block.
    pub fn update(&mut self, block: &RecordBatch) {
        self.rows += block.num_rows() as u64;
        self.blocks += 1;
        self.bytes += block_bytes(block);
    }

    /// Rows per second since the first read (0 before any time elapsed).
    pub fn rows_per_second(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.rows as f64 / secs
        }
    }
}

/// Rows that reached the topmost `Limit` streams of the tree before they cut
/// the output.
///
/// Returns `None` when no limit stream is present.
pub fn rows_before_limit<S: BlockInputStream + ?Sized>(stream: &S) -> Option<u64> {
    let mut found = false;
    let rows = sum_below_limits(stream, &mut found);
    found.then_some(rows)
}

fn sum_below_limits<S: BlockInputStream + ?Sized>(stream: &S, found: &mut bool) -> u64 {
    let children = stream.core().children();
    if stream.name() == LIMIT_STREAM_NAME {
        *found = true;
        return children.iter().map(|c| c.profile().rows).sum();
    }
    children
        .iter()
        .map(|c| sum_below_limits(c.as_ref(), found))
        .sum()
}
