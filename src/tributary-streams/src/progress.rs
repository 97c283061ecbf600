//! Progress reporting and the shared query status handle.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use arrow::record_batch::RecordBatch;

use crate::block::block_bytes;

/// Incremental work reported by a stream.
///
/// Callbacks receive the delta of one block; status handles accumulate deltas
/// into query-wide totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    /// Rows read.
    pub rows: u64,
    /// Bytes read.
    pub bytes: u64,
    /// Approximate number of rows that will be read in total.
    pub total_rows: u64,
}

impl Progress {
    /// Progress of `rows` rows and `bytes` bytes.
    pub const fn new(rows: u64, bytes: u64) -> Self {
        Self {
            rows,
            bytes,
            total_rows: 0,
        }
    }

    /// Progress announcing an estimate of the total rows to read.
    pub const fn with_total_rows(total_rows: u64) -> Self {
        Self {
            rows: 0,
            bytes: 0,
            total_rows,
        }
    }

    /// Progress of one block.
    pub fn for_block(block: &RecordBatch) -> Self {
        Self::new(block.num_rows() as u64, block_bytes(block))
    }

    /// Whether nothing was reported.
    pub const fn is_empty(&self) -> bool {
        self.rows == 0 && self.bytes == 0 && self.total_rows == 0
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rows={}, bytes={}, total_rows={}",
            self.rows, self.bytes, self.total_rows
        )
    }
}

/// Callback invoked with the progress of each block.
///
/// The whole tree shares one callback, so it may be called from several
/// threads at once.
pub type ProgressCallback = Arc<dyn Fn(&Progress) + Send + Sync>;

/// Query-wide status shared by every stream of a tree.
///
/// Implementations are mutated concurrently by streams driven from different
/// threads and must synchronize internally.
pub trait QueryStatus: Send + Sync + fmt::Debug {
    /// Add a leaf's progress to the query totals.
    ///
    /// Returns `false` if the query has been killed and reading must stop.
    fn update_progress_in(&self, value: &Progress) -> bool;

    /// Aggregate progress of all leaf streams so far.
    fn progress_in(&self) -> Progress;
}

/// Shared handle to a [`QueryStatus`].
pub type StatusHandle = Arc<dyn QueryStatus>;

/// Lock-free [`QueryStatus`] with an external kill switch.
#[derive(Debug, Default)]
pub struct QueryProgressStatus {
    rows: AtomicU64,
    bytes: AtomicU64,
    total_rows: AtomicU64,
    killed: AtomicBool,
}

impl QueryProgressStatus {
    /// Create an empty status.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the query as killed; streams stop at their next progress report.
    pub fn kill(&self) {
        self.killed.store(true, Ordering::SeqCst);
    }

    /// Whether the query was killed.
    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }
}

impl QueryStatus for QueryProgressStatus {
    fn update_progress_in(&self, value: &Progress) -> bool {
        self.rows.fetch_add(value.rows, Ordering::Relaxed);
        self.bytes.fetch_add(value.bytes, Ordering::Relaxed);
        self.total_rows
            .fetch_add(value.total_rows, Ordering::Relaxed);
        !self.is_killed()
    }

    fn progress_in(&self) -> Progress {
        Progress {
            rows: self.rows.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            total_rows: self.total_rows.load(Ordering::Relaxed),
        }
    }
}
