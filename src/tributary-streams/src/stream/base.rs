//! State shared by every stream implementation.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use parking_lot::{Mutex, MutexGuard, RwLock};

use crate::limits::LocalLimits;
use crate::profile::StreamProfile;
use crate::progress::{ProgressCallback, StatusHandle};
use crate::quota::QuotaHandle;
use crate::stream::{BlockInputStream, StreamState};

/// Opaque token held for the lifetime of a stream.
pub type TableLock = Arc<dyn Any + Send + Sync>;

/// Shared handle to a stream.
pub type StreamRef = Arc<dyn BlockInputStream>;

// ============================================================================
// Core State
// ============================================================================

#[derive(Default)]
pub(crate) struct CoreState {
    pub(crate) lifecycle: StreamState,
    pub(crate) profile: StreamProfile,
    pub(crate) limits: LocalLimits,
    pub(crate) limit_exceeded_need_break: bool,
    pub(crate) quota: Option<QuotaHandle>,
    pub(crate) progress_callback: Option<ProgressCallback>,
    pub(crate) status: Option<StatusHandle>,
    pub(crate) total_rows_approx: u64,
    pub(crate) total_rows_approx_reported: u64,
    pub(crate) totals: Option<RecordBatch>,
    pub(crate) extremes: Option<RecordBatch>,
    pub(crate) extremes_enabled: bool,
    pub(crate) table_locks: Vec<TableLock>,
}

/// Bookkeeping every stream embeds and exposes through
/// [`BlockInputStream::core`].
///
/// Holds the children, the two cancellation flags, and the per-stream
/// configuration, profile and totals/extremes. The cancellation flags are
/// atomics and may be flipped from any thread; the child list sits behind a
/// reader/writer lock; everything else is behind a mutex that is never held
/// while a child or a callback runs.
pub struct StreamCore {
    children: RwLock<Vec<StreamRef>>,
    is_cancelled: AtomicBool,
    is_killed: AtomicBool,
    inner: Mutex<CoreState>,
}

impl StreamCore {
    /// Create a core with no children.
    pub fn new() -> Self {
        Self {
            children: RwLock::new(Vec::new()),
            is_cancelled: AtomicBool::new(false),
            is_killed: AtomicBool::new(false),
            inner: Mutex::new(CoreState::default()),
        }
    }

    /// Create a core owning `children`.
    pub fn with_children(children: Vec<StreamRef>) -> Self {
        let core = Self::new();
        *core.children.write() = children;
        core
    }

    /// Append a child. Must happen before the lifecycle starts.
    pub fn add_child(&self, child: StreamRef) {
        self.children.write().push(child);
    }

    /// Snapshot of the children.
    pub fn children(&self) -> Vec<StreamRef> {
        self.children.read().clone()
    }

    /// Number of children.
    pub fn num_children(&self) -> usize {
        self.children.read().len()
    }

    /// Whether the stream has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.read().is_empty()
    }

    /// Visit children in order under the shared lock until `f` returns `true`.
    pub fn for_each_child<F>(&self, mut f: F)
    where
        F: FnMut(&StreamRef) -> bool,
    {
        let children = self.children.read();
        for child in children.iter() {
            if f(child) {
                break;
            }
        }
    }

    /// Set the cancellation flags and propagate to the children.
    ///
    /// Idempotent. Children are visited only if this call flipped a flag.
    pub fn cancel(&self, kill: bool) {
        let newly_killed = kill && !self.is_killed.swap(true, Ordering::SeqCst);
        let newly_cancelled = !self.is_cancelled.swap(true, Ordering::SeqCst);
        if !newly_killed && !newly_cancelled {
            return;
        }

        log::debug!(
            "Cancelling stream (kill={kill}), propagating to {} children",
            self.num_children()
        );
        self.for_each_child(|child| {
            child.cancel(kill);
            false
        });
    }

    /// Whether `cancel` has been called.
    pub fn is_cancelled(&self) -> bool {
        self.is_cancelled.load(Ordering::SeqCst)
    }

    /// Whether `cancel(true)` has been called.
    pub fn is_killed(&self) -> bool {
        self.is_killed.load(Ordering::SeqCst)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> StreamState {
        self.inner.lock().lifecycle
    }

    /// Set this stream's own totals.
    pub fn set_totals(&self, totals: Option<RecordBatch>) {
        self.inner.lock().totals = totals;
    }

    /// Set this stream's own extremes.
    pub fn set_extremes(&self, extremes: Option<RecordBatch>) {
        self.inner.lock().extremes = extremes;
    }

    /// This stream's own totals, without falling back to children.
    pub fn own_totals(&self) -> Option<RecordBatch> {
        self.inner.lock().totals.clone()
    }

    /// This stream's own extremes, without falling back to children.
    pub fn own_extremes(&self) -> Option<RecordBatch> {
        self.inner.lock().extremes.clone()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, CoreState> {
        self.inner.lock()
    }
}

impl Default for StreamCore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StreamCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&'static str> = self.children.read().iter().map(|c| c.name()).collect();
        let mut out = f.debug_struct("StreamCore");
        out.field("children", &names)
            .field("is_cancelled", &self.is_cancelled())
            .field("is_killed", &self.is_killed());
        if let Some(state) = self.inner.try_lock() {
            out.field("lifecycle", &state.lifecycle)
                .field("profile", &state.profile)
                .field("limits", &state.limits)
                .field("total_rows_approx", &state.total_rows_approx)
                .field("extremes_enabled", &state.extremes_enabled)
                .field("table_locks", &state.table_locks.len());
        }
        out.finish_non_exhaustive()
    }
}
