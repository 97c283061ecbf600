//! The stream trait and its provided driver methods.

use std::fmt::{Debug, Write};

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;

use common_error::{TributaryError, TributaryResult};

use crate::block::{block_bytes, check_equal_structure, header_block, merge_extremes, SortDescription};
use crate::limits::{LimitsMode, LocalLimits};
use crate::profile::StreamProfile;
use crate::progress::{Progress, ProgressCallback, StatusHandle};
use crate::quota::QuotaHandle;
use crate::stream::{StreamCore, StreamRef, StreamState, TableLock};

/// A node of the execution tree that produces blocks on demand.
///
/// Streams are pull-based: each [`read`](BlockInputStreamExt::read) call
/// recurses into the children as needed and returns one block, or `None`
/// at end-of-stream.
///
/// # Lifecycle
///
/// ```text
/// read_prefix → read* → read_suffix
/// ```
///
/// - `read_prefix` prepares the children, then runs [`read_prefix_impl`]
/// - `read` runs the cancellation, limit, quota and progress checks around
///   [`read_impl`]
/// - `read_suffix` finalizes the children, then runs [`read_suffix_impl`];
///   its errors are deferred failures and must be propagated
///
/// Only one thread may drive the lifecycle of a given stream at a time.
/// [`cancel`] may be called from any thread at any time.
///
/// [`read_prefix_impl`]: BlockInputStream::read_prefix_impl
/// [`read_impl`]: BlockInputStream::read_impl
/// [`read_suffix_impl`]: BlockInputStream::read_suffix_impl
/// [`cancel`]: BlockInputStream::cancel
pub trait BlockInputStream: Send + Sync + Debug {
    /// Stable identifier used in diagnostics and tree dumps.
    fn name(&self) -> &'static str;

    /// Schema of every block this stream returns.
    fn schema(&self) -> SchemaRef;

    /// Shared bookkeeping embedded in the stream.
    fn core(&self) -> &StreamCore;

    /// Produce the next block, or `None` when exhausted.
    ///
    /// Long-running implementations should poll
    /// [`is_cancelled_or_error_if_killed`](BlockInputStreamExt::is_cancelled_or_error_if_killed)
    /// between units of inner work.
    fn read_impl(&self) -> TributaryResult<Option<RecordBatch>>;

    /// Hook run by `read_prefix` after the children are prepared.
    fn read_prefix_impl(&self) -> TributaryResult<()> {
        Ok(())
    }

    /// Hook run by `read_suffix` after the children are finalized.
    fn read_suffix_impl(&self) -> TributaryResult<()> {
        Ok(())
    }

    /// Prepare the children and this stream.
    ///
    /// Override to initialize children differently, e.g. from worker threads.
    fn drive_prefix(&self) -> TributaryResult<()> {
        for child in self.core().children() {
            child.read_prefix()?;
        }
        self.read_prefix_impl()
    }

    /// Finalize the children and this stream.
    ///
    /// Streams that drive children from other threads must override this to
    /// make sure those threads are done before the children are finalized.
    fn drive_suffix(&self) -> TributaryResult<()> {
        for child in self.core().children() {
            child.read_suffix()?;
        }
        self.read_suffix_impl()
    }

    /// Whether the output is sorted by [`sort_description`](Self::sort_description).
    fn is_sorted_output(&self) -> bool {
        false
    }

    /// Ordering of the output. Fails if the stream declares none.
    fn sort_description(&self) -> TributaryResult<SortDescription> {
        Err(TributaryError::not_sorted(format!(
            "Output of {} is not sorted",
            self.name()
        )))
    }

    /// Report the progress of a just-produced block.
    ///
    /// By default only leaves report, since that is where data is actually
    /// acquired. A stream that reports on behalf of its inputs overrides this
    /// to call [`progress_impl`](BlockInputStreamExt::progress_impl).
    fn progress(&self, value: &Progress) -> TributaryResult<()> {
        if self.core().is_leaf() {
            self.progress_impl(value)
        } else {
            Ok(())
        }
    }

    /// Totals computed alongside the main result.
    ///
    /// Valid once the stream is exhausted or cancelled. Defaults to this
    /// stream's own totals, else the first child (depth-first) that has some.
    fn totals(&self) -> TributaryResult<Option<RecordBatch>> {
        let core = self.core();
        core.state()
            .check_finished(self.name(), "totals", core.is_cancelled())?;
        if let Some(totals) = core.own_totals() {
            return Ok(Some(totals));
        }
        for child in core.children() {
            if let Some(totals) = child.totals()? {
                return Ok(Some(totals));
            }
        }
        Ok(None)
    }

    /// Per-column minimums and maximums as a two-row block.
    ///
    /// Same validity and fallback rules as [`totals`](Self::totals).
    fn extremes(&self) -> TributaryResult<Option<RecordBatch>> {
        let core = self.core();
        core.state()
            .check_finished(self.name(), "extremes", core.is_cancelled())?;
        if let Some(extremes) = core.own_extremes() {
            return Ok(Some(extremes));
        }
        for child in core.children() {
            if let Some(extremes) = child.extremes()? {
                return Ok(Some(extremes));
            }
        }
        Ok(None)
    }

    /// Stop the stream and every descendant.
    ///
    /// After `cancel(false)` reads return end-of-stream; after `cancel(true)`
    /// they fail with [`TributaryError::Cancelled`]. Idempotent and safe to
    /// call concurrently with `read`. Overrides must call `core().cancel`.
    fn cancel(&self, kill: bool) {
        self.core().cancel(kill);
    }
}

// ============================================================================
// Provided Driver Methods
// ============================================================================

/// Lifecycle driver and configuration methods for every [`BlockInputStream`].
pub trait BlockInputStreamExt: BlockInputStream {
    /// Zero-row block carrying the schema.
    fn header(&self) -> RecordBatch {
        header_block(&self.schema())
    }

    /// Prepare the stream for reading. Must be called exactly once.
    fn read_prefix(&self) -> TributaryResult<()> {
        {
            let mut state = self.core().lock();
            state.lifecycle.check_prefix(self.name())?;
            state.lifecycle = StreamState::PrefixDone;
        }
        log::trace!("{}: read_prefix", self.name());
        self.drive_prefix()
    }

    /// Read the next block, or `None` at end-of-stream.
    fn read(&self) -> TributaryResult<Option<RecordBatch>> {
        let core = self.core();
        let (limits, elapsed, unreported_rows_approx) = {
            let mut state = core.lock();
            state.lifecycle.check_read(self.name())?;
            if state.lifecycle == StreamState::PrefixDone {
                state.lifecycle = StreamState::Reading;
            }
            state.profile.start();
            let unreported = state.total_rows_approx - state.total_rows_approx_reported;
            state.total_rows_approx_reported = state.total_rows_approx;
            (state.limits.clone(), state.profile.elapsed(), unreported)
        };

        if unreported_rows_approx > 0 {
            self.progress_impl(&Progress::with_total_rows(unreported_rows_approx))?;
        }

        if self.is_cancelled_or_error_if_killed()? {
            core.lock().lifecycle = StreamState::Cancelled;
            return Ok(None);
        }

        if !limits.check_time_limit(elapsed)? {
            core.lock().limit_exceeded_need_break = true;
        }

        let need_break = core.lock().limit_exceeded_need_break;
        let block = if need_break { None } else { self.read_impl()? };

        match block {
            Some(block) => {
                account_block(self, &block, &limits)?;
                Ok(Some(block))
            }
            None => {
                core.lock().lifecycle = StreamState::Exhausted;
                // Stop siblings below us that may still be producing.
                self.cancel(false);
                Ok(None)
            }
        }
    }

    /// Finalize the stream. Allowed after end-of-stream or cancellation.
    fn read_suffix(&self) -> TributaryResult<()> {
        let core = self.core();
        {
            let mut state = core.lock();
            state.lifecycle.check_suffix(self.name(), core.is_cancelled())?;
            state.lifecycle = StreamState::SuffixDone;
        }
        log::trace!("{}: read_suffix", self.name());
        self.drive_suffix()
    }

    /// Whether `cancel` has been called on this stream.
    fn is_cancelled(&self) -> bool {
        self.core().is_cancelled()
    }

    /// `Ok(true)` if cancelled, an error if killed, `Ok(false)` otherwise.
    fn is_cancelled_or_error_if_killed(&self) -> TributaryResult<bool> {
        let core = self.core();
        if core.is_killed() {
            return Err(TributaryError::cancelled("query was cancelled"));
        }
        Ok(core.is_cancelled())
    }

    /// Install the progress callback on this stream and all descendants.
    fn set_progress_callback(&self, callback: ProgressCallback) {
        self.core().lock().progress_callback = Some(callback.clone());
        for child in self.core().children() {
            child.set_progress_callback(callback.clone());
        }
    }

    /// Install the query status handle on this stream and all descendants.
    ///
    /// The handle is meant to be set once, before the first `read`. Calling
    /// this again replaces the handle in the whole subtree; progress already
    /// reported stays in the previous handle.
    fn set_status_handle(&self, status: StatusHandle) {
        self.core().lock().status = Some(status.clone());
        for child in self.core().children() {
            child.set_status_handle(status.clone());
        }
    }

    /// Set the limits checked by this stream.
    fn set_limits(&self, limits: LocalLimits) {
        self.core().lock().limits = limits;
    }

    /// Limits checked by this stream.
    fn limits(&self) -> LocalLimits {
        self.core().lock().limits.clone()
    }

    /// Set the quota charged by this stream in [`LimitsMode::Total`].
    fn set_quota(&self, quota: QuotaHandle) {
        self.core().lock().quota = Some(quota);
    }

    /// Track per-column extremes of the blocks this stream returns.
    fn enable_extremes(&self) {
        self.core().lock().extremes_enabled = true;
    }

    /// Grow the hint of how many rows the query will read in total.
    fn add_total_rows_approx(&self, rows: u64) {
        let mut state = self.core().lock();
        state.total_rows_approx = state.total_rows_approx.saturating_add(rows);
    }

    /// Accumulated total-rows hint.
    fn total_rows_approx(&self) -> u64 {
        self.core().lock().total_rows_approx
    }

    /// Snapshot of this stream's statistics.
    fn profile(&self) -> StreamProfile {
        self.core().lock().profile.clone()
    }

    /// Current lifecycle state.
    fn state(&self) -> StreamState {
        self.core().state()
    }

    /// Keep an opaque lock token alive as long as this stream.
    fn add_table_lock(&self, lock: TableLock) {
        self.core().lock().table_locks.push(lock);
    }

    /// Deliver progress to the callback and the status handle, and apply
    /// [`LimitsMode::Total`] checks against the query-wide counters.
    fn progress_impl(&self, value: &Progress) -> TributaryResult<()> {
        let (callback, status, limits, elapsed) = {
            let state = self.core().lock();
            (
                state.progress_callback.clone(),
                state.status.clone(),
                state.limits.clone(),
                state.profile.elapsed(),
            )
        };

        if let Some(callback) = callback {
            callback(value);
        }

        let Some(status) = status else {
            return Ok(());
        };
        if !status.update_progress_in(value) {
            log::warn!("{}: query was killed through its status handle", self.name());
            self.cancel(true);
            return Ok(());
        }

        if limits.mode != LimitsMode::Total {
            return Ok(());
        }
        let total = status.progress_in();
        if !limits.check_total_size(&total)? {
            self.cancel(false);
            return Ok(());
        }
        limits.check_execution_speed(total.rows, elapsed)?;
        limits.check_estimated_time(&total, elapsed)
    }

    /// Identity of the subtree: `Name(child_id, ...)`.
    fn tree_id(&self) -> String {
        let children = self.core().children();
        if children.is_empty() {
            return self.name().to_string();
        }
        let ids: Vec<String> = children.iter().map(|c| c.tree_id()).collect();
        format!("{}({})", self.name(), ids.join(", "))
    }

    /// Indented dump of the subtree, one node per line.
    ///
    /// Identical sibling subtrees are printed once with a `× N` suffix.
    fn dump_tree(&self, indent: usize) -> String {
        let mut out = String::new();
        dump_tree_into(self, &mut out, indent, 1);
        out
    }

    /// Depth of the tree, or [`TributaryError::DepthExceeded`] if it is
    /// deeper than `max_depth`. A single stream has depth 1.
    fn check_depth(&self, max_depth: usize) -> TributaryResult<usize> {
        depth_at(self, max_depth, 1)
    }
}

impl<T: BlockInputStream + ?Sized> BlockInputStreamExt for T {}

// ============================================================================
// Helpers
// ============================================================================

fn account_block<S: BlockInputStream + ?Sized>(
    stream: &S,
    block: &RecordBatch,
    limits: &LocalLimits,
) -> TributaryResult<()> {
    check_equal_structure(&stream.schema(), block, stream.name())?;

    let core = stream.core();
    let (rows, bytes, elapsed, status, quota) = {
        let mut state = core.lock();
        state.profile.update(block);
        if state.extremes_enabled {
            let merged = merge_extremes(state.extremes.as_ref(), block)?;
            state.extremes = merged;
        }
        (
            state.profile.rows,
            state.profile.bytes,
            state.profile.elapsed(),
            state.status.clone(),
            state.quota.clone(),
        )
    };

    match limits.mode {
        LimitsMode::Current => {
            if !limits.size_limits.check(rows, bytes, "result")? {
                core.lock().limit_exceeded_need_break = true;
            }
            limits.check_execution_speed(rows, elapsed)?;
        }
        LimitsMode::Total => {
            if !limits.result_limits.check(rows, bytes, "result")? {
                core.lock().limit_exceeded_need_break = true;
            }
            if limits.check_totals_at_every_node && !core.is_leaf() {
                if let Some(status) = &status {
                    if !limits.check_total_size(&status.progress_in())? {
                        core.lock().limit_exceeded_need_break = true;
                    }
                }
            }
            if let Some(quota) = &quota {
                quota.check_and_add_read(block.num_rows() as u64, block_bytes(block))?;
            }
        }
    }

    log::trace!(
        "{}: block of {} rows ({} rows, {} bytes so far)",
        stream.name(),
        block.num_rows(),
        rows,
        bytes
    );

    stream.progress(&Progress::for_block(block))
}

fn depth_at<S: BlockInputStream + ?Sized>(
    stream: &S,
    max_depth: usize,
    level: usize,
) -> TributaryResult<usize> {
    if level > max_depth {
        return Err(TributaryError::depth_exceeded(format!(
            "Stream tree is too deep: {} at level {level}, maximum: {max_depth}",
            stream.name()
        )));
    }
    let mut deepest = 0;
    for child in stream.core().children() {
        deepest = deepest.max(depth_at(child.as_ref(), max_depth, level + 1)?);
    }
    Ok(deepest + 1)
}

fn dump_tree_into<S: BlockInputStream + ?Sized>(
    stream: &S,
    out: &mut String,
    indent: usize,
    multiplier: usize,
) {
    let _ = write!(out, "{}{}", " ".repeat(indent), stream.name());
    if multiplier > 1 {
        let _ = write!(out, " × {multiplier}");
    }
    out.push('\n');

    let mut groups: Vec<(String, usize, StreamRef)> = Vec::new();
    for child in stream.core().children() {
        let id = child.tree_id();
        if let Some(group) = groups.iter_mut().find(|(existing, _, _)| *existing == id) {
            group.1 += 1;
        } else {
            groups.push((id, 1, child));
        }
    }
    for (_, count, child) in groups {
        dump_tree_into(child.as_ref(), out, indent + 1, count);
    }
}
