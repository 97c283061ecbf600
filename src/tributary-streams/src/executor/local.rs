//! Pull-loop executor for stream trees.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use common_config::TributaryConfig;
use common_display::truncate_string;
use common_error::{TributaryError, TributaryResult};

use crate::executor::ExecutionResult;
use crate::limits::LocalLimits;
use crate::metrics::{MetricsSink, ProfileNode};
use crate::profile::rows_before_limit;
use crate::progress::{ProgressCallback, QueryProgressStatus, StatusHandle};
use crate::quota::QuotaHandle;
use crate::stream::{BlockInputStream, BlockInputStreamExt, StreamRef};

/// Single-threaded driver for a stream tree.
///
/// Applies the configured limits, quota, progress callback and status handle
/// to the tree, then drives the root through `read_prefix`, `read` until
/// end-of-stream, and `read_suffix`. Streams that run their own worker
/// threads (such as the union) take care of their inputs themselves.
///
/// Result limits go on the root, read limits and the quota on the leaves.
#[derive(Clone, Default)]
pub struct StreamExecutor {
    config: TributaryConfig,
    quota: Option<QuotaHandle>,
    status: Option<StatusHandle>,
    progress_callback: Option<ProgressCallback>,
}

impl fmt::Debug for StreamExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamExecutor")
            .field("config", &self.config)
            .field("quota", &self.quota)
            .field("status", &self.status)
            .field("progress_callback", &self.progress_callback.is_some())
            .finish()
    }
}

impl StreamExecutor {
    /// Create an executor with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with custom configuration.
    pub fn with_config(config: TributaryConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Charge leaf reads to `quota`.
    #[must_use]
    pub fn with_quota(mut self, quota: QuotaHandle) -> Self {
        self.quota = Some(quota);
        self
    }

    /// Report progress into an external status handle instead of a fresh one.
    #[must_use]
    pub fn with_status(mut self, status: StatusHandle) -> Self {
        self.status = Some(status);
        self
    }

    /// Invoke `callback` with the progress of every leaf block.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Get the executor configuration.
    pub fn config(&self) -> &TributaryConfig {
        &self.config
    }

    /// Run the tree rooted at `root` to completion.
    ///
    /// On failure the tree is cancelled and finalized, and the first error is
    /// returned. Errors from `read_suffix` are never dropped.
    pub fn execute(&self, root: StreamRef) -> TributaryResult<ExecutionResult> {
        let max_depth = self.config.execution.max_pipeline_depth;
        if max_depth > 0 {
            root.check_depth(max_depth)?;
        }

        log::debug!("Executing {}", truncate_string(&root.tree_id(), 256));
        let status = self.prepare(&root);
        let start = Instant::now();

        let mut batches = Vec::new();
        if let Err(e) = pull(root.as_ref(), &mut batches) {
            return Err(abort(root.as_ref(), e));
        }
        root.read_suffix().map_err(|e| {
            root.cancel(false);
            e
        })?;

        let elapsed = start.elapsed();
        let metrics = MetricsSink::new();
        if self.config.execution.collect_metrics {
            metrics.collect_tree(root.as_ref());
        }

        Ok(ExecutionResult {
            batches,
            schema: root.schema(),
            totals: root.totals()?,
            extremes: root.extremes()?,
            rows_before_limit: rows_before_limit(root.as_ref()),
            progress: status.progress_in(),
            metrics,
            profile: ProfileNode::from_stream(root.as_ref()),
            elapsed,
        })
    }

    fn prepare(&self, root: &StreamRef) -> StatusHandle {
        let settings = &self.config.limits;
        let status = self
            .status
            .clone()
            .unwrap_or_else(|| Arc::new(QueryProgressStatus::new()));
        root.set_status_handle(Arc::clone(&status));
        if let Some(callback) = &self.progress_callback {
            root.set_progress_callback(Arc::clone(callback));
        }

        let total = LocalLimits::total_from(settings);
        let leaves_limited = !total.is_unlimited() || self.quota.is_some();
        if leaves_limited {
            let mut leaves = Vec::new();
            collect_leaves(root, &mut leaves);
            for leaf in leaves {
                leaf.set_limits(total.clone());
                if let Some(quota) = &self.quota {
                    leaf.set_quota(Arc::clone(quota));
                }
            }
        }

        let current = LocalLimits::current_from(settings);
        if !current.is_unlimited() {
            if root.core().is_leaf() && leaves_limited {
                log::debug!("Root stream is a leaf; checking result limits alongside read limits");
                root.set_limits(total.with_result_limits(current.size_limits));
            } else {
                root.set_limits(current);
            }
        }

        if settings.extremes {
            root.enable_extremes();
        }
        status
    }
}

fn pull(root: &dyn BlockInputStream, batches: &mut Vec<arrow::record_batch::RecordBatch>) -> TributaryResult<()> {
    root.read_prefix()?;
    while let Some(block) = root.read()? {
        if block.num_rows() > 0 {
            batches.push(block);
        }
    }
    Ok(())
}

fn abort(root: &dyn BlockInputStream, error: TributaryError) -> TributaryError {
    log::debug!("Execution of {} failed: {error}", root.name());
    root.cancel(false);
    if let Err(suffix_error) = root.read_suffix() {
        log::debug!("Ignoring error while finalizing after failure: {suffix_error}");
    }
    error
}

fn collect_leaves(stream: &StreamRef, leaves: &mut Vec<StreamRef>) {
    let children = stream.core().children();
    if children.is_empty() {
        leaves.push(Arc::clone(stream));
        return;
    }
    for child in &children {
        collect_leaves(child, leaves);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
    use arrow::record_batch::RecordBatch;
    use common_config::{LimitsSettings, OverflowMode};

    use crate::operators::{BlocksListInputStream, ConcatBlockInputStream, LimitBlockInputStream, NullBlockInputStream};
    use crate::quota::{IntervalQuota, QuotaInterval};
    use crate::stream::StreamCore;

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![Field::new("n", DataType::Int64, false)]))
    }

    fn leaf(blocks: usize, rows: usize) -> StreamRef {
        let schema = schema();
        let blocks = (0..blocks)
            .map(|_| {
                RecordBatch::try_new(
                    schema.clone(),
                    vec![Arc::new(Int64Array::from_iter_values(0..rows as i64))],
                )
                .unwrap()
            })
            .collect();
        Arc::new(BlocksListInputStream::new(schema, blocks))
    }

    #[test]
    fn test_execute_empty() {
        let executor = StreamExecutor::new();
        let result = executor
            .execute(Arc::new(NullBlockInputStream::new(schema())))
            .unwrap();

        assert!(result.is_empty());
        assert_eq!(result.total_rows(), 0);
        assert_eq!(result.concat().unwrap().num_rows(), 0);
        assert!(result.totals.is_none());
        assert!(result.rows_before_limit.is_none());
    }

    #[test]
    fn test_execute_concat() {
        let root: StreamRef = Arc::new(ConcatBlockInputStream::try_new(vec![leaf(3, 10), leaf(3, 10)]).unwrap());
        let result = StreamExecutor::new().execute(root).unwrap();

        assert_eq!(result.total_rows(), 60);
        assert_eq!(result.num_batches(), 6);
        assert_eq!(result.progress.rows, 60);
        assert_eq!(result.metrics.get("0:Concat").unwrap().rows_in, 60);
        assert!(result.profile_tree().starts_with("Concat (rows=60"));
        assert!(result.explain_analyze().contains("Total Rows: 60"));
    }

    #[test]
    fn test_execute_limit_reports_rows_before_limit() {
        let root: StreamRef = Arc::new(LimitBlockInputStream::new(leaf(5, 10), 15));
        let result = StreamExecutor::new().execute(root).unwrap();

        assert_eq!(result.total_rows(), 15);
        assert_eq!(result.rows_before_limit, Some(20));
    }

    #[test]
    fn test_execute_result_limit_break() {
        let mut config = TributaryConfig::default();
        config.limits = LimitsSettings::default().with_max_result_rows(25, OverflowMode::Break);
        let root: StreamRef = Arc::new(ConcatBlockInputStream::try_new(vec![leaf(5, 10)]).unwrap());

        let result = StreamExecutor::with_config(config).execute(root).unwrap();
        assert_eq!(result.total_rows(), 30);
    }

    #[test]
    fn test_execute_read_limit_throw() {
        let mut config = TributaryConfig::default();
        config.limits = LimitsSettings::default().with_max_rows_to_read(25, OverflowMode::Throw);
        let root: StreamRef = Arc::new(ConcatBlockInputStream::try_new(vec![leaf(5, 10)]).unwrap());

        let err = StreamExecutor::with_config(config).execute(root).unwrap_err();
        assert!(matches!(err, TributaryError::ResourceLimitExceeded(_)));
    }

    #[test]
    fn test_execute_depth_check() {
        let mut config = TributaryConfig::default();
        config.execution.max_pipeline_depth = 1;
        let root: StreamRef = Arc::new(ConcatBlockInputStream::try_new(vec![leaf(1, 1)]).unwrap());

        let err = StreamExecutor::with_config(config).execute(root).unwrap_err();
        assert!(matches!(err, TributaryError::DepthExceeded(_)));
    }

    /// Leaf that sleeps before each of its one-row blocks.
    #[derive(Debug)]
    struct SlowLeaf {
        core: StreamCore,
        remaining: std::sync::atomic::AtomicUsize,
        delay: std::time::Duration,
    }

    impl SlowLeaf {
        fn new(blocks: usize, delay_ms: u64) -> Self {
            Self {
                core: StreamCore::new(),
                remaining: std::sync::atomic::AtomicUsize::new(blocks),
                delay: std::time::Duration::from_millis(delay_ms),
            }
        }
    }

    impl BlockInputStream for SlowLeaf {
        fn name(&self) -> &'static str {
            "Slow"
        }

        fn schema(&self) -> SchemaRef {
            schema()
        }

        fn core(&self) -> &StreamCore {
            &self.core
        }

        fn read_impl(&self) -> TributaryResult<Option<RecordBatch>> {
            use std::sync::atomic::Ordering;
            if self.remaining.load(Ordering::SeqCst) == 0 {
                return Ok(None);
            }
            self.remaining.fetch_sub(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            Ok(Some(RecordBatch::try_new(
                schema(),
                vec![Arc::new(Int64Array::from(vec![1]))],
            )?))
        }
    }

    #[test]
    fn test_leaf_root_keeps_time_limit_with_result_limits() {
        let mut config = TributaryConfig::default();
        config.limits = LimitsSettings::default()
            .with_max_result_rows(1000, OverflowMode::Throw)
            .with_max_execution_time_ms(30, OverflowMode::Throw);
        let root: StreamRef = Arc::new(SlowLeaf::new(10, 20));

        let err = StreamExecutor::with_config(config).execute(root).unwrap_err();
        assert!(matches!(err, TributaryError::ResourceLimitExceeded(_)));
        assert!(err.to_string().contains("Timeout exceeded"));
    }

    #[test]
    fn test_leaf_root_checks_result_and_read_limits() {
        let mut config = TributaryConfig::default();
        config.limits = LimitsSettings::default()
            .with_max_result_rows(15, OverflowMode::Break)
            .with_max_rows_to_read(1000, OverflowMode::Throw);
        let result = StreamExecutor::with_config(config.clone())
            .execute(leaf(5, 10))
            .unwrap();
        assert_eq!(result.total_rows(), 20);

        config.limits = LimitsSettings::default()
            .with_max_result_rows(1000, OverflowMode::Break)
            .with_max_rows_to_read(15, OverflowMode::Throw);
        let err = StreamExecutor::with_config(config).execute(leaf(5, 10)).unwrap_err();
        assert!(matches!(err, TributaryError::ResourceLimitExceeded(_)));
    }

    #[test]
    fn test_leaf_root_keeps_quota_with_result_limits() {
        let mut config = TributaryConfig::default();
        config.limits = LimitsSettings::default().with_max_result_rows(1000, OverflowMode::Throw);
        let quota = Arc::new(IntervalQuota::new(
            QuotaInterval::new(std::time::Duration::from_secs(3600)).with_max_read_rows(15),
        ));

        let err = StreamExecutor::with_config(config)
            .with_quota(quota)
            .execute(leaf(5, 10))
            .unwrap_err();
        assert!(matches!(err, TributaryError::QuotaExceeded(_)));
    }
}
