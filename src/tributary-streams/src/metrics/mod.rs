//! Metrics collection for stream execution.

#![allow(clippy::significant_drop_tightening)] // Guards must stay alive for their scope

use std::collections::BTreeMap;
use std::fmt::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use common_display::TreeNode;

use crate::profile::StreamProfile;
use crate::stream::{BlockInputStream, BlockInputStreamExt};

/// Metrics for a single stream of the tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperatorMetrics {
    /// Rows returned by the stream's children.
    pub rows_in: u64,
    /// Rows returned by the stream.
    pub rows_out: u64,
    /// Blocks returned by the stream.
    pub blocks: u64,
    /// Bytes returned by the stream.
    pub bytes: u64,
    /// Wall-clock time since the stream's first read.
    pub exec_time: Duration,
}

impl OperatorMetrics {
    /// Create new metrics.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            rows_in: 0,
            rows_out: 0,
            blocks: 0,
            bytes: 0,
            exec_time: Duration::new(0, 0),
        }
    }

    /// Metrics of a stream given its profile and its children's rows.
    pub fn from_profile(profile: &StreamProfile, rows_in: u64) -> Self {
        Self {
            rows_in,
            rows_out: profile.rows,
            blocks: profile.blocks,
            bytes: profile.bytes,
            exec_time: profile.elapsed(),
        }
    }

    /// Get selectivity (`rows_out` / `rows_in`).
    pub fn selectivity(&self) -> f64 {
        if self.rows_in == 0 {
            1.0
        } else {
            self.rows_out as f64 / self.rows_in as f64
        }
    }

    /// Rows returned per second since the first read.
    pub fn rows_per_second(&self) -> f64 {
        let secs = self.exec_time.as_secs_f64();
        if secs > 0.0 {
            self.rows_out as f64 / secs
        } else {
            0.0
        }
    }
}

impl fmt::Display for OperatorMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rows_in={}, rows_out={}, blocks={}, bytes={}, time={:?}",
            self.rows_in, self.rows_out, self.blocks, self.bytes, self.exec_time
        )
    }
}

/// Sink for collecting per-stream metrics, keyed by tree path.
///
/// Paths look like `0:Union`, `0.1:BlocksList` (root, then child indices).
#[derive(Debug, Clone, Default)]
pub struct MetricsSink {
    metrics: Arc<RwLock<BTreeMap<String, OperatorMetrics>>>,
}

impl MetricsSink {
    /// Create a new metrics sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record metrics for a stream.
    pub fn record(&self, stream_id: &str, metrics: OperatorMetrics) {
        self.metrics.write().insert(stream_id.to_string(), metrics);
    }

    /// Record the profile of every stream in the tree rooted at `root`.
    pub fn collect_tree<S: BlockInputStream + ?Sized>(&self, root: &S) {
        self.collect_at(root, "0");
    }

    fn collect_at<S: BlockInputStream + ?Sized>(&self, stream: &S, path: &str) {
        let children = stream.core().children();
        let rows_in = children.iter().map(|c| c.profile().rows).sum();
        self.record(
            &format!("{path}:{}", stream.name()),
            OperatorMetrics::from_profile(&stream.profile(), rows_in),
        );
        for (i, child) in children.iter().enumerate() {
            self.collect_at(child.as_ref(), &format!("{path}.{i}"));
        }
    }

    /// Get metrics for a stream.
    pub fn get(&self, stream_id: &str) -> Option<OperatorMetrics> {
        self.metrics.read().get(stream_id).cloned()
    }

    /// Number of streams recorded.
    pub fn len(&self) -> usize {
        self.metrics.read().len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.metrics.read().is_empty()
    }

    /// Clear all metrics.
    pub fn clear(&self) {
        self.metrics.write().clear();
    }

    /// Get total rows returned across all streams.
    pub fn total_rows_out(&self) -> u64 {
        self.metrics.read().values().map(|m| m.rows_out).sum()
    }

    /// Format metrics, one stream per line.
    pub fn format_analyze(&self) -> String {
        let metrics = self.metrics.read();
        let mut output = String::new();

        for (stream, m) in metrics.iter() {
            let _ = writeln!(output, "{stream}: {m}");
        }

        if output.is_empty() {
            output.push_str("No metrics collected.\n");
        }

        output
    }
}

/// Snapshot of a stream tree with the metrics of each node, for display.
#[derive(Debug, Clone)]
pub struct ProfileNode {
    /// Stream name.
    pub name: &'static str,
    /// Stream metrics.
    pub metrics: OperatorMetrics,
    /// Child snapshots, in order.
    pub children: Vec<ProfileNode>,
}

impl ProfileNode {
    /// Snapshot the tree rooted at `stream`.
    pub fn from_stream<S: BlockInputStream + ?Sized>(stream: &S) -> Self {
        let children: Vec<Self> = stream
            .core()
            .children()
            .iter()
            .map(|c| Self::from_stream(c.as_ref()))
            .collect();
        let rows_in = children.iter().map(|c| c.metrics.rows_out).sum();
        Self {
            name: stream.name(),
            metrics: OperatorMetrics::from_profile(&stream.profile(), rows_in),
            children,
        }
    }
}

impl TreeNode for ProfileNode {
    fn name(&self) -> &str {
        self.name
    }

    fn children(&self) -> Vec<&dyn TreeNode> {
        self.children.iter().map(|c| c as &dyn TreeNode).collect()
    }

    fn details(&self) -> Option<String> {
        Some(format!(
            "rows={}, blocks={}, bytes={}",
            self.metrics.rows_out, self.metrics.blocks, self.metrics.bytes
        ))
    }
}
