//! What a completed run of a stream tree hands back to the caller.

use std::fmt::Write;
use std::time::Duration;

use arrow::compute::concat_batches;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;

use common_display::DisplayTree;
use common_error::TributaryResult;

use crate::metrics::{MetricsSink, ProfileNode};
use crate::progress::Progress;

/// Blocks and side results of a stream tree pulled to completion.
#[derive(Debug)]
pub struct ExecutionResult {
    /// Non-empty blocks returned by the root, in order.
    pub batches: Vec<RecordBatch>,
    /// Schema of the root.
    pub schema: SchemaRef,
    /// Totals of the root, if any stream produced them.
    pub totals: Option<RecordBatch>,
    /// Extremes of the root, if tracked.
    pub extremes: Option<RecordBatch>,
    /// Rows that reached the topmost limits, if the tree has any.
    pub rows_before_limit: Option<u64>,
    /// Query-wide progress reported by the leaves.
    pub progress: Progress,
    /// Per-stream metrics, empty unless collection is enabled.
    pub metrics: MetricsSink,
    /// Snapshot of the tree with per-stream metrics.
    pub profile: ProfileNode,
    /// Wall-clock time of the pull loop.
    pub elapsed: Duration,
}

impl ExecutionResult {
    /// Rows returned by the root.
    pub fn total_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    pub fn num_batches(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// All blocks as one; the header if there are none.
    pub fn concat(&self) -> TributaryResult<RecordBatch> {
        Ok(concat_batches(&self.schema, &self.batches)?)
    }

    /// Move the blocks out, leaving the side results in place.
    pub fn take_batches(&mut self) -> Vec<RecordBatch> {
        std::mem::take(&mut self.batches)
    }

    /// Render the stream tree with per-stream rows, blocks and bytes.
    pub fn profile_tree(&self) -> String {
        DisplayTree::new(&self.profile).to_string()
    }

    /// Run summary followed by the profile tree and the flat metrics.
    pub fn explain_analyze(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Execution Time: {:?}", self.elapsed);
        let _ = writeln!(out, "Total Rows: {}", self.total_rows());
        let _ = writeln!(out, "Blocks: {}", self.num_batches());
        let _ = writeln!(out, "Rows Read: {}", self.progress.rows);
        if let Some(rows) = self.rows_before_limit {
            let _ = writeln!(out, "Rows Before Limit: {rows}");
        }
        let _ = write!(out, "\n{}", self.profile_tree());
        if !self.metrics.is_empty() {
            let _ = write!(out, "\nStream Metrics:\n{}", self.metrics.format_analyze());
        }
        out
    }

    /// Rows read by the leaves per second of execution.
    pub fn read_rows_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.progress.rows as f64 / secs
        } else {
            0.0
        }
    }
}

impl IntoIterator for ExecutionResult {
    type Item = RecordBatch;
    type IntoIter = std::vec::IntoIter<RecordBatch>;

    fn into_iter(self) -> Self::IntoIter {
        self.batches.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};

    use crate::metrics::OperatorMetrics;

    fn result(blocks: &[usize]) -> ExecutionResult {
        let schema = Arc::new(Schema::new(vec![Field::new("n", DataType::Int64, false)]));
        let batches = blocks
            .iter()
            .map(|&rows| {
                RecordBatch::try_new(
                    schema.clone(),
                    vec![Arc::new(Int64Array::from_iter_values(0..rows as i64))],
                )
                .unwrap()
            })
            .collect();
        ExecutionResult {
            batches,
            schema,
            totals: None,
            extremes: None,
            rows_before_limit: Some(40),
            progress: Progress::new(40, 320),
            metrics: MetricsSink::new(),
            profile: ProfileNode {
                name: "Limit",
                metrics: OperatorMetrics::new(),
                children: Vec::new(),
            },
            elapsed: Duration::from_secs(2),
        }
    }

    #[test]
    fn test_result_accessors() {
        let mut result = result(&[10, 5]);
        assert_eq!(result.total_rows(), 15);
        assert_eq!(result.num_batches(), 2);
        assert_eq!(result.concat().unwrap().num_rows(), 15);
        assert!((result.read_rows_per_second() - 20.0).abs() < f64::EPSILON);

        let taken = result.take_batches();
        assert_eq!(taken.len(), 2);
        assert!(result.is_empty());
        assert_eq!(result.concat().unwrap().num_rows(), 0);
    }

    #[test]
    fn test_explain_analyze() {
        let text = result(&[3]).explain_analyze();
        assert!(text.contains("Total Rows: 3"));
        assert!(text.contains("Rows Read: 40"));
        assert!(text.contains("Rows Before Limit: 40"));
        assert!(text.contains("Limit (rows=0"));
        assert!(!text.contains("Stream Metrics"));
    }
}
