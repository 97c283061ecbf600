//! Limit stream.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;

use common_error::TributaryResult;

use crate::block::SortDescription;
use crate::profile::LIMIT_STREAM_NAME;
use crate::stream::{BlockInputStream, BlockInputStreamExt, StreamCore, StreamRef};

/// Returns at most `limit` rows of its input after skipping `offset` rows.
///
/// Once the limit is reached the stream ends, which cancels the input.
#[derive(Debug)]
pub struct LimitBlockInputStream {
    core: StreamCore,
    /// Input stream.
    input: StreamRef,
    /// Maximum number of rows to return.
    limit: usize,
    /// Number of rows to skip.
    offset: usize,
    /// Rows returned so far.
    rows_returned: AtomicUsize,
    /// Rows skipped so far.
    rows_skipped: AtomicUsize,
}

impl LimitBlockInputStream {
    /// Create a new limit stream.
    #[must_use]
    pub fn new(input: StreamRef, limit: usize) -> Self {
        Self {
            core: StreamCore::with_children(vec![Arc::clone(&input)]),
            input,
            limit,
            offset: 0,
            rows_returned: AtomicUsize::new(0),
            rows_skipped: AtomicUsize::new(0),
        }
    }

    /// Create with offset.
    #[must_use]
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Get the limit.
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Get the offset.
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Apply the limit to a block that is past the offset.
    fn limit_block(&self, block: RecordBatch) -> Option<RecordBatch> {
        let rows_returned = self.rows_returned.load(Ordering::SeqCst);
        let remaining = self.limit.saturating_sub(rows_returned);
        if remaining == 0 {
            return None;
        }

        let to_return = block.num_rows().min(remaining);
        self.rows_returned.fetch_add(to_return, Ordering::SeqCst);

        if to_return < block.num_rows() {
            Some(block.slice(0, to_return))
        } else {
            Some(block)
        }
    }
}

impl BlockInputStream for LimitBlockInputStream {
    fn name(&self) -> &'static str {
        LIMIT_STREAM_NAME
    }

    fn schema(&self) -> SchemaRef {
        self.input.schema()
    }

    fn core(&self) -> &StreamCore {
        &self.core
    }

    fn read_impl(&self) -> TributaryResult<Option<RecordBatch>> {
        if self.rows_returned.load(Ordering::SeqCst) >= self.limit {
            return Ok(None);
        }

        while let Some(block) = self.input.read()? {
            let block_rows = block.num_rows();

            let rows_skipped = self.rows_skipped.load(Ordering::SeqCst);
            if rows_skipped < self.offset {
                let to_skip = (self.offset - rows_skipped).min(block_rows);
                self.rows_skipped.fetch_add(to_skip, Ordering::SeqCst);

                if to_skip == block_rows {
                    continue;
                }
                return Ok(self.limit_block(block.slice(to_skip, block_rows - to_skip)));
            }

            return Ok(self.limit_block(block));
        }

        Ok(None)
    }

    fn is_sorted_output(&self) -> bool {
        self.input.is_sorted_output()
    }

    fn sort_description(&self) -> TributaryResult<SortDescription> {
        self.input.sort_description()
    }
}
