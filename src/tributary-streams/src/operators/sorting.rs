//! Full sort of the input.

use std::collections::VecDeque;
use std::sync::Arc;

use arrow::compute::{concat_batches, lexsort_to_indices, take_record_batch, SortColumn};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use parking_lot::Mutex;

use common_error::{TributaryError, TributaryResult};

use crate::block::SortDescription;
use crate::stream::{BlockInputStream, BlockInputStreamExt, StreamCore, StreamRef};

/// Default number of rows per output block.
pub const DEFAULT_MAX_BLOCK_SIZE: usize = 65_536;

/// Sort execution stream.
///
/// This is a **blocking** stream: the first `read` consumes the whole input.
/// Cancellation is polled between input blocks, and cancelling discards
/// everything buffered so far.
#[derive(Debug)]
pub struct SortingBlockInputStream {
    core: StreamCore,
    /// Input stream.
    input: StreamRef,
    /// Sort keys.
    description: SortDescription,
    /// Rows per output block.
    max_block_size: usize,
    /// Sorted output not yet returned; `None` until the input is consumed.
    sorted: Mutex<Option<VecDeque<RecordBatch>>>,
}

impl SortingBlockInputStream {
    /// Create a new sorting stream.
    pub fn new(input: StreamRef, description: SortDescription) -> Self {
        Self {
            core: StreamCore::with_children(vec![Arc::clone(&input)]),
            input,
            description,
            max_block_size: DEFAULT_MAX_BLOCK_SIZE,
            sorted: Mutex::new(None),
        }
    }

    /// Set the number of rows per output block.
    #[must_use]
    pub fn with_max_block_size(mut self, max_block_size: usize) -> Self {
        self.max_block_size = max_block_size.max(1);
        self
    }

    /// Get sort keys.
    pub fn description(&self) -> &SortDescription {
        &self.description
    }

    /// Pull the whole input, or `None` if cancelled midway.
    fn consume_input(&self) -> TributaryResult<Option<Vec<RecordBatch>>> {
        let mut blocks = Vec::new();
        while let Some(block) = self.input.read()? {
            if self.is_cancelled_or_error_if_killed()? {
                return Ok(None);
            }
            blocks.push(block);
        }
        // The input also ends early when we are cancelled.
        if self.is_cancelled_or_error_if_killed()? {
            return Ok(None);
        }
        Ok(Some(blocks))
    }

    fn sort_blocks(&self, blocks: &[RecordBatch]) -> TributaryResult<VecDeque<RecordBatch>> {
        let schema = self.input.schema();
        let combined = concat_batches(&schema, blocks)?;
        if combined.num_rows() == 0 {
            return Ok(VecDeque::new());
        }

        let sort_columns = self
            .description
            .iter()
            .map(|key| {
                let values = combined.column_by_name(&key.column_name).ok_or_else(|| {
                    TributaryError::invalid_parameter(format!(
                        "Sort column '{}' not found",
                        key.column_name
                    ))
                })?;
                Ok(SortColumn {
                    values: Arc::clone(values),
                    options: Some(key.options),
                })
            })
            .collect::<TributaryResult<Vec<_>>>()?;

        let sorted = if sort_columns.is_empty() {
            combined
        } else {
            let indices = lexsort_to_indices(&sort_columns, None)?;
            take_record_batch(&combined, &indices)?
        };

        let mut output = VecDeque::new();
        let mut offset = 0;
        while offset < sorted.num_rows() {
            let len = self.max_block_size.min(sorted.num_rows() - offset);
            output.push_back(sorted.slice(offset, len));
            offset += len;
        }
        Ok(output)
    }
}

impl BlockInputStream for SortingBlockInputStream {
    fn name(&self) -> &'static str {
        "MergeSorting"
    }

    fn schema(&self) -> SchemaRef {
        self.input.schema()
    }

    fn core(&self) -> &StreamCore {
        &self.core
    }

    fn read_impl(&self) -> TributaryResult<Option<RecordBatch>> {
        if self.sorted.lock().is_none() {
            let Some(blocks) = self.consume_input()? else {
                return Ok(None);
            };
            let sorted = self.sort_blocks(&blocks)?;
            log::debug!(
                "{}: sorted {} input blocks into {} output blocks",
                self.name(),
                blocks.len(),
                sorted.len()
            );
            *self.sorted.lock() = Some(sorted);
        }
        Ok(self.sorted.lock().as_mut().and_then(VecDeque::pop_front))
    }

    fn is_sorted_output(&self) -> bool {
        true
    }

    fn sort_description(&self) -> TributaryResult<SortDescription> {
        Ok(self.description.clone())
    }

    fn cancel(&self, kill: bool) {
        self.core.cancel(kill);
        if let Some(sorted) = self.sorted.lock().as_mut() {
            sorted.clear();
        }
    }
}
