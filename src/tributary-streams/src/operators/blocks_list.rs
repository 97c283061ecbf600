//! Stream over an in-memory list of blocks.

use std::collections::VecDeque;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use parking_lot::Mutex;

use common_error::TributaryResult;

use crate::stream::{BlockInputStream, StreamCore};

/// Leaf stream that returns a fixed list of blocks in order.
///
/// Cancelling the stream drops the blocks not yet returned.
#[derive(Debug)]
pub struct BlocksListInputStream {
    core: StreamCore,
    schema: SchemaRef,
    blocks: Mutex<VecDeque<RecordBatch>>,
}

impl BlocksListInputStream {
    /// Create a stream replaying `blocks`, which must all match `schema`.
    pub fn new(schema: SchemaRef, blocks: Vec<RecordBatch>) -> Self {
        Self {
            core: StreamCore::new(),
            schema,
            blocks: Mutex::new(blocks.into()),
        }
    }

    /// Attach totals reported after the stream is exhausted.
    #[must_use]
    pub fn with_totals(self, totals: RecordBatch) -> Self {
        self.core.set_totals(Some(totals));
        self
    }

    /// Blocks not yet returned.
    pub fn remaining(&self) -> usize {
        self.blocks.lock().len()
    }
}

impl BlockInputStream for BlocksListInputStream {
    fn name(&self) -> &'static str {
        "BlocksList"
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    fn core(&self) -> &StreamCore {
        &self.core
    }

    fn read_impl(&self) -> TributaryResult<Option<RecordBatch>> {
        Ok(self.blocks.lock().pop_front())
    }

    fn cancel(&self, kill: bool) {
        self.core.cancel(kill);
        self.blocks.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};

    use crate::stream::BlockInputStreamExt;

    fn batch(schema: &SchemaRef, values: Vec<i64>) -> RecordBatch {
        RecordBatch::try_new(schema.clone(), vec![Arc::new(Int64Array::from(values))]).unwrap()
    }

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![Field::new("n", DataType::Int64, false)]))
    }

    #[test]
    fn test_replays_blocks_in_order() {
        let schema = schema();
        let stream = BlocksListInputStream::new(
            schema.clone(),
            vec![batch(&schema, vec![1, 2]), batch(&schema, vec![3])],
        );

        stream.read_prefix().unwrap();
        assert_eq!(stream.read().unwrap().unwrap().num_rows(), 2);
        assert_eq!(stream.read().unwrap().unwrap().num_rows(), 1);
        assert!(stream.read().unwrap().is_none());
        stream.read_suffix().unwrap();

        let profile = stream.profile();
        assert_eq!(profile.rows, 3);
        assert_eq!(profile.blocks, 2);
    }

    #[test]
    fn test_cancel_discards_buffered_blocks() {
        let schema = schema();
        let stream = BlocksListInputStream::new(
            schema.clone(),
            vec![batch(&schema, vec![1]), batch(&schema, vec![2])],
        );

        stream.read_prefix().unwrap();
        assert!(stream.read().unwrap().is_some());
        stream.cancel(false);

        assert_eq!(stream.remaining(), 0);
        assert!(stream.read().unwrap().is_none());
        stream.read_suffix().unwrap();
    }

    #[test]
    fn test_totals() {
        let schema = schema();
        let stream = BlocksListInputStream::new(schema.clone(), vec![batch(&schema, vec![1])])
            .with_totals(batch(&schema, vec![42]));

        stream.read_prefix().unwrap();
        while stream.read().unwrap().is_some() {}

        let totals = stream.totals().unwrap().unwrap();
        assert_eq!(totals.num_rows(), 1);
        stream.read_suffix().unwrap();
    }
}
