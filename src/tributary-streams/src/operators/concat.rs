//! Sequential concatenation of streams.

use std::sync::atomic::{AtomicUsize, Ordering};

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;

use common_error::{TributaryError, TributaryResult};

use crate::block::have_equal_structure;
use crate::stream::{BlockInputStream, BlockInputStreamExt, StreamCore, StreamRef};

/// Reads its inputs one after another, in order.
#[derive(Debug)]
pub struct ConcatBlockInputStream {
    core: StreamCore,
    schema: SchemaRef,
    /// Index of the input currently being read.
    current: AtomicUsize,
}

impl ConcatBlockInputStream {
    /// Create a concatenation of `inputs`, which must share one schema.
    pub fn try_new(inputs: Vec<StreamRef>) -> TributaryResult<Self> {
        let Some(first) = inputs.first() else {
            return Err(TributaryError::invalid_parameter(
                "Concat requires at least one input",
            ));
        };
        let schema = first.schema();
        for input in &inputs[1..] {
            if !have_equal_structure(&schema, &input.schema()) {
                return Err(TributaryError::schema_mismatch(format!(
                    "Concat inputs have different structure: {} vs {}",
                    first.tree_id(),
                    input.tree_id()
                )));
            }
        }
        Ok(Self {
            core: StreamCore::with_children(inputs),
            schema,
            current: AtomicUsize::new(0),
        })
    }
}

impl BlockInputStream for ConcatBlockInputStream {
    fn name(&self) -> &'static str {
        "Concat"
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    fn core(&self) -> &StreamCore {
        &self.core
    }

    fn read_impl(&self) -> TributaryResult<Option<RecordBatch>> {
        let children = self.core.children();
        loop {
            let index = self.current.load(Ordering::SeqCst);
            let Some(child) = children.get(index) else {
                return Ok(None);
            };
            if let Some(block) = child.read()? {
                return Ok(Some(block));
            }
            self.current.store(index + 1, Ordering::SeqCst);
        }
    }
}
