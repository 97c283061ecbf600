//! Empty stream.

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;

use common_error::TributaryResult;

use crate::stream::{BlockInputStream, StreamCore};

/// Leaf stream that returns end-of-stream immediately.
#[derive(Debug)]
pub struct NullBlockInputStream {
    core: StreamCore,
    schema: SchemaRef,
}

impl NullBlockInputStream {
    /// Create an empty stream with the given header schema.
    pub fn new(schema: SchemaRef) -> Self {
        Self {
            core: StreamCore::new(),
            schema,
        }
    }
}

impl BlockInputStream for NullBlockInputStream {
    fn name(&self) -> &'static str {
        "Null"
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    fn core(&self) -> &StreamCore {
        &self.core
    }

    fn read_impl(&self) -> TributaryResult<Option<RecordBatch>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use arrow::datatypes::{DataType, Field, Schema};

    use crate::stream::BlockInputStreamExt;

    #[test]
    fn test_null_stream() {
        let schema = Arc::new(Schema::new(vec![Field::new("x", DataType::Utf8, true)]));
        let stream = NullBlockInputStream::new(schema.clone());

        assert_eq!(stream.header().num_rows(), 0);
        assert_eq!(stream.header().schema(), schema);

        stream.read_prefix().unwrap();
        assert!(stream.read().unwrap().is_none());
        stream.read_suffix().unwrap();

        assert_eq!(stream.profile().rows, 0);
        assert!(stream.totals().unwrap().is_none());
    }
}
