//! Column projection stream.

use std::sync::Arc;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;

use common_error::{TributaryError, TributaryResult};

use crate::block::SortDescription;
use crate::stream::{BlockInputStream, BlockInputStreamExt, StreamCore, StreamRef};

/// Keeps a subset of the input columns, in the given order.
///
/// Totals and extremes of the input are projected the same way.
#[derive(Debug)]
pub struct ProjectionBlockInputStream {
    core: StreamCore,
    /// Input stream.
    input: StreamRef,
    /// Input column positions, in output order.
    indices: Vec<usize>,
    /// Output schema.
    schema: SchemaRef,
}

impl ProjectionBlockInputStream {
    /// Create a projection selecting `column_names` from `input`.
    pub fn columns(input: StreamRef, column_names: &[&str]) -> TributaryResult<Self> {
        let input_schema = input.schema();
        let indices = column_names
            .iter()
            .map(|name| {
                input_schema.index_of(name).map_err(|_| {
                    TributaryError::invalid_parameter(format!(
                        "Column '{name}' not found in the output of {}",
                        input.name()
                    ))
                })
            })
            .collect::<TributaryResult<Vec<_>>>()?;
        let schema = Arc::new(input_schema.project(&indices)?);

        Ok(Self {
            core: StreamCore::with_children(vec![Arc::clone(&input)]),
            input,
            indices,
            schema,
        })
    }

    fn project(&self, block: Option<RecordBatch>) -> TributaryResult<Option<RecordBatch>> {
        block
            .map(|b| b.project(&self.indices).map_err(TributaryError::from))
            .transpose()
    }
}

impl BlockInputStream for ProjectionBlockInputStream {
    fn name(&self) -> &'static str {
        "Projection"
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    fn core(&self) -> &StreamCore {
        &self.core
    }

    fn read_impl(&self) -> TributaryResult<Option<RecordBatch>> {
        let block = self.input.read()?;
        self.project(block)
    }

    fn is_sorted_output(&self) -> bool {
        self.sort_description().is_ok()
    }

    /// The input's ordering, as long as every sort column survives.
    fn sort_description(&self) -> TributaryResult<SortDescription> {
        let description = self.input.sort_description()?;
        if let Some(missing) = description
            .iter()
            .find(|c| self.schema.index_of(&c.column_name).is_err())
        {
            return Err(TributaryError::not_sorted(format!(
                "Output of {} is not sorted: sort column {} is projected away",
                self.name(),
                missing.column_name
            )));
        }
        Ok(description)
    }

    fn totals(&self) -> TributaryResult<Option<RecordBatch>> {
        if let Some(totals) = self.core.own_totals() {
            return Ok(Some(totals));
        }
        let totals = self.input.totals()?;
        self.project(totals)
    }

    fn extremes(&self) -> TributaryResult<Option<RecordBatch>> {
        if let Some(extremes) = self.core.own_extremes() {
            return Ok(Some(extremes));
        }
        let extremes = self.input.extremes()?;
        self.project(extremes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use arrow::array::{Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};

    use crate::block::SortColumnDescription;
    use crate::operators::{BlocksListInputStream, SortingBlockInputStream};

    fn people() -> (SchemaRef, RecordBatch) {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
        ]));
        let block = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int64Array::from(vec![2, 1])),
                Arc::new(StringArray::from(vec!["b", "a"])),
            ],
        )
        .unwrap();
        (schema, block)
    }

    #[test]
    fn test_projection_columns() {
        let (schema, block) = people();
        let totals = block.slice(0, 1);
        let input = Arc::new(BlocksListInputStream::new(schema, vec![block]).with_totals(totals));
        let projection = ProjectionBlockInputStream::columns(input, &["name"]).unwrap();

        assert_eq!(projection.header().num_columns(), 1);

        projection.read_prefix().unwrap();
        let out = projection.read().unwrap().unwrap();
        assert_eq!(out.schema().field(0).name(), "name");
        assert_eq!(out.num_rows(), 2);
        assert!(projection.read().unwrap().is_none());

        let totals = projection.totals().unwrap().unwrap();
        assert_eq!(totals.num_columns(), 1);
        projection.read_suffix().unwrap();
    }

    #[test]
    fn test_projection_unknown_column() {
        let (schema, block) = people();
        let input = Arc::new(BlocksListInputStream::new(schema, vec![block]));
        let err = ProjectionBlockInputStream::columns(input, &["missing"]).unwrap_err();
        assert!(matches!(err, TributaryError::InvalidParameter(_)));
    }

    #[test]
    fn test_projection_sortedness() {
        let (schema, block) = people();
        let sorted: StreamRef = Arc::new(SortingBlockInputStream::new(
            Arc::new(BlocksListInputStream::new(schema, vec![block])),
            vec![SortColumnDescription::asc("id")],
        ));

        let keeps_key = ProjectionBlockInputStream::columns(Arc::clone(&sorted), &["id"]).unwrap();
        assert!(keeps_key.is_sorted_output());
        assert_eq!(keeps_key.sort_description().unwrap().len(), 1);

        let drops_key = ProjectionBlockInputStream::columns(sorted, &["name"]).unwrap();
        assert!(!drops_key.is_sorted_output());
        assert!(matches!(
            drops_key.sort_description(),
            Err(TributaryError::UnsortedOutputQueried(_))
        ));
    }
}
