//! Block helpers.
//!
//! A block is an Arrow [`RecordBatch`]: named, typed columns of equal length.
//! A zero-row batch carrying the full schema is the stream *header*.

use std::fmt;
use std::sync::Arc;

use arrow::array::{make_comparator, new_null_array, Array, ArrayRef, UInt32Array};
use arrow::compute::{concat_batches, take, SortOptions};
use arrow::datatypes::{Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;

use common_error::{TributaryError, TributaryResult};

/// Build the header block (zero rows, full schema) for a schema.
pub fn header_block(schema: &SchemaRef) -> RecordBatch {
    RecordBatch::new_empty(Arc::clone(schema))
}

/// Approximate in-memory size of a block in bytes.
pub fn block_bytes(block: &RecordBatch) -> u64 {
    block.get_array_memory_size() as u64
}

/// Whether two schemas have the same column names, order and types.
///
/// Nullability and metadata are not compared.
pub fn have_equal_structure(lhs: &Schema, rhs: &Schema) -> bool {
    lhs.fields().len() == rhs.fields().len()
        && lhs
            .fields()
            .iter()
            .zip(rhs.fields().iter())
            .all(|(l, r)| l.name() == r.name() && l.data_type() == r.data_type())
}

/// Check that a block produced by `stream` matches the stream header.
pub fn check_equal_structure(
    header: &SchemaRef,
    block: &RecordBatch,
    stream: &str,
) -> TributaryResult<()> {
    let actual = block.schema();
    if Arc::ptr_eq(header, &actual) || have_equal_structure(header, &actual) {
        return Ok(());
    }
    Err(TributaryError::schema_mismatch(format!(
        "block returned by {stream} does not match its header: expected [{}], got [{}]",
        describe_columns(header),
        describe_columns(&actual)
    )))
}

fn describe_columns(schema: &Schema) -> String {
    schema
        .fields()
        .iter()
        .map(|f| format!("{} {}", f.name(), f.data_type()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Ordering of one column in a [`SortDescription`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortColumnDescription {
    /// Column name.
    pub column_name: String,
    /// Direction and null placement.
    pub options: SortOptions,
}

impl SortColumnDescription {
    /// Ascending, nulls last.
    pub fn asc(column_name: impl Into<String>) -> Self {
        Self {
            column_name: column_name.into(),
            options: SortOptions {
                descending: false,
                nulls_first: false,
            },
        }
    }

    /// Descending, nulls first.
    pub fn desc(column_name: impl Into<String>) -> Self {
        Self {
            column_name: column_name.into(),
            options: SortOptions {
                descending: true,
                nulls_first: true,
            },
        }
    }
}

impl fmt::Display for SortColumnDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = if self.options.descending { "DESC" } else { "ASC" };
        let nulls = if self.options.nulls_first {
            "NULLS FIRST"
        } else {
            "NULLS LAST"
        };
        write!(f, "{} {direction} {nulls}", self.column_name)
    }
}

/// Sort key ordering guaranteed by a stream.
pub type SortDescription = Vec<SortColumnDescription>;

/// Fold a block into the running extremes.
///
/// Extremes are a two-row block with the same schema as the data: the first
/// row holds per-column minimums, the second row the maximums. Nulls are
/// ignored unless a column is entirely null. Columns whose type has no
/// ordering (e.g. `Null`, `Map`) get two null rows, so every field of the
/// extremes schema is nullable.
pub fn merge_extremes(
    current: Option<&RecordBatch>,
    block: &RecordBatch,
) -> TributaryResult<Option<RecordBatch>> {
    if block.num_rows() == 0 {
        return Ok(current.cloned());
    }
    let fresh = extremes_of(block)?;
    match current {
        None => Ok(Some(fresh)),
        Some(existing) => {
            let combined = concat_batches(&fresh.schema(), [existing, &fresh])?;
            Ok(Some(extremes_of(&combined)?))
        }
    }
}

fn extremes_of(block: &RecordBatch) -> TributaryResult<RecordBatch> {
    let schema = block.schema();
    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .map(|f| f.as_ref().clone().with_nullable(true))
        .collect();
    let columns = block
        .columns()
        .iter()
        .map(column_extremes)
        .collect::<TributaryResult<Vec<_>>>()?;
    Ok(RecordBatch::try_new(
        Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone())),
        columns,
    )?)
}

/// Minimum and maximum of a column in one linear pass.
fn column_extremes(column: &ArrayRef) -> TributaryResult<ArrayRef> {
    let Ok(compare) = make_comparator(column.as_ref(), column.as_ref(), SortOptions::default())
    else {
        return Ok(new_null_array(column.data_type(), 2));
    };
    let nulls = column.logical_nulls();
    let mut valid = (0..column.len()).filter(|&i| nulls.as_ref().map_or(true, |n| n.is_valid(i)));
    let Some(first) = valid.next() else {
        return Ok(new_null_array(column.data_type(), 2));
    };

    let (mut min, mut max) = (first, first);
    for i in valid {
        if compare(i, min).is_lt() {
            min = i;
        }
        if compare(i, max).is_gt() {
            max = i;
        }
    }
    let picked = UInt32Array::from(vec![min as u32, max as u32]);
    Ok(take(column.as_ref(), &picked, None)?)
}
