//! Property tests for stream invariants that must hold for any input shape.

use std::sync::Arc;

use arrow::array::Int64Array;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use proptest::prelude::*;

use tributary_streams::{
    BlockInputStream, BlockInputStreamExt, BlocksListInputStream, ConcatBlockInputStream,
    LimitBlockInputStream, OverflowMode, Progress, SizeLimits, StreamRef,
};

fn schema() -> SchemaRef {
    Arc::new(Schema::new(vec![Field::new("n", DataType::Int64, false)]))
}

/// Leaf holding one block per entry of `sizes`.
fn leaf(sizes: &[usize]) -> Arc<BlocksListInputStream> {
    let blocks = sizes
        .iter()
        .map(|&rows| {
            RecordBatch::try_new(
                schema(),
                vec![Arc::new(Int64Array::from_iter_values(0..rows as i64))],
            )
            .unwrap()
        })
        .collect();
    Arc::new(BlocksListInputStream::new(schema(), blocks))
}

fn tree(shape: &[Vec<usize>]) -> (Arc<ConcatBlockInputStream>, Vec<Arc<BlocksListInputStream>>) {
    let leaves: Vec<_> = shape.iter().map(|sizes| leaf(sizes)).collect();
    let inputs = leaves.iter().map(|l| Arc::clone(l) as StreamRef).collect();
    (Arc::new(ConcatBlockInputStream::try_new(inputs).unwrap()), leaves)
}

fn shapes() -> impl Strategy<Value = Vec<Vec<usize>>> {
    prop::collection::vec(prop::collection::vec(0usize..20, 0..6), 1..5)
}

proptest! {
    #[test]
    fn test_every_block_matches_header(shape in shapes()) {
        let (root, _) = tree(&shape);
        let header = root.header();
        prop_assert_eq!(header.num_rows(), 0);

        root.read_prefix().unwrap();
        let mut rows = 0;
        while let Some(block) = root.read().unwrap() {
            prop_assert_eq!(block.schema(), header.schema());
            rows += block.num_rows();
        }
        root.read_suffix().unwrap();

        let expected: usize = shape.iter().flatten().sum();
        prop_assert_eq!(rows, expected);
        prop_assert_eq!(root.profile().rows, expected as u64);
    }

    #[test]
    fn test_cancel_is_idempotent(shape in shapes(), calls in prop::collection::vec(any::<bool>(), 1..10)) {
        let (root, leaves) = tree(&shape);
        root.read_prefix().unwrap();

        for &kill in &calls {
            root.cancel(kill);
        }
        let killed = calls.iter().any(|&kill| kill);

        for leaf in &leaves {
            prop_assert!(leaf.is_cancelled());
            prop_assert_eq!(leaf.core().is_killed(), killed);
            prop_assert_eq!(leaf.remaining(), 0);
        }
        prop_assert_eq!(root.read().is_err(), killed);
    }

    #[test]
    fn test_limit_never_exceeds(shape in shapes(), limit in 0usize..100, offset in 0usize..30) {
        let (source, _) = tree(&shape);
        let root = LimitBlockInputStream::new(source, limit).with_offset(offset);

        root.read_prefix().unwrap();
        let mut rows = 0;
        while let Some(block) = root.read().unwrap() {
            rows += block.num_rows();
        }
        root.read_suffix().unwrap();

        let available: usize = shape.iter().flatten().sum();
        prop_assert_eq!(rows, available.saturating_sub(offset).min(limit));
    }

    #[test]
    fn test_size_limits_break_never_errors(rows in any::<u32>(), max_rows in any::<u32>()) {
        let limits = SizeLimits::new(u64::from(max_rows), 0, OverflowMode::Break);
        let within = limits.check(u64::from(rows), 0, "result").unwrap();
        prop_assert_eq!(within, max_rows == 0 || rows <= max_rows);
    }

    #[test]
    fn test_approx_rows_reported_once(hints in prop::collection::vec(1u64..1000, 1..5)) {
        let reported = Arc::new(parking_lot::Mutex::new(Vec::<Progress>::new()));
        let sink = Arc::clone(&reported);
        let stream = leaf(&[1, 1, 1]);
        stream.set_progress_callback(Arc::new(move |p: &Progress| sink.lock().push(*p)));
        for &hint in &hints {
            stream.add_total_rows_approx(hint);
        }

        stream.read_prefix().unwrap();
        while stream.read().unwrap().is_some() {}

        let total: u64 = reported.lock().iter().map(|p| p.total_rows).sum();
        prop_assert_eq!(total, hints.iter().sum::<u64>());
        prop_assert_eq!(stream.total_rows_approx(), hints.iter().sum::<u64>());
    }
}
