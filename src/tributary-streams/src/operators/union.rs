//! Parallel union of streams.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;

use common_error::{TributaryError, TributaryResult};

use crate::block::have_equal_structure;
use crate::stream::{BlockInputStream, BlockInputStreamExt, StreamCore, StreamRef};

/// Default number of blocks buffered between the workers and the reader.
pub const DEFAULT_UNION_QUEUE_SIZE: usize = 16;

#[derive(Debug)]
enum UnionMessage {
    Block(RecordBatch),
    Finished,
    Failed(TributaryError),
}

/// Reads all inputs concurrently and returns their blocks in arrival order.
///
/// Each input is driven by its own worker thread, from `read_prefix` to
/// end-of-stream. The union's suffix stops and joins the workers before it
/// finalizes the inputs, so every input's lifecycle is driven by one thread
/// at a time.
#[derive(Debug)]
pub struct UnionBlockInputStream {
    core: StreamCore,
    schema: SchemaRef,
    queue_size: usize,
    receiver: Mutex<Option<Receiver<UnionMessage>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    finished_workers: AtomicUsize,
}

impl UnionBlockInputStream {
    /// Create a union of `inputs`, which must share one schema.
    pub fn try_new(inputs: Vec<StreamRef>) -> TributaryResult<Self> {
        let Some(first) = inputs.first() else {
            return Err(TributaryError::invalid_parameter(
                "Union requires at least one input",
            ));
        };
        let schema = first.schema();
        if let Some(other) = inputs
            .iter()
            .find(|input| !have_equal_structure(&schema, &input.schema()))
        {
            return Err(TributaryError::schema_mismatch(format!(
                "Union inputs have different structure: {} vs {}",
                first.tree_id(),
                other.tree_id()
            )));
        }
        Ok(Self {
            core: StreamCore::with_children(inputs),
            schema,
            queue_size: DEFAULT_UNION_QUEUE_SIZE,
            receiver: Mutex::new(None),
            workers: Mutex::new(Vec::new()),
            finished_workers: AtomicUsize::new(0),
        })
    }

    /// Set how many blocks may be buffered ahead of the reader.
    #[must_use]
    pub fn with_queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = queue_size.max(1);
        self
    }

    /// Stop the workers and wait for them.
    ///
    /// Dropping the receiver unblocks workers waiting on a full queue.
    fn join_workers(&self) -> TributaryResult<()> {
        drop(self.receiver.lock().take());
        let workers = std::mem::take(&mut *self.workers.lock());
        let mut result = Ok(());
        for worker in workers {
            if worker.join().is_err() && result.is_ok() {
                result = Err(TributaryError::internal("Union worker thread panicked"));
            }
        }
        result
    }
}

fn run_worker(input: &StreamRef, sender: &Sender<UnionMessage>) -> TributaryResult<()> {
    input.read_prefix()?;
    while let Some(block) = input.read()? {
        if sender.send(UnionMessage::Block(block)).is_err() {
            // Reader is gone.
            break;
        }
    }
    Ok(())
}

impl BlockInputStream for UnionBlockInputStream {
    fn name(&self) -> &'static str {
        "Union"
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    fn core(&self) -> &StreamCore {
        &self.core
    }

    fn drive_prefix(&self) -> TributaryResult<()> {
        let (sender, receiver) = bounded(self.queue_size);
        *self.receiver.lock() = Some(receiver);

        let mut workers = self.workers.lock();
        for (index, input) in self.core.children().into_iter().enumerate() {
            let sender = sender.clone();
            let handle = thread::Builder::new()
                .name(format!("union-input-{index}"))
                .spawn(move || {
                    let message = match run_worker(&input, &sender) {
                        Ok(()) => UnionMessage::Finished,
                        Err(e) => UnionMessage::Failed(e),
                    };
                    let _ = sender.send(message);
                })?;
            workers.push(handle);
        }
        log::debug!("Union started {} workers", workers.len());
        drop(workers);

        self.read_prefix_impl()
    }

    fn read_impl(&self) -> TributaryResult<Option<RecordBatch>> {
        let Some(receiver) = self.receiver.lock().clone() else {
            return Ok(None);
        };
        let num_workers = self.core.num_children();

        while self.finished_workers.load(Ordering::SeqCst) < num_workers {
            match receiver.recv() {
                Ok(UnionMessage::Block(block)) => return Ok(Some(block)),
                Ok(UnionMessage::Finished) => {
                    self.finished_workers.fetch_add(1, Ordering::SeqCst);
                }
                Ok(UnionMessage::Failed(e)) => {
                    self.finished_workers.fetch_add(1, Ordering::SeqCst);
                    log::debug!("Union input failed, cancelling the others: {e}");
                    self.cancel(false);
                    return Err(e);
                }
                Err(_) => return Ok(None),
            }
        }
        Ok(None)
    }

    fn drive_suffix(&self) -> TributaryResult<()> {
        self.join_workers()?;
        for input in self.core.children() {
            input.read_suffix()?;
        }
        self.read_suffix_impl()
    }
}

impl Drop for UnionBlockInputStream {
    fn drop(&mut self) {
        if self.workers.get_mut().is_empty() {
            return;
        }
        self.core.cancel(false);
        if let Err(e) = self.join_workers() {
            log::warn!("Error while stopping union workers: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};

    use crate::operators::BlocksListInputStream;

    fn leaf(blocks: usize, rows: usize) -> StreamRef {
        let schema = Arc::new(Schema::new(vec![Field::new("n", DataType::Int64, false)]));
        let blocks = (0..blocks)
            .map(|_| {
                RecordBatch::try_new(
                    schema.clone(),
                    vec![Arc::new(Int64Array::from_iter_values(0..rows as i64))],
                )
                .unwrap()
            })
            .collect();
        Arc::new(BlocksListInputStream::new(schema, blocks))
    }

    #[test]
    fn test_union_reads_all_inputs() {
        let union = UnionBlockInputStream::try_new(vec![leaf(3, 10), leaf(5, 2), leaf(0, 0)])
            .unwrap()
            .with_queue_size(1);

        union.read_prefix().unwrap();
        let mut rows = 0;
        while let Some(block) = union.read().unwrap() {
            rows += block.num_rows();
        }
        union.read_suffix().unwrap();

        assert_eq!(rows, 40);
        assert_eq!(union.profile().blocks, 8);
        for input in union.core().children() {
            assert!(input.state().is_finished());
        }
    }

    #[test]
    fn test_union_cancel_stops_workers() {
        let union = UnionBlockInputStream::try_new(vec![leaf(1000, 1), leaf(1000, 1)])
            .unwrap()
            .with_queue_size(1);

        union.read_prefix().unwrap();
        assert!(union.read().unwrap().is_some());
        union.cancel(false);

        assert!(union.read().unwrap().is_none());
        union.read_suffix().unwrap();
        for input in union.core().children() {
            assert!(input.is_cancelled());
        }
    }

    #[test]
    fn test_union_drop_without_suffix() {
        let union = UnionBlockInputStream::try_new(vec![leaf(100, 1)])
            .unwrap()
            .with_queue_size(1);
        union.read_prefix().unwrap();
        assert!(union.read().unwrap().is_some());
        drop(union);
    }
}
