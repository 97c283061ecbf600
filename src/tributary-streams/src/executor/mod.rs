//! Stream tree execution.
//!
//! - [`StreamExecutor`]: Applies settings to a tree and pulls it to completion
//! - [`ExecutionResult`]: Blocks, totals, extremes and profile of a run
//! - [`CancellationHandle`]: Cancels a running tree from another thread

mod cancel;
mod local;
mod result;

pub use cancel::CancellationHandle;
pub use local::StreamExecutor;
pub use result::ExecutionResult;
