//! Pull-based block streams for Tributary.
//!
//! This crate is the execution core every operator plugs into: a tree of
//! [`BlockInputStream`]s, each producing Arrow [`RecordBatch`]es on demand
//! from its children.
//!
//! # Architecture
//!
//! ```text
//!              ┌──────────────┐
//!   caller ──▶ │  root stream │ ── read() ──▶ block | end-of-stream
//!              └──────┬───────┘
//!          read() ▲   │   ▼ cancel(), limits, callback, status
//!                 │   ▼
//!              ┌──────────────┐
//!              │ leaf streams │ ── progress ──▶ callback / QueryStatus
//!              └──────────────┘
//! ```
//!
//! Data is pulled up the tree. Cancellation and configuration flow down.
//! Progress is reported by the leaves (by default) and profiles are kept per
//! stream.
//!
//! # Key Components
//!
//! - [`stream`]: [`BlockInputStream`] trait, [`StreamCore`] bookkeeping and
//!   the [`BlockInputStreamExt`] lifecycle driver
//! - [`limits`]: size, time and throughput limits with overflow modes
//! - [`quota`]: interval quotas shared by the leaves of a query
//! - [`progress`]: progress deltas and the query status handle
//! - [`profile`]: per-stream statistics and rows-before-limit
//! - [`block`]: header, schema and extremes helpers
//! - [`operators`]: reference streams (list, limit, concat, union, sort, ...)
//! - [`executor`]: [`StreamExecutor`] pull loop and [`ExecutionResult`]
//! - [`metrics`]: [`MetricsSink`] and profile trees
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tributary_streams::{BlocksListInputStream, LimitBlockInputStream, StreamExecutor};
//!
//! let source = Arc::new(BlocksListInputStream::new(schema, blocks));
//! let root = Arc::new(LimitBlockInputStream::new(source, 100));
//!
//! let result = StreamExecutor::new().execute(root)?;
//! println!("{}", result.profile_tree());
//! ```
//!
//! [`RecordBatch`]: arrow::record_batch::RecordBatch

#![allow(clippy::missing_const_for_fn)] // Builder patterns often can't be const
#![allow(clippy::doc_markdown)] // Documentation backticks are sometimes unnecessary
#![allow(
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation
)] // Some casts are intentional
#![allow(clippy::module_name_repetitions)] // Stream types are named after the module
#![allow(clippy::significant_drop_tightening)] // Some temporaries with Drop must stay alive
#![allow(clippy::option_if_let_else)] // if let/else is sometimes clearer than map_or

pub mod block;
pub mod executor;
pub mod limits;
pub mod metrics;
pub mod operators;
pub mod profile;
pub mod progress;
pub mod quota;
pub mod stream;

// Re-export commonly used types
pub use block::{SortColumnDescription, SortDescription};
pub use executor::{CancellationHandle, ExecutionResult, StreamExecutor};
pub use limits::{LimitsMode, LocalLimits, OverflowMode, SizeLimits};
pub use metrics::{MetricsSink, OperatorMetrics, ProfileNode};
pub use operators::{
    BlocksListInputStream, ConcatBlockInputStream, LimitBlockInputStream, NullBlockInputStream,
    ProjectionBlockInputStream, SortingBlockInputStream, UnionBlockInputStream,
};
pub use profile::{rows_before_limit, StreamProfile};
pub use progress::{Progress, ProgressCallback, QueryProgressStatus, QueryStatus, StatusHandle};
pub use quota::{IntervalQuota, QuotaGate, QuotaHandle, QuotaInterval};
pub use stream::{
    BlockInputStream, BlockInputStreamExt, StreamCore, StreamRef, StreamState, TableLock,
};
