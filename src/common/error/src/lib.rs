//! Error types and result aliases for Tributary.
//!
//! Every crate in the workspace reports failures through [`TributaryError`].
//! The variants mirror the failure classes of the block-stream core:
//! cancellation, resource limits, quotas, ordering queries, plan depth and
//! lifecycle contract violations.

mod error;

pub use error::{GenericError, TributaryError, TributaryResult};
