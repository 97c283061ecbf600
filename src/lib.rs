//! Tributary - pull-based block-streaming execution core for a columnar
//! query engine.
//!
//! Queries run as trees of block streams: each stream pulls Arrow record
//! batches from its children, and cancellation, limits and progress
//! reporting flow through the tree.

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

// Re-export core crates
pub use common_config as config;
pub use common_display as display;
pub use common_error as error;
pub use tributary_streams as streams;

/// Tributary version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
