//! The block input stream abstraction.
//!
//! A stream produces a lazy, finite, non-restartable sequence of blocks and
//! owns the child streams it pulls from. Implementations provide
//! [`BlockInputStream::read_impl`] and embed a [`StreamCore`]; lifecycle,
//! cancellation, limit, quota and progress handling come from
//! [`BlockInputStreamExt`].

mod base;
mod state;
mod traits;

pub use base::{StreamCore, StreamRef, TableLock};
pub use state::StreamState;
pub use traits::{BlockInputStream, BlockInputStreamExt};
