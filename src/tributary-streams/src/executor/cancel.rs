//! Cancellation handle.

use std::sync::{Arc, Weak};

use crate::stream::{BlockInputStream, BlockInputStreamExt, StreamRef};

/// Cancels a stream tree from any thread.
///
/// Holds a weak reference, so it does not keep the tree alive.
#[derive(Debug, Clone)]
pub struct CancellationHandle {
    root: Weak<dyn BlockInputStream>,
}

impl CancellationHandle {
    /// Create a handle for the tree rooted at `root`.
    pub fn new(root: &StreamRef) -> Self {
        Self {
            root: Arc::downgrade(root),
        }
    }

    /// Cancel the tree; with `kill` reads fail instead of ending quietly.
    ///
    /// Returns `false` if the tree has already been dropped.
    pub fn cancel(&self, kill: bool) -> bool {
        match self.root.upgrade() {
            Some(root) => {
                root.cancel(kill);
                true
            }
            None => false,
        }
    }

    /// Whether the tree was cancelled (or dropped).
    pub fn is_cancelled(&self) -> bool {
        self.root.upgrade().map_or(true, |root| root.is_cancelled())
    }
}
