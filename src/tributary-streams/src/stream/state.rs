//! Lifecycle state of a stream.

use std::fmt;

use common_error::{TributaryError, TributaryResult};

/// Position of a stream in its `prefix → read* → suffix` lifecycle.
///
/// ```text
/// Created → PrefixDone → Reading → {Exhausted | Cancelled} → SuffixDone
/// ```
///
/// Transitions are validated only in debug builds; out-of-order calls are
/// reported as [`TributaryError::LifecycleViolation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamState {
    /// Constructed, `read_prefix` not called yet.
    #[default]
    Created,
    /// `read_prefix` completed.
    PrefixDone,
    /// At least one `read` call made.
    Reading,
    /// `read` returned end-of-stream.
    Exhausted,
    /// `read` observed the cancellation flag.
    Cancelled,
    /// `read_suffix` called.
    SuffixDone,
}

impl StreamState {
    /// Whether `read` may be called.
    pub const fn can_read(self) -> bool {
        matches!(
            self,
            Self::PrefixDone | Self::Reading | Self::Exhausted | Self::Cancelled
        )
    }

    /// Whether the stream will not produce further blocks.
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Exhausted | Self::Cancelled | Self::SuffixDone)
    }

    pub(crate) fn check_prefix(self, stream: &str) -> TributaryResult<()> {
        if cfg!(debug_assertions) && self != Self::Created {
            return Err(violation(stream, "read_prefix", self));
        }
        Ok(())
    }

    pub(crate) fn check_read(self, stream: &str) -> TributaryResult<()> {
        if cfg!(debug_assertions) && !self.can_read() {
            return Err(violation(stream, "read", self));
        }
        Ok(())
    }

    pub(crate) fn check_suffix(self, stream: &str, cancelled: bool) -> TributaryResult<()> {
        if !cfg!(debug_assertions) {
            return Ok(());
        }
        let allowed = match self {
            Self::Exhausted | Self::Cancelled => true,
            Self::SuffixDone => false,
            _ => cancelled,
        };
        if allowed {
            Ok(())
        } else {
            Err(violation(stream, "read_suffix", self))
        }
    }

    pub(crate) fn check_finished(self, stream: &str, what: &str, cancelled: bool) -> TributaryResult<()> {
        if cfg!(debug_assertions) && !self.is_finished() && !cancelled {
            return Err(violation(stream, what, self));
        }
        Ok(())
    }
}

fn violation(stream: &str, call: &str, state: StreamState) -> TributaryError {
    TributaryError::lifecycle(format!("{call} called on {stream} in state {state}"))
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "Created",
            Self::PrefixDone => "PrefixDone",
            Self::Reading => "Reading",
            Self::Exhausted => "Exhausted",
            Self::Cancelled => "Cancelled",
            Self::SuffixDone => "SuffixDone",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_predicates() {
        assert!(!StreamState::Created.can_read());
        assert!(StreamState::PrefixDone.can_read());
        assert!(StreamState::Exhausted.can_read());
        assert!(!StreamState::SuffixDone.can_read());

        assert!(StreamState::Cancelled.is_finished());
        assert!(!StreamState::Reading.is_finished());
    }

    #[test]
    #[cfg(debug_assertions)]
    fn test_transition_checks() {
        assert!(StreamState::Created.check_prefix("Null").is_ok());
        assert!(StreamState::PrefixDone
            .check_prefix("Null")
            .unwrap_err()
            .is_lifecycle_violation());

        assert!(StreamState::Created.check_read("Null").is_err());
        assert!(StreamState::Reading.check_suffix("Null", false).is_err());
        assert!(StreamState::Reading.check_suffix("Null", true).is_ok());
        assert!(StreamState::SuffixDone.check_suffix("Null", true).is_err());

        let err = StreamState::Reading
            .check_finished("Null", "totals", false)
            .unwrap_err();
        assert!(err.to_string().contains("totals called on Null in state Reading"));
    }
}
