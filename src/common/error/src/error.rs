//! Core error types for Tributary.

use thiserror::Error;

/// Result type alias using `TributaryError`.
pub type TributaryResult<T> = std::result::Result<T, TributaryError>;

/// Generic boxed error for external error sources.
pub type GenericError = Box<dyn std::error::Error + Send + Sync>;

/// Core error type for Tributary operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TributaryError {
    /// A read was attempted after the query was killed.
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// A size, time or throughput bound was violated with overflow mode `throw`.
    #[error("ResourceLimitExceeded: {0}")]
    ResourceLimitExceeded(String),

    /// The quota gate rejected the cost of a block.
    #[error("QuotaExceeded: {0}")]
    QuotaExceeded(String),

    /// A sort description was requested from a stream with no declared ordering.
    #[error("UnsortedOutputQueried: {0}")]
    UnsortedOutputQueried(String),

    /// The stream tree is deeper than the caller allows.
    #[error("DepthExceeded: {0}")]
    DepthExceeded(String),

    /// `read_prefix`/`read`/`read_suffix` were called out of order.
    ///
    /// This is a programming error. It is only detected in debug builds.
    #[error("LifecycleViolation: {0}")]
    LifecycleViolation(String),

    /// A block does not match the header of the stream that produced it.
    #[error("SchemaMismatch: {0}")]
    SchemaMismatch(String),

    /// Query execution error.
    #[error("ExecutionError: {0}")]
    ExecutionError(String),

    /// Invalid parameter provided.
    #[error("InvalidParameter: {0}")]
    InvalidParameter(String),

    /// Internal error (bug in Tributary).
    #[error("InternalError: {0}")]
    InternalError(String),

    /// IO error.
    #[error("IoError: {0}")]
    IoError(#[from] std::io::Error),

    /// Arrow error.
    #[error("ArrowError: {0}")]
    ArrowError(#[from] arrow_schema::ArrowError),

    /// JSON serialization error.
    #[error("SerdeJsonError: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    /// External error from third-party libraries.
    #[error("ExternalError: {0}")]
    ExternalError(GenericError),
}

impl TributaryError {
    /// Create a new `Cancelled` error.
    pub fn cancelled<S: Into<String>>(msg: S) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Create a new `ResourceLimitExceeded` error.
    pub fn resource_limit<S: Into<String>>(msg: S) -> Self {
        Self::ResourceLimitExceeded(msg.into())
    }

    /// Create a new `QuotaExceeded` error.
    pub fn quota_exceeded<S: Into<String>>(msg: S) -> Self {
        Self::QuotaExceeded(msg.into())
    }

    /// Create a new `UnsortedOutputQueried` error.
    pub fn not_sorted<S: Into<String>>(msg: S) -> Self {
        Self::UnsortedOutputQueried(msg.into())
    }

    /// Create a new `DepthExceeded` error.
    pub fn depth_exceeded<S: Into<String>>(msg: S) -> Self {
        Self::DepthExceeded(msg.into())
    }

    /// Create a new `LifecycleViolation` error.
    pub fn lifecycle<S: Into<String>>(msg: S) -> Self {
        Self::LifecycleViolation(msg.into())
    }

    /// Create a new `SchemaMismatch` error.
    pub fn schema_mismatch<S: Into<String>>(msg: S) -> Self {
        Self::SchemaMismatch(msg.into())
    }

    /// Create a new `ExecutionError`.
    pub fn execution<S: Into<String>>(msg: S) -> Self {
        Self::ExecutionError(msg.into())
    }

    /// Create a new `InvalidParameter` error.
    pub fn invalid_parameter<S: Into<String>>(msg: S) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Create a new `InternalError`.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::InternalError(msg.into())
    }

    /// Wrap an arbitrary external error.
    pub fn external<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ExternalError(Box::new(err))
    }

    /// Whether this error was raised because the query was killed.
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Whether this error signals a broken lifecycle contract rather than a runtime failure.
    pub const fn is_lifecycle_violation(&self) -> bool {
        matches!(self, Self::LifecycleViolation(_))
    }

    /// Whether this error comes from a per-node limit or the shared quota.
    pub const fn is_limit(&self) -> bool {
        matches!(self, Self::ResourceLimitExceeded(_) | Self::QuotaExceeded(_))
    }
}

/// Ensure a condition holds, returning an `ExecutionError` if not.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $msg:expr) => {
        if !$cond {
            return Err($crate::TributaryError::ExecutionError($msg.to_string()));
        }
    };
    ($cond:expr, $variant:ident: $($msg:tt)*) => {
        if !$cond {
            return Err($crate::TributaryError::$variant(format!($($msg)*)));
        }
    };
}
