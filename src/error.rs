//! Error types for session store operations.

use redis::RedisError;

/// Error type for session store operations.
///
/// A missing session is not an error; lookups report absence as `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The stored value could not be decoded as a byte string.
    #[error("parse error: {0}")]
    Parse(String),

    /// Any failure reported by the Redis client, passed through unmodified.
    #[error(transparent)]
    Redis(#[from] RedisError),

    /// The operation's context was cancelled before the call completed.
    #[error("operation cancelled")]
    Cancelled,

    /// The operation's context deadline elapsed before the call completed.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl StoreError {
    /// Whether the error came from the caller's context rather than the store
    pub fn is_context_error(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}

/// Result type for session store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
