// Cancellation and deadline context for store operations

use crate::error::{Result, StoreError};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation scope passed to every store operation.
///
/// A context carries a [`CancellationToken`] and an optional deadline. Running a
/// future through [`Context::run`] races it against both, so a cancelled or
/// expired context aborts the in-flight remote call promptly.
///
/// Contexts are cheap to clone; clones share the same token and deadline.
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancellation: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled and has no deadline
    pub fn background() -> Self {
        Self::default()
    }

    /// A context that expires `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A context that expires at `deadline`
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancellation: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    /// A context driven by an externally owned cancellation token
    pub fn with_cancellation(cancellation: CancellationToken) -> Self {
        Self {
            cancellation,
            deadline: None,
        }
    }

    /// Derive a child context.
    ///
    /// The child is cancelled when the parent is, but cancelling the child leaves
    /// the parent untouched. The effective deadline is the earlier of the parent's
    /// and `timeout` (if given).
    pub fn child(&self, timeout: Option<Duration>) -> Self {
        let requested = timeout.map(|t| Instant::now() + t);
        let deadline = match (self.deadline, requested) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        Self {
            cancellation: self.cancellation.child_token(),
            deadline,
        }
    }

    /// Cancel this context and every child derived from it
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the context is already cancelled or past its deadline
    pub fn is_done(&self) -> bool {
        self.cancellation.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Returns the error a finished context reports, or `None` while it is live.
    pub fn err(&self) -> Option<StoreError> {
        if self.cancellation.is_cancelled() {
            Some(StoreError::Cancelled)
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            Some(StoreError::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Drive `fut` to completion unless the context finishes first.
    ///
    /// Redis errors are wrapped as [`StoreError::Redis`]; cancellation wins over
    /// the deadline when both have fired.
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }

        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(StoreError::Cancelled),
            _ = sleep_until(self.deadline) => Err(StoreError::DeadlineExceeded),
            res = fut => res.map_err(StoreError::from),
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
