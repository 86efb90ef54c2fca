//! Cancellable, optionally deadline-bound request context

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CancelError {
    #[error("context canceled")]
    Cancelled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Cooperative cancellation for one request
///
/// Combines a [`CancellationToken`] (fired when the client goes away or the request
/// finishes) with an optional deadline. Nothing is interrupted preemptively; suspension
/// points observe the context through [`CancelContext::run`] or [`CancelContext::cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancelContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CancelContext {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Derive a child context whose deadline is at most `timeout` from now
    ///
    /// The child's token is cancelled with its parent; cancelling the child leaves the parent
    /// untouched. An earlier parent deadline is kept.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Derive a child context that shares this one's deadline
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Guard that cancels this context when dropped
    pub fn drop_guard(&self) -> DropGuard {
        self.token.clone().drop_guard()
    }

    /// Why the context is done, if it is
    pub fn err(&self) -> Option<CancelError> {
        if self.token.is_cancelled() {
            Some(CancelError::Cancelled)
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            Some(CancelError::DeadlineExceeded)
        } else {
            None
        }
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Resolves once the token is cancelled or the deadline passes
    pub async fn cancelled(&self) -> CancelError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.token.cancelled() => CancelError::Cancelled,
                _ = tokio::time::sleep_until(deadline) => CancelError::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                CancelError::Cancelled
            }
        }
    }

    /// Drive `fut` to completion unless the context finishes first
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, CancelError>
    where
        F: Future,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }
        tokio::select! {
            biased;
            err = self.cancelled() => Err(err),
            output = fut => Ok(output),
        }
    }
}
