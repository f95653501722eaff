//! Cancellation and deadline scope.
//!
//! A `Context` bounds a lifecycle call: servlet start, transport drain.
//! Cancelling a parent cancels every context derived from it.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().child_with_timeout(timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    /// A child that is cancelled with `self`, or on its own via [`cancel`].
    ///
    /// [`cancel`]: Context::cancel
    pub fn with_cancel(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// A child whose deadline is the earlier of `self`'s and now + `timeout`.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        Self {
            token: self.token.child_token(),
            deadline: Some(match self.deadline {
                Some(parent) => parent.min(deadline),
                None => deadline,
            }),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The reason this context is done, if it is.
    pub fn err(&self) -> Option<Error> {
        if self.token.is_cancelled() {
            Some(Error::Cancelled)
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            Some(Error::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Resolve once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> Error {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.token.cancelled() => Error::Cancelled,
                _ = tokio::time::sleep_until(deadline) => Error::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                Error::Cancelled
            }
        }
    }

    /// Run `fut` unless the context ends first.
    ///
    /// A context that is already done never polls `fut`.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output> {
        if let Some(err) = self.err() {
            return Err(err);
        }
        tokio::select! {
            biased;
            err = self.done() => Err(err),
            out = fut => Ok(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_background_runs_to_completion() {
        let ctx = Context::background();
        assert!(ctx.err().is_none());
        assert_eq!(ctx.run(async { 7 }).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_timeout_expires() {
        let ctx = Context::with_timeout(Duration::from_millis(50));
        let result = ctx
            .run(tokio::time::sleep(Duration::from_secs(10)))
            .await;

        assert!(matches!(result, Err(Error::DeadlineExceeded)));
        assert!(matches!(ctx.err(), Some(Error::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn test_parent_cancel_reaches_child() {
        let parent = Context::background();
        let child = parent.with_cancel();

        parent.cancel();
        assert!(matches!(child.done().await, Error::Cancelled));
        assert!(matches!(child.run(async {}).await, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_child_cancel_leaves_parent() {
        let parent = Context::background();
        let child = parent.with_cancel();

        child.cancel();
        assert!(child.err().is_some());
        assert!(parent.err().is_none());
    }

    #[test]
    fn test_child_keeps_earlier_deadline() {
        let parent = Context::with_timeout(Duration::from_millis(10));
        let child = parent.child_with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());
    }
}
