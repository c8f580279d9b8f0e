//! Per-request execution context.
//!
//! `RequestContext` carries the request id, a cancellation token and a
//! deadline. Conversation operations run their store and responder work
//! through [`RequestContext::run`], so a cancelled or overdue request drops
//! its in-flight future (and with it any open transaction).

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Why a guarded future did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Interrupted {
    #[error("request cancelled")]
    Cancelled,

    #[error("request deadline exceeded")]
    DeadlineExceeded,
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Unique identifier for this request, used in logs.
    pub request_id: Uuid,
    pub cancellation: CancellationToken,
    pub deadline: Instant,
}

impl RequestContext {
    /// Create a context that expires `timeout` from now.
    pub fn new(timeout: Duration) -> Self {
        Self {
            request_id: Uuid::now_v7(),
            cancellation: CancellationToken::new(),
            deadline: Instant::now() + timeout,
        }
    }

    /// Create a context whose token is a child of `parent`: cancelling the
    /// parent cancels this request, never the other way round.
    pub fn child_of(parent: &CancellationToken, timeout: Duration) -> Self {
        Self {
            cancellation: parent.child_token(),
            ..Self::new(timeout)
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Drive `fut` to completion unless the request is cancelled or its
    /// deadline passes first, in which case `fut` is dropped.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, Interrupted>
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(Interrupted::Cancelled),
            _ = tokio::time::sleep_until(self.deadline) => Err(Interrupted::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_completes_in_time() {
        let ctx = RequestContext::new(Duration::from_secs(5));
        let out = ctx.run(async { 42 }).await;
        assert_eq!(out, Ok(42));
    }

    #[tokio::test]
    async fn test_run_observes_cancellation() {
        let ctx = RequestContext::new(Duration::from_secs(5));
        ctx.cancel();
        let out = ctx.run(std::future::pending::<()>()).await;
        assert_eq!(out, Err(Interrupted::Cancelled));
        assert!(ctx.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_observes_deadline() {
        let ctx = RequestContext::new(Duration::from_millis(50));
        let out = ctx
            .run(tokio::time::sleep(Duration::from_secs(60)))
            .await;
        assert_eq!(out, Err(Interrupted::DeadlineExceeded));
        assert!(Instant::now() >= ctx.deadline);
    }

    #[tokio::test]
    async fn test_child_follows_parent_cancellation() {
        let parent = CancellationToken::new();
        let first = RequestContext::child_of(&parent, Duration::from_secs(5));
        let second = RequestContext::child_of(&parent, Duration::from_secs(5));

        first.cancel();
        assert!(!parent.is_cancelled());
        assert!(!second.is_cancelled());

        parent.cancel();
        let out = second.run(std::future::pending::<()>()).await;
        assert_eq!(out, Err(Interrupted::Cancelled));
    }
}
