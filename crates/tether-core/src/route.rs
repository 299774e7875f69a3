//! TrackerRoute - submitter から tracker を呼ぶためのポート
//!
//! The tracker lives next to the queue in the consumer. A submitter reaches it
//! through a route that forwards each call and returns only when the remote
//! routine has returned (one synchronous round-trip per call).
//!
//! # 実装
//! - **LocalRoute**: 同一プロセス内。ブロッキング呼び出しを `spawn_blocking` に逃がす
//! - プロセス間の実装は外部で `TrackerRoute` を実装する

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::JobNumber;
use crate::error::{Result, TetherError};
use crate::tracker::{Completion, CompletionTracker};

#[async_trait]
pub trait TrackerRoute: Send + Sync {
    async fn begin_tracking(&self, job: JobNumber) -> Result<()>;

    async fn await_completion(&self) -> Result<Completion>;
}

pub struct LocalRoute {
    tracker: Arc<CompletionTracker>,
}

impl LocalRoute {
    pub fn new(tracker: Arc<CompletionTracker>) -> Self {
        Self { tracker }
    }
}

#[async_trait]
impl TrackerRoute for LocalRoute {
    async fn begin_tracking(&self, job: JobNumber) -> Result<()> {
        let tracker = Arc::clone(&self.tracker);
        tokio::task::spawn_blocking(move || tracker.begin_tracking(job))
            .await
            .map_err(|e| TetherError::Route(format!("begin_tracking: {e}")))
    }

    async fn await_completion(&self) -> Result<Completion> {
        let tracker = Arc::clone(&self.tracker);
        tokio::task::spawn_blocking(move || tracker.await_completion())
            .await
            .map_err(|e| TetherError::Route(format!("await_completion: {e}")))?
    }
}

/// begin → submit → await, in that order.
///
/// `submit` must enqueue an item whose number is the same job as `job`.
pub async fn submit_and_wait<R, F, Fut>(route: &R, job: JobNumber, submit: F) -> Result<Completion>
where
    R: TrackerRoute + ?Sized,
    F: FnOnce() -> Fut + Send,
    Fut: Future<Output = Result<()>> + Send,
{
    route.begin_tracking(job).await?;
    submit().await?;
    route.await_completion().await
}
