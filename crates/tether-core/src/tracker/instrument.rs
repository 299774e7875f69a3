//! TrackingHook - キューの 4 つの変更ポイントを観測する
//!
//! | 変更ポイント | 観測 |
//! |---|---|
//! | put | 追跡中の ID なら `enqueued` |
//! | task_done | running 側のアイテムが追跡中の ID なら `finished` |
//! | wipe_queue | 追跡中の ID が running にいなければ `finished` |
//! | delete_queue_item | predicate が受理したアイテムが追跡中の ID なら `finished` |
//!
//! 観測はすべて元の処理より前に行い、引数・戻り値・エラーには手を加えない。

use std::sync::Arc;

use super::CompletionTracker;
use crate::domain::{ExecutionToken, QueueItem};
use crate::error::{Result, TetherError};
use crate::queue::{ExecutionQueue, HeldQueue, MutationHook};

pub struct TrackingHook {
    tracker: Arc<CompletionTracker>,
}

impl TrackingHook {
    pub fn new(tracker: Arc<CompletionTracker>) -> Self {
        Self { tracker }
    }
}

impl MutationHook for TrackingHook {
    fn put(&self, queue: &mut HeldQueue<'_>, item: QueueItem) {
        self.tracker.observe_enqueued(item.number);
        queue.put(item)
    }

    fn task_done(
        &self,
        queue: &mut HeldQueue<'_>,
        token: ExecutionToken,
        outputs: serde_json::Value,
    ) -> Result<()> {
        // unknown token: no observation, the original call reports the error
        if let Some(item) = queue.running_item(token) {
            self.tracker.observe_finished(item.number);
        }
        queue.task_done(token, outputs)
    }

    fn wipe_queue(&self, queue: &mut HeldQueue<'_>) {
        self.tracker.observe_wipe(queue.running());
        queue.wipe_queue()
    }

    fn delete_queue_item(
        &self,
        queue: &mut HeldQueue<'_>,
        predicate: &mut dyn FnMut(&QueueItem) -> bool,
    ) -> bool {
        let tracker = &self.tracker;
        let mut observed = |item: &QueueItem| {
            let accepted = predicate(item);
            if accepted {
                tracker.observe_finished(item.number);
            }
            accepted
        };
        queue.delete_queue_item(&mut observed)
    }
}

/// Wire `tracker` into `queue`. Call once, when the consumer builds its queue.
///
/// The tracker keeps only a weak reference to the queue.
pub fn instrument(queue: &Arc<ExecutionQueue>, tracker: &Arc<CompletionTracker>) -> Result<()> {
    if queue.is_instrumented() {
        return Err(TetherError::AlreadyInstrumented);
    }
    tracker.attach(queue)?;
    queue.install_hook(Arc::new(TrackingHook::new(Arc::clone(tracker))))?;
    tracing::info!("queue instrumented for completion tracking");
    Ok(())
}
