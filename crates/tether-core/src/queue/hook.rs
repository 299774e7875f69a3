//! MutationHook - キューの 4 つの変更ポイントへの割り込み
//!
//! Every method receives the queue with its mutex already held and must finish
//! by calling the matching original routine on `queue`. Defaults do only that.

use crate::domain::{ExecutionToken, QueueItem};
use crate::error::Result;

use super::HeldQueue;

pub trait MutationHook: Send + Sync {
    fn put(&self, queue: &mut HeldQueue<'_>, item: QueueItem) {
        queue.put(item)
    }

    fn task_done(
        &self,
        queue: &mut HeldQueue<'_>,
        token: ExecutionToken,
        outputs: serde_json::Value,
    ) -> Result<()> {
        queue.task_done(token, outputs)
    }

    fn wipe_queue(&self, queue: &mut HeldQueue<'_>) {
        queue.wipe_queue()
    }

    fn delete_queue_item(
        &self,
        queue: &mut HeldQueue<'_>,
        predicate: &mut dyn FnMut(&QueueItem) -> bool,
    ) -> bool {
        queue.delete_queue_item(predicate)
    }
}

/// Hook used while nothing is installed.
pub(crate) struct Passthrough;

impl MutationHook for Passthrough {}
