//! HeldQueue - ロック保持中のキュー操作
//!
//! Hook code runs while the queue's entry point already holds the real mutex.
//! Calling back into the public methods would lock again and deadlock, so the
//! hook receives this handle instead: it exposes the original mutation routines
//! without any locking of their own.
//!
//! # 保証
//! - `HeldQueue` は `ExecutionQueue` の入口からしか作れない
//! - 本物の `MutexGuard` は入口が所有し続けるので、他スレッドは割り込めない
//! - 寿命は借用で縛られるため、入口のスコープを越えて残らない
//! - 元の処理が `Err` を返せばそのまま呼び出し元へ、panic なら guard ごと unwind する

use std::sync::Condvar;

use super::state::QueueState;
use crate::domain::{ExecutionToken, QueueItem};
use crate::error::Result;

pub struct HeldQueue<'a> {
    state: &'a mut QueueState,
    not_empty: &'a Condvar,
}

impl<'a> HeldQueue<'a> {
    pub(crate) fn new(state: &'a mut QueueState, not_empty: &'a Condvar) -> Self {
        Self { state, not_empty }
    }

    /// Original enqueue: insert and wake one waiting consumer.
    pub fn put(&mut self, item: QueueItem) {
        self.state.put(item);
        self.not_empty.notify_one();
    }

    /// Original mark-done: finalize the running item behind `token`.
    pub fn task_done(&mut self, token: ExecutionToken, outputs: serde_json::Value) -> Result<()> {
        self.state.task_done(token, outputs)
    }

    /// Original clear-all.
    pub fn wipe_queue(&mut self) {
        self.state.wipe();
    }

    /// Original remove-by-predicate.
    pub fn delete_queue_item(&mut self, predicate: &mut dyn FnMut(&QueueItem) -> bool) -> bool {
        self.state.delete_where(predicate)
    }

    pub fn running_item(&self, token: ExecutionToken) -> Option<&QueueItem> {
        self.state.running_item(token)
    }

    pub fn running(&self) -> impl Iterator<Item = &QueueItem> {
        self.state.running_items().map(|(_, item)| item)
    }

    pub fn pending(&self) -> impl Iterator<Item = &QueueItem> {
        self.state.pending_items()
    }
}
