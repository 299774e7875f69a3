//! Shared execution queue.
//!
//! One mutex guards the pending heap, the running map and the history. Every
//! mutation point locks it once, then hands a [`HeldQueue`] to the installed
//! [`MutationHook`], which observes and delegates to the original routine.

mod held;
mod hook;
mod state;

pub use held::HeldQueue;
pub use hook::MutationHook;

use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::{Duration, Instant};

use crate::config::TetherConfig;
use crate::domain::{ExecutionToken, HistoryEntry, JobNumber, QueueItem};
use crate::error::{Result, TetherError};
use crate::observability::QueueCounts;
use hook::Passthrough;
use state::QueueState;

pub struct ExecutionQueue {
    state: Mutex<QueueState>,
    not_empty: Condvar,
    hook: OnceLock<Arc<dyn MutationHook>>,
}

impl ExecutionQueue {
    pub fn new(config: &TetherConfig) -> Self {
        Self {
            state: Mutex::new(QueueState::new(config.max_history)),
            not_empty: Condvar::new(),
            hook: OnceLock::new(),
        }
    }

    /// Install the mutation hook. Only the first install takes effect.
    pub fn install_hook(&self, hook: Arc<dyn MutationHook>) -> Result<()> {
        self.hook
            .set(hook)
            .map_err(|_| TetherError::AlreadyInstrumented)?;
        tracing::debug!("mutation hook installed");
        Ok(())
    }

    pub fn is_instrumented(&self) -> bool {
        self.hook.get().is_some()
    }

    // A panic inside a hook or predicate poisons the mutex; the state itself is
    // still consistent, so later callers keep using the real lock.
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn hook(&self) -> &dyn MutationHook {
        match self.hook.get() {
            Some(hook) => hook.as_ref(),
            None => &Passthrough,
        }
    }

    pub fn put(&self, item: QueueItem) {
        let mut state = self.lock();
        self.hook().put(&mut HeldQueue::new(&mut state, &self.not_empty), item);
    }

    /// Allocate the next job number and enqueue `payload` under it.
    ///
    /// `front` negates the number so the item runs before normal submissions.
    pub fn submit(&self, payload: serde_json::Value, front: bool) -> JobNumber {
        let mut state = self.lock();
        let number = state.allocate_number();
        let number = if front { number.front() } else { number };
        let item = QueueItem::new(number, payload);
        self.hook().put(&mut HeldQueue::new(&mut state, &self.not_empty), item);
        number
    }

    /// The number the next `submit` will receive.
    pub fn next_number(&self) -> JobNumber {
        self.lock().peek_number()
    }

    /// Take the next pending item, blocking up to `timeout` (forever on `None`).
    pub fn get(&self, timeout: Option<Duration>) -> Option<(QueueItem, ExecutionToken)> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.lock();
        loop {
            if let Some(next) = state.take_next() {
                return Some(next);
            }
            match deadline {
                None => {
                    state = self
                        .not_empty
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    let (guard, _) = self
                        .not_empty
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner);
                    state = guard;
                }
            }
        }
    }

    pub fn task_done(&self, token: ExecutionToken, outputs: serde_json::Value) -> Result<()> {
        let mut state = self.lock();
        self.hook()
            .task_done(&mut HeldQueue::new(&mut state, &self.not_empty), token, outputs)
    }

    pub fn wipe_queue(&self) {
        let mut state = self.lock();
        self.hook()
            .wipe_queue(&mut HeldQueue::new(&mut state, &self.not_empty));
    }

    pub fn delete_queue_item<F>(&self, mut predicate: F) -> bool
    where
        F: FnMut(&QueueItem) -> bool,
    {
        let mut state = self.lock();
        self.hook()
            .delete_queue_item(&mut HeldQueue::new(&mut state, &self.not_empty), &mut predicate)
    }

    /// Read-only access under the real lock.
    pub fn inspect<R>(&self, f: impl FnOnce(&HeldQueue<'_>) -> R) -> R {
        let mut state = self.lock();
        f(&HeldQueue::new(&mut state, &self.not_empty))
    }

    /// Is any pending or running item the same job as `number`?
    pub fn contains(&self, number: JobNumber) -> bool {
        self.inspect(|queue| {
            queue.running().any(|item| item.number.same_job(number))
                || queue.pending().any(|item| item.number.same_job(number))
        })
    }

    /// `(running, pending)`; pending in execution order.
    pub fn current_queue(&self) -> (Vec<QueueItem>, Vec<QueueItem>) {
        let state = self.lock();
        let running = state.running_items().map(|(_, item)| item.clone()).collect();
        (running, state.pending_sorted())
    }

    pub fn tasks_remaining(&self) -> usize {
        let state = self.lock();
        state.pending_len() + state.running_len()
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.lock().history().iter().cloned().collect()
    }

    pub fn counts(&self) -> QueueCounts {
        let state = self.lock();
        QueueCounts {
            pending: state.pending_len(),
            running: state.running_len(),
            finished: state.history().len(),
        }
    }
}
