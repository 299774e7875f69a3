//! Queue state and the original (unlocked) mutation routines.
//!
//! ここにあるメソッドはロックを取らない。呼び出し側がすでに `ExecutionQueue` の
//! mutex を握っている前提で、`HeldQueue` 経由でのみ外に出す。

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};

use chrono::Utc;

use crate::domain::{ExecutionToken, HistoryEntry, JobNumber, QueueItem};
use crate::error::{Result, TetherError};

/// Pending entry for the priority queue.
///
/// Ordered by `(number, seq)` ascending, reversed so `BinaryHeap` pops the
/// smallest number first. Negative (front-of-queue) numbers therefore run first.
#[derive(Debug, Clone)]
struct Pending {
    seq: u64,
    item: QueueItem,
}

impl Pending {
    fn key(&self) -> (i64, u64) {
        (self.item.number.get(), self.seq)
    }
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

pub(crate) struct QueueState {
    pending: BinaryHeap<Pending>,
    running: HashMap<ExecutionToken, QueueItem>,
    history: VecDeque<HistoryEntry>,
    max_history: usize,
    next_seq: u64,
    next_token: u64,
    next_number: i64,
}

impl QueueState {
    pub(crate) fn new(max_history: usize) -> Self {
        Self {
            pending: BinaryHeap::new(),
            running: HashMap::new(),
            history: VecDeque::new(),
            max_history,
            next_seq: 0,
            next_token: 1,
            next_number: 1,
        }
    }

    pub(crate) fn put(&mut self, item: QueueItem) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(Pending { seq, item });
    }

    /// Pop the next pending item and move it into the running map.
    pub(crate) fn take_next(&mut self) -> Option<(QueueItem, ExecutionToken)> {
        let Pending { item, .. } = self.pending.pop()?;
        let token = ExecutionToken::new(self.next_token);
        self.next_token += 1;
        self.running.insert(token, item.clone());
        Some((item, token))
    }

    pub(crate) fn task_done(
        &mut self,
        token: ExecutionToken,
        outputs: serde_json::Value,
    ) -> Result<()> {
        let item = self
            .running
            .remove(&token)
            .ok_or(TetherError::UnknownToken(token))?;

        self.history.push_back(HistoryEntry {
            item,
            outputs,
            completed_at: Utc::now(),
        });
        while self.history.len() > self.max_history {
            self.history.pop_front();
        }
        Ok(())
    }

    /// Drop every pending item. Running items are left alone.
    pub(crate) fn wipe(&mut self) {
        self.pending.clear();
    }

    /// Remove the first pending item `predicate` accepts.
    ///
    /// The predicate is evaluated before the heap is touched, so a panicking
    /// predicate leaves the pending items intact.
    pub(crate) fn delete_where(&mut self, predicate: &mut dyn FnMut(&QueueItem) -> bool) -> bool {
        let Some(position) = self.pending.iter().position(|entry| predicate(&entry.item)) else {
            return false;
        };
        // iter() と into_vec() は同じ内部順序
        let mut entries = std::mem::take(&mut self.pending).into_vec();
        entries.swap_remove(position);
        self.pending = BinaryHeap::from(entries);
        true
    }

    pub(crate) fn pending_items(&self) -> impl Iterator<Item = &QueueItem> {
        self.pending.iter().map(|entry| &entry.item)
    }

    pub(crate) fn running_items(&self) -> impl Iterator<Item = (&ExecutionToken, &QueueItem)> {
        self.running.iter()
    }

    pub(crate) fn running_item(&self, token: ExecutionToken) -> Option<&QueueItem> {
        self.running.get(&token)
    }

    /// Pending items in the order consumers will take them.
    pub(crate) fn pending_sorted(&self) -> Vec<QueueItem> {
        let mut entries: Vec<&Pending> = self.pending.iter().collect();
        entries.sort_by_key(|entry| entry.key());
        entries.into_iter().map(|entry| entry.item.clone()).collect()
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn running_len(&self) -> usize {
        self.running.len()
    }

    pub(crate) fn history(&self) -> &VecDeque<HistoryEntry> {
        &self.history
    }

    pub(crate) fn peek_number(&self) -> JobNumber {
        JobNumber::new(self.next_number)
    }

    pub(crate) fn allocate_number(&mut self) -> JobNumber {
        let number = JobNumber::new(self.next_number);
        self.next_number += 1;
        number
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(n: i64) -> QueueItem {
        QueueItem::new(n, json!({ "n": n }))
    }

    #[test]
    fn negative_numbers_are_taken_first() {
        let mut state = QueueState::new(10);
        state.put(item(2));
        state.put(item(1));
        state.put(item(-5));

        let order: Vec<i64> = std::iter::from_fn(|| state.take_next())
            .map(|(item, _)| item.number.get())
            .collect();
        assert_eq!(order, vec![-5, 1, 2]);
    }

    #[test]
    fn equal_numbers_keep_insertion_order() {
        let mut state = QueueState::new(10);
        let first = item(3);
        let second = item(3);
        state.put(first.clone());
        state.put(second.clone());

        assert_eq!(state.take_next().unwrap().0.prompt_id, first.prompt_id);
        assert_eq!(state.take_next().unwrap().0.prompt_id, second.prompt_id);
    }

    #[test]
    fn task_done_moves_running_into_history() {
        let mut state = QueueState::new(10);
        state.put(item(1));
        let (_, token) = state.take_next().unwrap();
        assert_eq!(state.running_len(), 1);

        state.task_done(token, json!({ "images": 1 })).unwrap();
        assert_eq!(state.running_len(), 0);
        assert_eq!(state.history().len(), 1);
        assert_eq!(state.history()[0].outputs, json!({ "images": 1 }));
    }

    #[test]
    fn task_done_with_unknown_token_fails_without_side_effects() {
        let mut state = QueueState::new(10);
        let err = state.task_done(ExecutionToken::new(42), json!(null)).unwrap_err();
        assert!(matches!(err, TetherError::UnknownToken(t) if t.get() == 42));
        assert!(state.history().is_empty());
    }

    #[test]
    fn history_is_bounded() {
        let mut state = QueueState::new(2);
        for n in 1..=3 {
            state.put(item(n));
            let (_, token) = state.take_next().unwrap();
            state.task_done(token, json!(null)).unwrap();
        }
        let kept: Vec<i64> = state.history().iter().map(|e| e.item.number.get()).collect();
        assert_eq!(kept, vec![2, 3]);
    }

    #[test]
    fn delete_where_removes_only_the_first_match() {
        let mut state = QueueState::new(10);
        state.put(item(4));
        state.put(item(4));
        state.put(item(5));

        assert!(state.delete_where(&mut |x| x.number.get() == 4));
        assert_eq!(state.pending_len(), 2);
        assert!(!state.delete_where(&mut |x| x.number.get() == 9));

        let left: Vec<i64> = state.pending_sorted().iter().map(|x| x.number.get()).collect();
        assert_eq!(left, vec![4, 5]);
    }

    #[test]
    fn wipe_keeps_running_items() {
        let mut state = QueueState::new(10);
        state.put(item(1));
        state.put(item(2));
        state.take_next().unwrap();

        state.wipe();
        assert_eq!(state.pending_len(), 0);
        assert_eq!(state.running_len(), 1);
    }
}
