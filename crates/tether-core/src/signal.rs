//! Signal - 二値シグナル
//!
//! The tracker only needs edge set, blocking wait (optionally bounded) and an
//! explicit clear. A signal does not know which job it belongs to; the tracker
//! decides when to set it.
//!
//! # 実装
//! - **Event**: Mutex<bool> + Condvar（同一プロセス内）
//! - プロセス間で共有するシグナルは外部から `Signal` を実装して差し込む

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

pub trait Signal: Send + Sync {
    /// Set the flag and wake every waiter.
    fn set(&self);

    /// Block until the flag is set or `timeout` elapses. Returns whether it is set.
    fn wait(&self, timeout: Option<Duration>) -> bool;

    fn clear(&self);

    fn is_set(&self) -> bool;
}

#[derive(Debug, Default)]
pub struct Event {
    flag: Mutex<bool>,
    changed: Condvar,
}

impl Event {
    pub fn new() -> Self {
        Self::default()
    }

    fn flag(&self) -> MutexGuard<'_, bool> {
        self.flag.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Signal for Event {
    fn set(&self) {
        let mut flag = self.flag();
        *flag = true;
        self.changed.notify_all();
    }

    fn wait(&self, timeout: Option<Duration>) -> bool {
        let flag = self.flag();
        match timeout {
            None => {
                let flag = self
                    .changed
                    .wait_while(flag, |set| !*set)
                    .unwrap_or_else(PoisonError::into_inner);
                *flag
            }
            Some(timeout) => {
                let start = Instant::now();
                let (flag, _) = self
                    .changed
                    .wait_timeout_while(flag, timeout, |set| !*set)
                    .unwrap_or_else(PoisonError::into_inner);
                if !*flag {
                    tracing::trace!(
                        waited_ms = start.elapsed().as_millis() as u64,
                        "signal wait timed out"
                    );
                }
                *flag
            }
        }
    }

    fn clear(&self) {
        *self.flag() = false;
    }

    fn is_set(&self) -> bool {
        *self.flag()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn wait_returns_immediately_when_already_set() {
        let event = Event::new();
        event.set();
        let start = Instant::now();
        assert!(event.wait(Some(Duration::from_secs(5))));
        assert!(event.wait(None));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn wait_times_out_when_never_set() {
        let event = Event::new();
        let start = Instant::now();
        assert!(!event.wait(Some(Duration::from_millis(50))));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn set_wakes_blocked_waiters() {
        let event = Arc::new(Event::new());
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let event = Arc::clone(&event);
                std::thread::spawn(move || event.wait(None))
            })
            .collect();

        std::thread::sleep(Duration::from_millis(50));
        event.set();
        for waiter in waiters {
            assert!(waiter.join().unwrap());
        }
    }

    #[test]
    fn clear_resets_the_flag() {
        let event = Event::new();
        event.set();
        event.clear();
        assert!(!event.is_set());
        assert!(!event.wait(Some(Duration::from_millis(10))));
    }
}
