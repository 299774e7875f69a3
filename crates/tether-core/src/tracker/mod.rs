//! CompletionTracker - 1 件のジョブの完了待ち
//!
//! # フロー
//! 1. submitter が `begin_tracking(job)` を呼ぶ（前回の ID を退避、シグナルをクリア）
//! 2. submitter がジョブを普通にキューへ投入する
//! 3. submitter が `await_completion()` でブロックする
//!
//! Consumer 側では [`TrackingHook`] がキューの変更を見て 2 つのシグナルを立てる。
//! - `enqueued`: 追跡中のジョブが put された
//! - `finished`: 追跡中のジョブが task_done / wipe / delete で消えた
//!
//! 追跡できるのは同時に 1 件だけ。`begin_tracking` のたびに epoch が進み、
//! 古いセッションの waiter は新しいジョブを待たずに `Superseded` で抜ける。

mod instrument;
mod presence;

pub use instrument::{TrackingHook, instrument};

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};
use std::time::{Duration, Instant};

use crate::config::TetherConfig;
use crate::domain::{JobNumber, QueueItem};
use crate::error::{Result, TetherError};
use crate::queue::ExecutionQueue;
use crate::signal::{Event, Signal};

/// How `await_completion` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The enqueue edge never arrived; the tracked id was rolled back.
    NotEnqueued,
    /// Enqueued, but already gone by the time the presence check ran.
    AlreadyFinished,
    /// The finished edge arrived.
    Finished,
    /// A newer `begin_tracking` replaced this session while it was waiting.
    Superseded,
}

/// How often a blocked waiter re-checks whether its session is still current.
const SESSION_CHECK_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, Default)]
struct Session {
    tracked: Option<JobNumber>,
    previous: Option<JobNumber>,
    epoch: u64,
}

impl Session {
    fn is_tracked(&self, number: JobNumber) -> bool {
        self.tracked.is_some_and(|tracked| tracked.same_job(number))
    }
}

pub struct CompletionTracker {
    // Held while a hook checks identity and raises a signal, and while
    // begin_tracking swaps ids and clears signals, so the two never interleave.
    session: Mutex<Session>,
    enqueued: Arc<dyn Signal>,
    finished: Arc<dyn Signal>,
    queue: OnceLock<Weak<ExecutionQueue>>,
    enqueue_timeout: Duration,
}

impl CompletionTracker {
    pub fn new(config: &TetherConfig) -> Self {
        Self::with_signals(Arc::new(Event::new()), Arc::new(Event::new()), config)
    }

    /// Build a tracker around externally provided signals (e.g. process-shared ones).
    pub fn with_signals(
        enqueued: Arc<dyn Signal>,
        finished: Arc<dyn Signal>,
        config: &TetherConfig,
    ) -> Self {
        Self {
            session: Mutex::new(Session::default()),
            enqueued,
            finished,
            queue: OnceLock::new(),
            enqueue_timeout: config.enqueue_timeout,
        }
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn attach(&self, queue: &Arc<ExecutionQueue>) -> Result<()> {
        self.queue
            .set(Arc::downgrade(queue))
            .map_err(|_| TetherError::AlreadyInstrumented)
    }

    pub fn is_attached(&self) -> bool {
        self.queue.get().is_some()
    }

    /// Start a new session for `job`. Both signals are cleared.
    pub fn begin_tracking(&self, job: impl Into<JobNumber>) {
        let job = job.into();
        let mut session = self.session();
        session.previous = session.tracked;
        session.tracked = Some(job);
        session.epoch += 1;
        self.enqueued.clear();
        self.finished.clear();
        tracing::debug!(
            job = %job,
            previous = ?session.previous.map(JobNumber::get),
            "tracking started"
        );
    }

    /// Track whatever number the attached queue will hand out next.
    pub fn begin_tracking_next(&self) -> Result<JobNumber> {
        let queue = self.attached_queue()?.ok_or(TetherError::NotAttached)?;
        let next = queue.next_number();
        self.begin_tracking(next);
        Ok(next)
    }

    /// Block until the tracked job is no longer outstanding.
    ///
    /// 1. enqueue を `enqueue_timeout` まで待つ。来なければ ID を戻して即 return
    /// 2. すでにキューから消えていれば即 return（finished のエッジを取り逃していても固まらない）
    /// 3. それ以外は finished を無期限に待つ
    ///
    /// A signal only counts while the session that started this wait is still
    /// current; after a newer `begin_tracking` this returns `Superseded` and
    /// leaves the new session's ids alone.
    pub fn await_completion(&self) -> Result<Completion> {
        let (epoch, job) = {
            let session = self.session();
            (session.epoch, session.tracked)
        };

        let deadline = Instant::now() + self.enqueue_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let fired = self.enqueued.wait(Some(remaining.min(SESSION_CHECK_INTERVAL)));
            let mut session = self.session();
            if session.epoch != epoch {
                tracing::debug!(
                    job = ?job.map(JobNumber::get),
                    "session superseded before enqueue"
                );
                return Ok(Completion::Superseded);
            }
            if fired {
                break;
            }
            if Instant::now() >= deadline {
                session.tracked = session.previous;
                tracing::info!(
                    abandoned = ?job.map(JobNumber::get),
                    restored = ?session.tracked.map(JobNumber::get),
                    timeout_ms = self.enqueue_timeout.as_millis() as u64,
                    "tracked job was never enqueued; rolled back"
                );
                return Ok(Completion::NotEnqueued);
            }
        }

        if !self.is_present(job)? {
            tracing::debug!("tracked job already left the queue");
            return Ok(Completion::AlreadyFinished);
        }

        loop {
            let fired = self.finished.wait(Some(SESSION_CHECK_INTERVAL));
            if self.session().epoch != epoch {
                tracing::debug!(
                    job = ?job.map(JobNumber::get),
                    "session superseded while running"
                );
                return Ok(Completion::Superseded);
            }
            if fired {
                return Ok(Completion::Finished);
            }
        }
    }

    pub fn tracked(&self) -> Option<JobNumber> {
        self.session().tracked
    }

    pub fn previous(&self) -> Option<JobNumber> {
        self.session().previous
    }

    pub fn enqueue_timeout(&self) -> Duration {
        self.enqueue_timeout
    }

    pub(crate) fn observe_enqueued(&self, number: JobNumber) {
        let session = self.session();
        if session.is_tracked(number) {
            self.enqueued.set();
            tracing::debug!(job = %number, "tracked job enqueued");
        }
    }

    pub(crate) fn observe_finished(&self, number: JobNumber) {
        let session = self.session();
        if session.is_tracked(number) {
            self.finished.set();
            tracing::debug!(job = %number, "tracked job finished");
        }
    }

    /// Release the waiter unless the tracked job is among `running`; a running
    /// job signals through its own task_done later.
    pub(crate) fn observe_wipe<'i>(&self, mut running: impl Iterator<Item = &'i QueueItem>) {
        let session = self.session();
        if !running.any(|item| session.is_tracked(item.number)) {
            self.finished.set();
            tracing::debug!(
                job = ?session.tracked.map(JobNumber::get),
                "queue wiped; waiter released"
            );
        }
    }

    fn attached_queue(&self) -> Result<Option<Arc<ExecutionQueue>>> {
        let weak = self.queue.get().ok_or(TetherError::NotAttached)?;
        Ok(weak.upgrade())
    }
}
