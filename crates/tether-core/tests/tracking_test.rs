use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::json;
use tether_core::{
    Completion, CompletionTracker, ExecutionQueue, JobNumber, QueueItem, TetherConfig, instrument,
};

fn consumer(config: &TetherConfig) -> (Arc<ExecutionQueue>, Arc<CompletionTracker>) {
    let queue = Arc::new(ExecutionQueue::new(config));
    let tracker = Arc::new(CompletionTracker::new(config));
    instrument(&queue, &tracker).unwrap();
    (queue, tracker)
}

/// Workers that take items and finish them after `work`, until `stop` is set.
fn spawn_workers(
    queue: &Arc<ExecutionQueue>,
    n: usize,
    work: Duration,
    stop: &Arc<AtomicBool>,
) -> Vec<thread::JoinHandle<()>> {
    (0..n)
        .map(|_| {
            let queue = Arc::clone(queue);
            let stop = Arc::clone(stop);
            thread::spawn(move || {
                while !stop.load(Ordering::SeqCst) {
                    if let Some((item, token)) = queue.get(Some(Duration::from_millis(20))) {
                        thread::sleep(work);
                        queue
                            .task_done(token, json!({ "number": item.number }))
                            .unwrap();
                    }
                }
            })
        })
        .collect()
}

#[test]
fn tracked_job_unblocks_only_on_its_own_completion() {
    let config = TetherConfig::default();
    let (queue, tracker) = consumer(&config);
    let stop = Arc::new(AtomicBool::new(false));

    // noise: unrelated jobs keep flowing through the queue
    let noise = thread::spawn({
        let queue = Arc::clone(&queue);
        let stop = Arc::clone(&stop);
        move || {
            let mut i = 0;
            while !stop.load(Ordering::SeqCst) {
                let number = if i % 2 == 0 { 3 } else { -8 };
                queue.put(QueueItem::new(number, json!(null)));
                i += 1;
                thread::sleep(Duration::from_millis(5));
            }
        }
    });
    let workers = spawn_workers(&queue, 2, Duration::from_millis(10), &stop);

    tracker.begin_tracking(5);
    queue.put(QueueItem::new(-5, json!({ "tracked": true })));
    let completion = tracker.await_completion().unwrap();
    assert!(matches!(completion, Completion::Finished | Completion::AlreadyFinished));

    // the tracked job is really gone: it reached history
    assert!(!queue.contains(JobNumber::new(5)));
    assert!(queue.history().iter().any(|e| e.item.number.same_job(JobNumber::new(5))));

    stop.store(true, Ordering::SeqCst);
    noise.join().unwrap();
    for worker in workers {
        worker.join().unwrap();
    }
}

#[test]
fn lost_submission_returns_within_the_enqueue_timeout() {
    let config = TetherConfig::default().with_enqueue_timeout(Duration::from_millis(100));
    let (queue, tracker) = consumer(&config);
    tracker.begin_tracking(4);
    queue.put(QueueItem::new(4, json!(null)));

    // 9 is never submitted; the earlier enqueue of 4 must not count
    tracker.begin_tracking(9);
    let start = Instant::now();
    assert_eq!(tracker.await_completion().unwrap(), Completion::NotEnqueued);
    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(tracker.tracked(), Some(JobNumber::new(4)));
}

#[test]
fn wipe_releases_a_blocked_waiter() {
    let config = TetherConfig::default();
    let (queue, tracker) = consumer(&config);
    tracker.begin_tracking(12);
    queue.put(QueueItem::new(12, json!(null)));

    let waiter = thread::spawn({
        let tracker = Arc::clone(&tracker);
        move || tracker.await_completion()
    });
    thread::sleep(Duration::from_millis(50));
    queue.wipe_queue();

    let completion = waiter.join().unwrap().unwrap();
    assert!(matches!(completion, Completion::Finished | Completion::AlreadyFinished));
    assert_eq!(queue.tasks_remaining(), 0);
}

#[test]
fn delete_releases_a_blocked_waiter() {
    let config = TetherConfig::default();
    let (queue, tracker) = consumer(&config);
    tracker.begin_tracking(21);
    queue.put(QueueItem::new(20, json!(null)));
    queue.put(QueueItem::new(-21, json!(null)));

    let waiter = thread::spawn({
        let tracker = Arc::clone(&tracker);
        move || tracker.await_completion()
    });
    thread::sleep(Duration::from_millis(50));
    assert!(queue.delete_queue_item(|item| item.number.same_job(JobNumber::new(21))));

    let completion = waiter.join().unwrap().unwrap();
    assert!(matches!(completion, Completion::Finished | Completion::AlreadyFinished));
    assert_eq!(queue.tasks_remaining(), 1);
}

#[test]
fn sequential_sessions_each_wait_for_their_own_job() {
    let config = TetherConfig::default();
    let (queue, tracker) = consumer(&config);
    let stop = Arc::new(AtomicBool::new(false));
    let workers = spawn_workers(&queue, 1, Duration::from_millis(30), &stop);

    for _ in 0..3 {
        let job = tracker.begin_tracking_next().unwrap();
        let submitted = queue.submit(json!(null), false);
        assert_eq!(submitted, job);
        tracker.await_completion().unwrap();
        assert!(!queue.contains(job));
    }

    stop.store(true, Ordering::SeqCst);
    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(queue.history().len(), 3);
}
