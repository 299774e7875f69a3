use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use rand::Rng;
use tether_core::config::parsed_var;
use tether_core::{
    CompletionTracker, ExecutionQueue, LocalRoute, TetherConfig, TetherError, TrackerRoute,
    instrument, submit_and_wait,
};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

/// Join every worker; a panicked worker is logged. Returns how many panicked.
fn join_workers(handles: Vec<JoinHandle<()>>) -> usize {
    let mut panicked = 0;
    for (id, handle) in handles.into_iter().enumerate() {
        if let Err(e) = handle.join() {
            panicked += 1;
            tracing::error!(worker = id, "worker panicked: {e:?}");
        }
    }
    panicked
}

/// consumer 側のワーカー：取り出す → 適当に時間を使う → task_done
fn spawn_worker(id: usize, queue: Arc<ExecutionQueue>, stop: Arc<AtomicBool>) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut rng = rand::thread_rng();
        while !stop.load(Ordering::Relaxed) {
            let Some((item, token)) = queue.get(Some(Duration::from_millis(100))) else {
                continue;
            };
            let work = Duration::from_millis(rng.gen_range(50..300));
            tracing::debug!(worker = id, job = %item.number, %token, ?work, "executing");
            std::thread::sleep(work);

            let outputs = serde_json::json!({
                "worker": id,
                "elapsed_ms": work.as_millis() as u64,
            });
            if let Err(e) = queue.task_done(token, outputs) {
                tracing::warn!(worker = id, "task_done failed: {e}");
            }
        }
    })
}

#[tokio::main]
async fn main() -> Result<(), TetherError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = TetherConfig::from_env()?;
    let workers = parsed_var::<usize>("TETHER_WORKERS")?.unwrap_or(2);
    let jobs = parsed_var::<usize>("TETHER_JOBS")?.unwrap_or(5);

    // (A) consumer: instrumented queue + workers
    let queue = Arc::new(ExecutionQueue::new(&config));
    let tracker = Arc::new(CompletionTracker::new(&config));
    instrument(&queue, &tracker)?;

    let stop = Arc::new(AtomicBool::new(false));
    let handles: Vec<_> = (0..workers)
        .map(|id| spawn_worker(id, Arc::clone(&queue), Arc::clone(&stop)))
        .collect();

    // (B) submitter: one tracked job at a time
    let route = LocalRoute::new(Arc::clone(&tracker));
    for i in 0..jobs {
        let job = queue.next_number();
        let front = i % 3 == 2;
        let started = Instant::now();
        let completion = submit_and_wait(&route, job, || {
            let queue = Arc::clone(&queue);
            async move {
                let submitted = queue.submit(serde_json::json!({ "index": i }), front);
                if !submitted.same_job(job) {
                    tracing::warn!(%job, %submitted, "submission raced with another submitter");
                }
                Ok(())
            }
        })
        .await?;
        println!("job {job}: {completion:?} after {:?}", started.elapsed());
    }

    // (C) a submission that never reaches the queue: returns after the enqueue timeout
    let lost = queue.next_number();
    route.begin_tracking(lost).await?;
    let started = Instant::now();
    let completion = route.await_completion().await?;
    println!("job {lost} (never submitted): {completion:?} after {:?}", started.elapsed());

    stop.store(true, Ordering::Relaxed);
    join_workers(handles);

    let counts = queue.counts();
    println!(
        "counts: {}",
        serde_json::to_string(&counts).unwrap_or_else(|_| format!("{counts:?}"))
    );
    Ok(())
}
