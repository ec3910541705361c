//! The polling scheduler.
//!
//! A single cooperative loop that, each tick, records the outcomes of
//! completed task executions and admits due jobs until the concurrency cap
//! is reached. Backpressure is the polling interval: once the queues are
//! drained or capacity is full, nothing happens until the next tick.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch, Mutex};
use tracing::{error, info, warn};

use kigo_core::{ClaimedJob, Store};

use crate::executor::{spawn_task, ThreadResult};
use crate::registry::{CancelSignal, TaskRegistry};

/// Book-keeping for one in-flight task execution.
pub(crate) struct ThreadInfo {
    pub job: ClaimedJob,
    pub started_at: Instant,
    /// Present for tasks that observe cancellation.
    pub cancel: Option<CancelSignal>,
}

/// State shared between scheduler ticks and the shutdown drain.
pub(crate) struct SchedulerState {
    pub queue_names: Vec<String>,
    pub concurrency: usize,
    pub counter: u64,
    pub active_threads: HashMap<u64, ThreadInfo>,
}

impl SchedulerState {
    pub fn new(queue_names: Vec<String>, concurrency: usize) -> Self {
        Self {
            queue_names,
            concurrency,
            counter: 0,
            active_threads: HashMap::new(),
        }
    }
}

pub(crate) async fn run_scheduler(
    store: Store,
    registry: TaskRegistry,
    worker_id: i64,
    state: Arc<Mutex<SchedulerState>>,
    polling_interval: Duration,
    term_grace_period: Duration,
    mut shutdown: watch::Receiver<()>,
) {
    let (results_tx, mut results_rx) = mpsc::unbounded_channel();

    {
        let state = state.lock().await;
        info!(
            queues = ?state.queue_names,
            concurrency = state.concurrency,
            "starting scheduler"
        );
    }

    let mut ticker = tokio::time::interval(polling_interval);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }

        let mut state = state.lock().await;
        drain_results(&store, &mut state, &mut results_rx).await;
        admit_jobs(&store, &registry, worker_id, &mut state, &results_tx).await;
        metrics::gauge!("kigo_active_jobs").set(state.active_threads.len() as f64);
    }

    info!("terminating scheduler");
    drain_until_grace(&store, &state, &mut results_rx, term_grace_period).await;
}

/// Non-blockingly consume every pending result and record its outcome.
async fn drain_results(
    store: &Store,
    state: &mut SchedulerState,
    results_rx: &mut mpsc::UnboundedReceiver<ThreadResult>,
) {
    while let Ok(result) = results_rx.try_recv() {
        record_result(store, state, result).await;
    }
}

async fn record_result(store: &Store, state: &mut SchedulerState, result: ThreadResult) {
    let Some(thread) = state.active_threads.remove(&result.thread_id) else {
        return;
    };

    let job = thread.job;
    metrics::histogram!("kigo_job_duration_seconds").record(thread.started_at.elapsed().as_secs_f64());

    match result.error {
        Some(message) => {
            error!(id = job.id, task = %job.task_name, error = %message, "job failed");
            metrics::counter!("kigo_jobs_failed").increment(1);
            if let Err(error) = store
                .fail_job(job.id, &format!("job {} failed: {}", job.id, message))
                .await
            {
                error!(id = job.id, error = %error, "couldn't record job failure");
            }
        }
        None => {
            info!(id = job.id, task = %job.task_name, "job finished");
            metrics::counter!("kigo_jobs_finished").increment(1);
            if let Err(error) = store.finish_job(job.id).await {
                error!(id = job.id, error = %error, "couldn't record job completion");
            }
        }
    }
}

/// Claim and start due jobs until the concurrency cap is reached or the
/// queues run dry. Store errors are logged and retried implicitly on the
/// next tick.
async fn admit_jobs(
    store: &Store,
    registry: &TaskRegistry,
    worker_id: i64,
    state: &mut SchedulerState,
    results_tx: &mpsc::UnboundedSender<ThreadResult>,
) {
    while state.active_threads.len() < state.concurrency {
        let job = match store.claim_job(worker_id, &state.queue_names).await {
            Ok(Some(job)) => job,
            Ok(None) => break,
            Err(error) => {
                error!(error = %error, "couldn't claim job");
                break;
            }
        };

        info!(id = job.id, task = %job.task_name, "claimed job");
        metrics::counter!("kigo_jobs_claimed").increment(1);

        let thread_id = state.counter;
        state.counter += 1;

        match spawn_task(registry, thread_id, &job, results_tx.clone()) {
            Ok(cancel) => {
                state.active_threads.insert(
                    thread_id,
                    ThreadInfo {
                        job,
                        started_at: Instant::now(),
                        cancel,
                    },
                );
            }
            Err(error) => {
                warn!(id = job.id, task = %job.task_name, error = %error, "couldn't start job");
                if let Err(error) = store
                    .fail_job(job.id, &format!("couldn't start job {}: {}", job.id, error))
                    .await
                {
                    error!(id = job.id, error = %error, "couldn't record job failure");
                }
            }
        }
    }
}

/// Ask every in-flight task to stop, then wait up to the grace period for
/// their results. Jobs still running afterwards stay `running`; worker
/// termination flips them to `failed`.
async fn drain_until_grace(
    store: &Store,
    state: &Arc<Mutex<SchedulerState>>,
    results_rx: &mut mpsc::UnboundedReceiver<ThreadResult>,
    term_grace_period: Duration,
) {
    let deadline = Instant::now() + term_grace_period;

    {
        let mut state = state.lock().await;
        drain_results(store, &mut state, results_rx).await;

        if state.active_threads.is_empty() {
            return;
        }

        for thread in state.active_threads.values() {
            if let Some(cancel) = &thread.cancel {
                cancel.cancel();
            }
        }

        info!(
            active = state.active_threads.len(),
            grace = ?term_grace_period,
            "waiting for in-flight jobs"
        );
    }

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }

        match tokio::time::timeout(remaining, results_rx.recv()).await {
            Ok(Some(result)) => {
                let mut state = state.lock().await;
                record_result(store, &mut state, result).await;
                if state.active_threads.is_empty() {
                    return;
                }
            }
            Ok(None) | Err(_) => break,
        }
    }

    let state = state.lock().await;
    warn!(
        active = state.active_threads.len(),
        "grace period elapsed; remaining jobs will be failed on termination"
    );
}
