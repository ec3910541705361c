//! Task execution.
//!
//! Runs one claimed job's task on its own tokio task, behind a panic
//! barrier, and reports the outcome on the scheduler's result channel
//! exactly once.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::sync::mpsc;

use kigo_core::ClaimedJob;

use crate::error::WorkerError;
use crate::registry::{CancelSignal, TaskRegistry};

/// Outcome of one task execution.
#[derive(Debug)]
pub(crate) struct ThreadResult {
    pub thread_id: u64,
    /// `None` on success; otherwise the failure message recorded on the job.
    pub error: Option<String>,
}

/// Start a claimed job's task.
///
/// An unregistered task name is reported synchronously, before anything is
/// spawned. For tasks that observe cancellation, the freshly allocated
/// signal is returned so the scheduler can trigger it at shutdown.
pub(crate) fn spawn_task(
    registry: &TaskRegistry,
    thread_id: u64,
    job: &ClaimedJob,
    results: mpsc::UnboundedSender<ThreadResult>,
) -> Result<Option<CancelSignal>, WorkerError> {
    let Some(task) = registry.get(&job.task_name) else {
        return Err(WorkerError::UnknownTask(job.task_name.clone()));
    };

    let cancel = CancelSignal::new();
    let takes_cancel = task.takes_cancel();

    let task = task.clone();
    let params = job.params.clone();
    let task_cancel = cancel.clone();

    tokio::spawn(async move {
        // The barrier covers callback construction too, so a task that
        // panics while validating its parameters still reports a result.
        let outcome = AssertUnwindSafe(async move { task.invoke(params, task_cancel).await })
            .catch_unwind()
            .await;

        let error = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(error)) => Some(format!("{error:#}")),
            Err(panic) => Some(format!("panic: {}", panic_detail(panic.as_ref()))),
        };

        // The scheduler may already be gone during shutdown.
        results.send(ThreadResult { thread_id, error }).ok();
    });

    Ok(takes_cancel.then_some(cancel))
}

fn panic_detail(panic: &(dyn Any + Send)) -> String {
    if let Some(detail) = panic.downcast_ref::<&str>() {
        (*detail).to_owned()
    } else if let Some(detail) = panic.downcast_ref::<String>() {
        detail.clone()
    } else {
        "unknown panic".to_owned()
    }
}
