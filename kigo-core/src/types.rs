use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::params::Value;

pub type Bytes = Vec<u8>;

/// Enumeration of possible states for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "job_state", rename_all = "lowercase")]
pub enum JobState {
    /// Waiting on its queue to be picked up by a worker.
    Enqueued,
    /// Claimed by a worker and currently executing.
    Running,
    /// Terminal: the task returned an error, panicked, or the owning worker
    /// was terminated.
    Failed,
    /// Terminal: the task completed successfully.
    Finished,
}

impl FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "enqueued" => Ok(JobState::Enqueued),
            "running" => Ok(JobState::Running),
            "failed" => Ok(JobState::Failed),
            "finished" => Ok(JobState::Finished),
            invalid => Err(format!("{invalid} is not a valid JobState")),
        }
    }
}

/// A job row as stored, with its parameters still encoded.
#[derive(Debug, sqlx::FromRow)]
pub struct JobRecord {
    pub id: i64,
    pub queue_name: String,
    /// Set while `state` is `Running`; NULL in every other state.
    pub worker_id: Option<i64>,
    pub task_name: String,
    pub param_blob: Bytes,
    pub state: JobState,
    pub enqueued_at: DateTime<Utc>,
    /// Earliest wall-clock time the job may be claimed.
    pub start_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Populated only in the terminal `Failed` state.
    pub error: Option<String>,
}

/// A worker's process row.
#[derive(Debug, sqlx::FromRow)]
pub struct WorkerRecord {
    pub id: i64,
    pub name: String,
    pub concurrency: i32,
    pub started_at: DateTime<Utc>,
    pub heartbeat_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
}

/// A job claimed by a worker, with its parameters decoded and ready to hand
/// to a task.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub id: i64,
    pub queue_name: String,
    pub task_name: String,
    pub params: Vec<Value>,
}
