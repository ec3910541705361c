//! Enqueue helpers for producers.
//!
//! Four variants over one insert, differing only in which defaults they
//! fill in. Parameters are encoded here, with the same codec the worker
//! decodes with.

use chrono::{DateTime, Utc};

use crate::error::{StoreError, StoreResult};
use crate::params::{encode_params, Value};
use crate::store::Store;

/// The queue used when a producer or worker names none.
pub const DEFAULT_QUEUE_NAME: &str = "default";

impl Store {
    /// Enqueue a task on the default queue, eligible to run immediately.
    pub async fn perform_task(&self, task_name: &str, params: &[Value]) -> StoreResult<i64> {
        self.perform_task_on_queue_at(task_name, params, DEFAULT_QUEUE_NAME, Utc::now())
            .await
    }

    /// Enqueue a task on the default queue, eligible no earlier than `start_at`.
    pub async fn perform_task_at(
        &self,
        task_name: &str,
        params: &[Value],
        start_at: DateTime<Utc>,
    ) -> StoreResult<i64> {
        self.perform_task_on_queue_at(task_name, params, DEFAULT_QUEUE_NAME, start_at)
            .await
    }

    /// Enqueue a task on a named queue, eligible to run immediately.
    pub async fn perform_task_on_queue(
        &self,
        task_name: &str,
        params: &[Value],
        queue_name: &str,
    ) -> StoreResult<i64> {
        self.perform_task_on_queue_at(task_name, params, queue_name, Utc::now())
            .await
    }

    /// Enqueue a task on a named queue, eligible no earlier than `start_at`.
    pub async fn perform_task_on_queue_at(
        &self,
        task_name: &str,
        params: &[Value],
        queue_name: &str,
        start_at: DateTime<Utc>,
    ) -> StoreResult<i64> {
        let blob = encode_params(params).map_err(|error| StoreError::Encode { error })?;
        self.push_job(queue_name, task_name, blob, start_at).await
    }
}
