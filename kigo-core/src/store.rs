//! The queue protocol, implemented atomically on top of PostgreSQL.
//!
//! Every operation a producer or worker performs against job state lives
//! here. The claim path relies on row-level locking (`SELECT … FOR UPDATE`
//! inside a transaction) to guarantee that a job leaves `enqueued` at most
//! once, no matter how many workers race for it.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;

use crate::config::PoolConfig;
use crate::error::{StoreError, StoreResult};
use crate::params::decode_params;
use crate::types::{Bytes, ClaimedJob, JobRecord, WorkerRecord};

/// Error text recorded on jobs orphaned by a terminating worker.
pub(crate) const WORKER_TERMINATED_MESSAGE: &str = "worker was terminated";

/// A handle on the kigo tables. Cheap to clone; all clones share one pool.
#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    /// Connect with default pool caps.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        Self::with_config(PoolConfig::new(url)).await
    }

    pub async fn with_config(config: PoolConfig) -> StoreResult<Self> {
        let pool = config
            .connect()
            .await
            .map_err(|error| StoreError::PoolCreation { error })?;

        Ok(Self { pool })
    }

    /// Build a store over an existing pool. Mostly useful for tests.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database reachability.
    pub async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|error| StoreError::Connection { error })?;

        Ok(())
    }

    /// Create or update the kigo schema.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;

        Ok(())
    }

    /// Drop every kigo table and type, including migration bookkeeping.
    pub async fn drop_everything(&self) -> StoreResult<()> {
        let statements = [
            "DROP TABLE IF EXISTS jobs",
            "DROP TABLE IF EXISTS worker_queues",
            "DROP TABLE IF EXISTS workers",
            "DROP TABLE IF EXISTS queues",
            "DROP TYPE IF EXISTS job_state",
            "DROP TABLE IF EXISTS _sqlx_migrations",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|error| query_error("DROP", error))?;
        }

        Ok(())
    }

    /// Idempotent upsert of a queue row.
    pub async fn ensure_queue(&self, name: &str) -> StoreResult<()> {
        sqlx::query("INSERT INTO queues (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|error| query_error("INSERT", error))?;

        Ok(())
    }

    /// Insert a job in the `enqueued` state, eligible to be claimed once
    /// `start_at` has passed. The queue must already exist.
    pub async fn push_job(
        &self,
        queue_name: &str,
        task_name: &str,
        param_blob: Bytes,
        start_at: DateTime<Utc>,
    ) -> StoreResult<i64> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
INSERT INTO jobs (queue_name, task_name, param_blob, state, enqueued_at, start_at)
VALUES ($1, $2, $3, 'enqueued'::job_state, NOW(), $4)
RETURNING id
            "#,
        )
        .bind(queue_name)
        .bind(task_name)
        .bind(&param_blob)
        .bind(start_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            if is_foreign_key_violation(&error) {
                StoreError::QueueMissing(queue_name.to_owned())
            } else {
                query_error("INSERT", error)
            }
        })?;

        Ok(id)
    }

    /// Insert a worker's process row and its queue associations in one
    /// transaction. The named queues must already exist.
    pub async fn create_worker(
        &self,
        name: &str,
        queue_names: &[String],
        concurrency: i32,
    ) -> StoreResult<i64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|error| transaction_error("BEGIN", error))?;

        let (worker_id,): (i64,) = sqlx::query_as(
            r#"
INSERT INTO workers (name, concurrency, started_at, heartbeat_at)
VALUES ($1, $2, NOW(), NOW())
RETURNING id
            "#,
        )
        .bind(name)
        .bind(concurrency)
        .fetch_one(&mut *tx)
        .await
        .map_err(|error| query_error("INSERT", error))?;

        for queue_name in queue_names {
            sqlx::query("INSERT INTO worker_queues (worker_id, queue_name) VALUES ($1, $2)")
                .bind(worker_id)
                .bind(queue_name)
                .execute(&mut *tx)
                .await
                .map_err(|error| {
                    if is_foreign_key_violation(&error) {
                        StoreError::QueueMissing(queue_name.to_owned())
                    } else {
                        query_error("INSERT", error)
                    }
                })?;
        }

        tx.commit()
            .await
            .map_err(|error| transaction_error("COMMIT", error))?;

        Ok(worker_id)
    }

    /// Record a liveness heartbeat. `heartbeat_at` only ever moves forward.
    /// A missing row is reported as [`StoreError::WorkerMissing`], which
    /// callers may treat as non-fatal.
    pub async fn beat_worker(&self, worker_id: i64) -> StoreResult<()> {
        let result = sqlx::query("UPDATE workers SET heartbeat_at = NOW() WHERE id = $1")
            .bind(worker_id)
            .execute(&self.pool)
            .await
            .map_err(|error| query_error("UPDATE", error))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::WorkerMissing(worker_id));
        }

        Ok(())
    }

    /// Atomically fail every job the worker still owns and delete its
    /// process row. After this call no job row references the worker.
    pub async fn terminate_worker(&self, worker_id: i64) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|error| transaction_error("BEGIN", error))?;

        sqlx::query(
            r#"
UPDATE jobs
SET state = 'failed'::job_state, error = $2, worker_id = NULL, finished_at = NOW()
WHERE worker_id = $1
            "#,
        )
        .bind(worker_id)
        .bind(WORKER_TERMINATED_MESSAGE)
        .execute(&mut *tx)
        .await
        .map_err(|error| query_error("UPDATE", error))?;

        sqlx::query("DELETE FROM workers WHERE id = $1")
            .bind(worker_id)
            .execute(&mut *tx)
            .await
            .map_err(|error| query_error("DELETE", error))?;

        tx.commit()
            .await
            .map_err(|error| transaction_error("COMMIT", error))?;

        Ok(())
    }

    /// Claim the oldest due job on any of the given queues for this worker.
    ///
    /// The candidate id is selected `FOR UPDATE`, serializing claimants on
    /// the row; the transition to `running` happens in the same transaction,
    /// so a job leaves `enqueued` exactly once. Returns `None` when nothing
    /// is due. The post-commit re-read is authoritative for the returned
    /// job's contents.
    ///
    /// A job whose `param_blob` cannot be decoded can never execute, so it
    /// is immediately failed with a descriptive error before the decode
    /// failure is surfaced to the caller.
    pub async fn claim_job(
        &self,
        worker_id: i64,
        queue_names: &[String],
    ) -> StoreResult<Option<ClaimedJob>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|error| transaction_error("BEGIN", error))?;

        let candidate: Option<(i64,)> = sqlx::query_as(
            r#"
SELECT id FROM jobs
WHERE queue_name = ANY($1) AND state = 'enqueued'::job_state AND start_at <= NOW()
ORDER BY enqueued_at ASC, id ASC
LIMIT 1
FOR UPDATE
            "#,
        )
        .bind(queue_names)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|error| query_error("SELECT", error))?;

        let Some((job_id,)) = candidate else {
            tx.rollback()
                .await
                .map_err(|error| transaction_error("ROLLBACK", error))?;
            return Ok(None);
        };

        sqlx::query(
            r#"
UPDATE jobs
SET state = 'running'::job_state, worker_id = $2, started_at = NOW()
WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(worker_id)
        .execute(&mut *tx)
        .await
        .map_err(|error| query_error("UPDATE", error))?;

        tx.commit()
            .await
            .map_err(|error| transaction_error("COMMIT", error))?;

        let record: JobRecord = sqlx::query_as("SELECT * FROM jobs WHERE id = $1")
            .bind(job_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|error| query_error("SELECT", error))?;

        match decode_params(&record.param_blob) {
            Ok(params) => Ok(Some(ClaimedJob {
                id: record.id,
                queue_name: record.queue_name,
                task_name: record.task_name,
                params,
            })),
            Err(error) => {
                self.fail_job(
                    job_id,
                    &format!("couldn't decode parameters for job {job_id}: {error}"),
                )
                .await?;
                Err(StoreError::Decode { job_id, error })
            }
        }
    }

    /// Transition a running job to `finished`. Terminal rows are immutable,
    /// so this is silently a no-op unless the job is currently `running`.
    pub async fn finish_job(&self, job_id: i64) -> StoreResult<()> {
        sqlx::query(
            r#"
UPDATE jobs
SET state = 'finished'::job_state, worker_id = NULL, error = NULL, finished_at = NOW()
WHERE id = $1 AND state = 'running'::job_state
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(|error| query_error("UPDATE", error))?;

        Ok(())
    }

    /// Transition a running job to `failed`, recording the error text for
    /// human inspection. Silently a no-op unless the job is `running`.
    pub async fn fail_job(&self, job_id: i64, error_text: &str) -> StoreResult<()> {
        sqlx::query(
            r#"
UPDATE jobs
SET state = 'failed'::job_state, worker_id = NULL, error = $2, finished_at = NOW()
WHERE id = $1 AND state = 'running'::job_state
            "#,
        )
        .bind(job_id)
        .bind(error_text)
        .execute(&self.pool)
        .await
        .map_err(|error| query_error("UPDATE", error))?;

        Ok(())
    }

    /// Read a job row, encoded parameters and all.
    pub async fn job(&self, job_id: i64) -> StoreResult<Option<JobRecord>> {
        sqlx::query_as("SELECT * FROM jobs WHERE id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| query_error("SELECT", error))
    }

    /// Read a worker's process row.
    pub async fn worker(&self, worker_id: i64) -> StoreResult<Option<WorkerRecord>> {
        sqlx::query_as("SELECT * FROM workers WHERE id = $1")
            .bind(worker_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| query_error("SELECT", error))
    }

    /// Queue names a worker is associated with, for operational queries.
    pub async fn worker_queues(&self, worker_id: i64) -> StoreResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT queue_name FROM worker_queues WHERE worker_id = $1 ORDER BY queue_name",
        )
        .bind(worker_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| query_error("SELECT", error))?;

        Ok(rows.into_iter().map(|(name,)| name).collect())
    }
}

fn query_error(command: &str, error: sqlx::Error) -> StoreError {
    StoreError::Query {
        command: command.to_owned(),
        error,
    }
}

fn transaction_error(command: &str, error: sqlx::Error) -> StoreError {
    StoreError::Transaction {
        command: command.to_owned(),
        error,
    }
}

fn is_foreign_key_violation(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db_error) => db_error.code().as_deref() == Some("23503"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::Duration;

    use super::*;
    use crate::params::{encode_params, Value};
    use crate::types::JobState;

    fn queues(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| (*name).to_owned()).collect()
    }

    async fn push(store: &Store, queue: &str, task: &str, params: &[Value]) -> i64 {
        let blob = encode_params(params).expect("failed to encode params");
        store
            .push_job(queue, task, blob, Utc::now())
            .await
            .expect("failed to push job")
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_claim_returns_pushed_job(db: PgPool) {
        let store = Store::from_pool(db);
        store
            .ensure_queue("alpha")
            .await
            .expect("failed to ensure queue");

        let params = vec![Value::from(1i64), Value::from("broom")];
        let job_id = push(&store, "alpha", "SweepFloors", &params).await;

        let worker_id = store
            .create_worker("test-worker", &queues(&["alpha"]), 1)
            .await
            .expect("failed to create worker");

        let claimed = store
            .claim_job(worker_id, &queues(&["alpha"]))
            .await
            .expect("failed to claim job")
            .expect("expected a claimable job");

        assert_eq!(claimed.id, job_id);
        assert_eq!(claimed.queue_name, "alpha");
        assert_eq!(claimed.task_name, "SweepFloors");
        assert_eq!(claimed.params, params);

        let record = store
            .job(job_id)
            .await
            .expect("failed to read job")
            .expect("job row vanished");
        assert_eq!(record.state, JobState::Running);
        assert_eq!(record.worker_id, Some(worker_id));
        assert!(record.started_at.is_some());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_claim_is_oldest_first(db: PgPool) {
        let store = Store::from_pool(db);
        store
            .ensure_queue("alpha")
            .await
            .expect("failed to ensure queue");

        let first = push(&store, "alpha", "First", &[]).await;
        let second = push(&store, "alpha", "Second", &[]).await;

        let worker_id = store
            .create_worker("test-worker", &queues(&["alpha"]), 1)
            .await
            .expect("failed to create worker");

        let claimed = store
            .claim_job(worker_id, &queues(&["alpha"]))
            .await
            .expect("failed to claim job")
            .expect("expected a claimable job");
        assert_eq!(claimed.id, first);

        let claimed = store
            .claim_job(worker_id, &queues(&["alpha"]))
            .await
            .expect("failed to claim job")
            .expect("expected a claimable job");
        assert_eq!(claimed.id, second);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_claim_skips_future_start_at(db: PgPool) {
        let store = Store::from_pool(db);
        store
            .ensure_queue("alpha")
            .await
            .expect("failed to ensure queue");

        let blob = encode_params(&[]).expect("failed to encode params");
        store
            .push_job("alpha", "Later", blob, Utc::now() + Duration::seconds(600))
            .await
            .expect("failed to push job");

        let worker_id = store
            .create_worker("test-worker", &queues(&["alpha"]), 1)
            .await
            .expect("failed to create worker");

        let claimed = store
            .claim_job(worker_id, &queues(&["alpha"]))
            .await
            .expect("failed to claim job");
        assert!(claimed.is_none());

        // A due job on the same queue is still visible behind the future one.
        let due = push(&store, "alpha", "Now", &[]).await;
        let claimed = store
            .claim_job(worker_id, &queues(&["alpha"]))
            .await
            .expect("failed to claim job")
            .expect("expected a claimable job");
        assert_eq!(claimed.id, due);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_claim_on_empty_queues_returns_none(db: PgPool) {
        let store = Store::from_pool(db);
        store
            .ensure_queue("alpha")
            .await
            .expect("failed to ensure queue");

        let worker_id = store
            .create_worker("test-worker", &queues(&["alpha"]), 1)
            .await
            .expect("failed to create worker");

        let claimed = store
            .claim_job(worker_id, &queues(&["alpha"]))
            .await
            .expect("failed to claim job");
        assert!(claimed.is_none());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_concurrent_claimants_claim_each_job_once(db: PgPool) {
        const QUEUE_COUNT: usize = 4;
        const JOBS_PER_QUEUE: i64 = 25;
        const CLAIMANTS: usize = 8;

        let store = Store::from_pool(db);

        let queue_names: Vec<String> = (0..QUEUE_COUNT).map(|i| i.to_string()).collect();
        for name in &queue_names {
            store
                .ensure_queue(name)
                .await
                .expect("failed to ensure queue");
        }

        let mut pushed = HashSet::new();
        for name in &queue_names {
            for i in 0..JOBS_PER_QUEUE {
                push(&store, name, "Count", &[Value::from(i)]).await;
                pushed.insert((name.clone(), i));
            }
        }

        let worker_id = store
            .create_worker("test-worker", &queue_names, 1)
            .await
            .expect("failed to create worker");

        let mut claimants = Vec::new();
        for _ in 0..CLAIMANTS {
            let store = store.clone();
            let queue_names = queue_names.clone();
            claimants.push(tokio::spawn(async move {
                let mut claimed = Vec::new();
                loop {
                    match store
                        .claim_job(worker_id, &queue_names)
                        .await
                        .expect("failed to claim job")
                    {
                        Some(job) => {
                            let i = job.params[0].as_int().expect("expected an int param");
                            claimed.push((job.queue_name, i));
                        }
                        None => break,
                    }
                }
                claimed
            }));
        }

        let mut all_claimed = Vec::new();
        for claimant in claimants {
            all_claimed.extend(claimant.await.expect("claimant panicked"));
        }

        // Every pushed job was claimed exactly once across all claimants.
        let unique: HashSet<(String, i64)> = all_claimed.iter().cloned().collect();
        assert_eq!(all_claimed.len(), unique.len());
        assert_eq!(unique, pushed);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_push_job_to_missing_queue_fails(db: PgPool) {
        let store = Store::from_pool(db);

        let blob = encode_params(&[]).expect("failed to encode params");
        let result = store.push_job("nonesuch", "Task", blob, Utc::now()).await;

        assert!(matches!(result, Err(StoreError::QueueMissing(name)) if name == "nonesuch"));

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM jobs")
            .fetch_one(store.pool())
            .await
            .expect("failed to count jobs");
        assert_eq!(count, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_ensure_queue_is_idempotent(db: PgPool) {
        let store = Store::from_pool(db);

        store
            .ensure_queue("alpha")
            .await
            .expect("failed to ensure queue");
        store
            .ensure_queue("alpha")
            .await
            .expect("second ensure_queue should succeed");

        // A raw duplicate insert still violates the primary key.
        let duplicate = sqlx::query("INSERT INTO queues (name) VALUES ($1)")
            .bind("alpha")
            .execute(store.pool())
            .await;
        assert!(duplicate.is_err());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_finish_job_is_terminal(db: PgPool) {
        let store = Store::from_pool(db);
        store
            .ensure_queue("alpha")
            .await
            .expect("failed to ensure queue");

        let job_id = push(&store, "alpha", "Task", &[]).await;
        let worker_id = store
            .create_worker("test-worker", &queues(&["alpha"]), 1)
            .await
            .expect("failed to create worker");

        store
            .claim_job(worker_id, &queues(&["alpha"]))
            .await
            .expect("failed to claim job")
            .expect("expected a claimable job");

        store.finish_job(job_id).await.expect("failed to finish job");

        let record = store
            .job(job_id)
            .await
            .expect("failed to read job")
            .expect("job row vanished");
        assert_eq!(record.state, JobState::Finished);
        assert_eq!(record.worker_id, None);
        assert_eq!(record.error, None);
        assert!(record.finished_at.is_some());

        // Terminal rows are immutable: a late fail_job must not stick.
        store
            .fail_job(job_id, "too late")
            .await
            .expect("fail_job on a terminal row should be a no-op");

        let record = store
            .job(job_id)
            .await
            .expect("failed to read job")
            .expect("job row vanished");
        assert_eq!(record.state, JobState::Finished);
        assert_eq!(record.error, None);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_fail_job_records_error(db: PgPool) {
        let store = Store::from_pool(db);
        store
            .ensure_queue("alpha")
            .await
            .expect("failed to ensure queue");

        let job_id = push(&store, "alpha", "Task", &[]).await;
        let worker_id = store
            .create_worker("test-worker", &queues(&["alpha"]), 1)
            .await
            .expect("failed to create worker");

        store
            .claim_job(worker_id, &queues(&["alpha"]))
            .await
            .expect("failed to claim job")
            .expect("expected a claimable job");

        store
            .fail_job(job_id, "job 1 failed: augh")
            .await
            .expect("failed to fail job");

        let record = store
            .job(job_id)
            .await
            .expect("failed to read job")
            .expect("job row vanished");
        assert_eq!(record.state, JobState::Failed);
        assert_eq!(record.worker_id, None);
        assert_eq!(record.error.as_deref(), Some("job 1 failed: augh"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_fail_job_requires_running_state(db: PgPool) {
        let store = Store::from_pool(db);
        store
            .ensure_queue("alpha")
            .await
            .expect("failed to ensure queue");

        let job_id = push(&store, "alpha", "Task", &[]).await;

        // Still enqueued; neither terminal transition may apply.
        store
            .fail_job(job_id, "nope")
            .await
            .expect("fail_job on an enqueued row should be a no-op");
        store
            .finish_job(job_id)
            .await
            .expect("finish_job on an enqueued row should be a no-op");

        let record = store
            .job(job_id)
            .await
            .expect("failed to read job")
            .expect("job row vanished");
        assert_eq!(record.state, JobState::Enqueued);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_terminate_worker_fails_owned_jobs(db: PgPool) {
        let store = Store::from_pool(db);
        store
            .ensure_queue("alpha")
            .await
            .expect("failed to ensure queue");

        let job_id = push(&store, "alpha", "LongHaul", &[]).await;
        let worker_id = store
            .create_worker("test-worker", &queues(&["alpha"]), 1)
            .await
            .expect("failed to create worker");

        store
            .claim_job(worker_id, &queues(&["alpha"]))
            .await
            .expect("failed to claim job")
            .expect("expected a claimable job");

        store
            .terminate_worker(worker_id)
            .await
            .expect("failed to terminate worker");

        let record = store
            .job(job_id)
            .await
            .expect("failed to read job")
            .expect("job row vanished");
        assert_eq!(record.state, JobState::Failed);
        assert_eq!(record.worker_id, None);
        assert_eq!(record.error.as_deref(), Some(WORKER_TERMINATED_MESSAGE));

        assert!(store
            .worker(worker_id)
            .await
            .expect("failed to read worker")
            .is_none());

        let (orphans,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM jobs WHERE worker_id = $1")
            .bind(worker_id)
            .fetch_one(store.pool())
            .await
            .expect("failed to count orphans");
        assert_eq!(orphans, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_beat_worker_is_monotonic(db: PgPool) {
        let store = Store::from_pool(db);
        store
            .ensure_queue("alpha")
            .await
            .expect("failed to ensure queue");

        let worker_id = store
            .create_worker("test-worker", &queues(&["alpha"]), 1)
            .await
            .expect("failed to create worker");

        let before = store
            .worker(worker_id)
            .await
            .expect("failed to read worker")
            .expect("worker row vanished")
            .heartbeat_at;

        store
            .beat_worker(worker_id)
            .await
            .expect("failed to beat worker");

        let after = store
            .worker(worker_id)
            .await
            .expect("failed to read worker")
            .expect("worker row vanished")
            .heartbeat_at;

        assert!(after >= before);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_beat_missing_worker_is_reported(db: PgPool) {
        let store = Store::from_pool(db);

        let result = store.beat_worker(4096).await;
        assert!(matches!(result, Err(StoreError::WorkerMissing(4096))));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_create_worker_requires_queues_to_exist(db: PgPool) {
        let store = Store::from_pool(db);

        let result = store
            .create_worker("test-worker", &queues(&["nonesuch"]), 1)
            .await;
        assert!(matches!(result, Err(StoreError::QueueMissing(name)) if name == "nonesuch"));

        // The surrounding transaction rolled back the worker row too.
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM workers")
            .fetch_one(store.pool())
            .await
            .expect("failed to count workers");
        assert_eq!(count, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_create_worker_records_queue_associations(db: PgPool) {
        let store = Store::from_pool(db);
        for name in ["alpha", "beta"] {
            store
                .ensure_queue(name)
                .await
                .expect("failed to ensure queue");
        }

        let worker_id = store
            .create_worker("test-worker", &queues(&["beta", "alpha"]), 3)
            .await
            .expect("failed to create worker");

        let associated = store
            .worker_queues(worker_id)
            .await
            .expect("failed to read worker queues");
        assert_eq!(associated, vec!["alpha".to_owned(), "beta".to_owned()]);

        let record = store
            .worker(worker_id)
            .await
            .expect("failed to read worker")
            .expect("worker row vanished");
        assert_eq!(record.name, "test-worker");
        assert_eq!(record.concurrency, 3);
        assert_eq!(record.stopped_at, None);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_claim_fails_job_with_undecodable_params(db: PgPool) {
        let store = Store::from_pool(db);
        store
            .ensure_queue("alpha")
            .await
            .expect("failed to ensure queue");

        let (job_id,): (i64,) = sqlx::query_as(
            "INSERT INTO jobs (queue_name, task_name, param_blob) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind("alpha")
        .bind("Mangled")
        .bind(b"\x00not a tuple".as_slice())
        .fetch_one(store.pool())
        .await
        .expect("failed to insert mangled job");

        let worker_id = store
            .create_worker("test-worker", &queues(&["alpha"]), 1)
            .await
            .expect("failed to create worker");

        let result = store.claim_job(worker_id, &queues(&["alpha"])).await;
        assert!(matches!(result, Err(StoreError::Decode { job_id: id, .. }) if id == job_id));

        // The undecodable row must not be left running.
        let record = store
            .job(job_id)
            .await
            .expect("failed to read job")
            .expect("job row vanished");
        assert_eq!(record.state, JobState::Failed);
        assert_eq!(record.worker_id, None);
        let error = record.error.expect("expected a decode error message");
        assert!(error.contains("couldn't decode parameters"));
    }
}
