use thiserror::Error;

/// Enumeration of errors for operations against the kigo store.
/// Errors originating from sqlx are wrapped to provide operation context.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("pool creation failed with: {error}")]
    PoolCreation { error: sqlx::Error },
    #[error("connection failed with: {error}")]
    Connection { error: sqlx::Error },
    #[error("{command} query failed with: {error}")]
    Query { command: String, error: sqlx::Error },
    #[error("transaction {command} failed with: {error}")]
    Transaction { command: String, error: sqlx::Error },
    #[error("queue {0} does not exist")]
    QueueMissing(String),
    #[error("worker {0} does not exist")]
    WorkerMissing(i64),
    #[error("couldn't encode parameters: {error}")]
    Encode { error: serde_json::Error },
    #[error("couldn't decode parameters for job {job_id}: {error}")]
    Decode {
        job_id: i64,
        error: serde_json::Error,
    },
    #[error("migration failed with: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

pub type StoreResult<T> = Result<T, StoreError>;
