use kigo_core::StoreError;
use thiserror::Error;

/// Enumeration of errors raised by the worker runtime.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no such task {0}")]
    UnknownTask(String),
    #[error("admin api server failed: {0}")]
    AdminServer(#[source] std::io::Error),
    #[error("couldn't register signal handler: {0}")]
    SignalHandler(#[source] std::io::Error),
}
