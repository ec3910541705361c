//! # kigo-worker
//!
//! The runtime half of kigo: a supervisor that boots a worker identity,
//! polls for due jobs, executes registered tasks concurrently behind a
//! panic barrier, heartbeats its process row, and coordinates graceful
//! shutdown across its sub-routines.
//!
//! ```ignore
//! let store = Store::connect(&url).await?;
//!
//! let mut registry = TaskRegistry::new();
//! registry.register("SweepFloors", |params| async move {
//!     // ...
//!     Ok(())
//! });
//!
//! Worker::new(store, registry, vec![], 5).run().await?;
//! ```

mod config;
pub use config::WorkerOptions;
pub use config::DEFAULT_API_ADDRESS;

mod error;
pub use error::WorkerError;

mod registry;
pub use registry::CancelSignal;
pub use registry::Task;
pub use registry::TaskRegistry;
pub use registry::TaskResult;

mod executor;
mod scheduler;

mod worker;
pub use worker::Worker;
