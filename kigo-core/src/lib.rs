//! # kigo-core
//!
//! The durable half of kigo: the job-queue protocol on top of a PostgreSQL
//! table set. Clients enqueue jobs through [`Store`]; workers claim and
//! resolve them through the same handle. The database is the single source
//! of truth for job state.

// We privately use modules and re-export their public parts so the internals
// can be rearranged without breaking the API.

mod types;
pub use types::Bytes;
pub use types::ClaimedJob;
pub use types::JobRecord;
pub use types::JobState;
pub use types::WorkerRecord;

mod error;
pub use error::StoreError;
pub use error::StoreResult;

mod config;
pub use config::PoolConfig;

mod params;
pub use params::decode_params;
pub use params::encode_params;
pub use params::Value;

mod store;
pub use store::Store;

mod client;
pub use client::DEFAULT_QUEUE_NAME;

mod webface;
pub use webface::add_routes;
pub use webface::DEFAULT_WEBFACE_ADDRESS;
