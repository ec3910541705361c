use std::time::Duration;

use crate::registry::CancelSignal;

/// Default bind address for a worker's admin API listener.
pub const DEFAULT_API_ADDRESS: &str = "0.0.0.0:32600";

pub(crate) const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(2);
pub(crate) const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);
pub(crate) const DEFAULT_TERM_GRACE_PERIOD: Duration = Duration::from_secs(10);

const FALLBACK_HOSTNAME: &str = "anonymous";

/// Tunables for a worker process. Construct with struct-update syntax over
/// [`WorkerOptions::default`] to override just a few.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// Overrides the default `hostname/pid` worker name.
    pub custom_name: Option<String>,
    /// Bind address for the admin API listener; `None` disables it.
    pub api_address: Option<String>,
    /// Whether SIGINT/SIGTERM request graceful termination.
    pub catch_signals: bool,
    /// How long the scheduler waits on in-flight jobs at shutdown before
    /// leaving them for `terminate_worker` to fail.
    pub term_grace_period: Duration,
    /// How often the scheduler polls for due jobs.
    pub polling_interval: Duration,
    /// How often the heartbeat sub-routine touches the process row.
    pub heartbeat_interval: Duration,
    /// Cancelled by the embedding process to request termination.
    pub terminator: Option<CancelSignal>,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            custom_name: None,
            api_address: Some(DEFAULT_API_ADDRESS.to_owned()),
            catch_signals: true,
            term_grace_period: DEFAULT_TERM_GRACE_PERIOD,
            polling_interval: DEFAULT_POLLING_INTERVAL,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            terminator: None,
        }
    }
}

pub(crate) fn default_worker_name() -> String {
    let hostname = gethostname::gethostname();
    let hostname = match hostname.to_str() {
        Some(name) if !name.is_empty() => name,
        _ => FALLBACK_HOSTNAME,
    };

    format!("{}/{}", hostname, std::process::id())
}
