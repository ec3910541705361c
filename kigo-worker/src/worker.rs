//! The worker supervisor.
//!
//! Boots the worker's identity, spawns the sub-routines (scheduler,
//! heartbeat, signal catcher, external-terminator handler, admin API),
//! waits for the first termination cause, broadcasts shutdown, and cleans
//! up the process row on the way out.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, error, info, warn};

use kigo_core::{add_routes, Store, StoreError, DEFAULT_QUEUE_NAME};

use crate::config::{default_worker_name, WorkerOptions};
use crate::error::WorkerError;
use crate::registry::{CancelSignal, TaskRegistry};
use crate::scheduler::{run_scheduler, SchedulerState};

/// Why the worker is coming down. Only the first reported cause counts.
#[derive(Debug)]
enum Termination {
    Signal,
    External,
    Fatal(WorkerError),
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Termination::Signal => write!(f, "received termination signal"),
            Termination::External => write!(f, "external terminator was triggered"),
            Termination::Fatal(error) => write!(f, "{error}"),
        }
    }
}

/// A long-lived worker process: claims due jobs off its queues, runs their
/// tasks concurrently, and records outcomes. Workers are stateless apart
/// from their process row; any number may run against the same database.
pub struct Worker {
    store: Store,
    registry: TaskRegistry,
    queue_names: Vec<String>,
    concurrency: usize,
    options: WorkerOptions,
}

impl Worker {
    /// A worker with default options. An empty `queue_names` means the
    /// default queue.
    pub fn new(
        store: Store,
        registry: TaskRegistry,
        queue_names: Vec<String>,
        concurrency: usize,
    ) -> Self {
        Self::with_options(
            store,
            registry,
            queue_names,
            concurrency,
            WorkerOptions::default(),
        )
    }

    pub fn with_options(
        store: Store,
        registry: TaskRegistry,
        queue_names: Vec<String>,
        concurrency: usize,
        options: WorkerOptions,
    ) -> Self {
        let queue_names = if queue_names.is_empty() {
            vec![DEFAULT_QUEUE_NAME.to_owned()]
        } else {
            queue_names
        };

        Self {
            store,
            registry,
            queue_names,
            concurrency,
            options,
        }
    }

    /// Run until a termination cause fires, then drain and clean up.
    ///
    /// Signal and external terminations are normal exits; any other cause
    /// is returned as the worker's error. Removing the process row on the
    /// way out is best-effort: a failure there is logged, and the original
    /// termination cause is what the caller sees.
    pub async fn run(self) -> Result<(), WorkerError> {
        let Self {
            store,
            registry,
            queue_names,
            concurrency,
            options,
        } = self;

        let worker_name = options.custom_name.clone().unwrap_or_else(default_worker_name);
        let concurrency_cap = i32::try_from(concurrency).unwrap_or(i32::MAX);

        let worker_id = store
            .create_worker(&worker_name, &queue_names, concurrency_cap)
            .await?;

        info!(
            worker = %worker_name,
            id = worker_id,
            queues = ?queue_names,
            concurrency,
            "worker booting up"
        );

        let (termination_tx, mut termination_rx) = mpsc::channel::<Termination>(4);
        let (shutdown_tx, shutdown_rx) = watch::channel(());

        let state = Arc::new(Mutex::new(SchedulerState::new(queue_names, concurrency)));

        let mut subroutines = Vec::new();

        if options.catch_signals {
            subroutines.push(tokio::spawn(signal_catcher(
                termination_tx.clone(),
                shutdown_rx.clone(),
            )));
        }

        if let Some(terminator) = options.terminator.clone() {
            subroutines.push(tokio::spawn(external_terminator(
                terminator,
                termination_tx.clone(),
                shutdown_rx.clone(),
            )));
        }

        if let Some(address) = options.api_address.clone() {
            subroutines.push(tokio::spawn(admin_server(
                address,
                store.clone(),
                termination_tx.clone(),
                shutdown_rx.clone(),
            )));
        }

        subroutines.push(tokio::spawn(heartbeat(
            store.clone(),
            worker_id,
            options.heartbeat_interval,
            shutdown_rx.clone(),
        )));

        subroutines.push(tokio::spawn(run_scheduler(
            store.clone(),
            registry,
            worker_id,
            state,
            options.polling_interval,
            options.term_grace_period,
            shutdown_rx,
        )));

        // The supervisor holds a sender of its own, so recv() can only
        // resolve once a sub-routine reports a cause.
        let cause = termination_rx
            .recv()
            .await
            .expect("termination channel closed with a sender still held");

        shutdown_tx.send(()).ok();

        for subroutine in subroutines {
            subroutine.await.ok();
        }

        let result = match cause {
            Termination::Signal | Termination::External => {
                info!(reason = %cause, "worker terminating");
                Ok(())
            }
            Termination::Fatal(error) => {
                error!(error = %error, "worker terminating");
                Err(error)
            }
        };

        if let Err(error) = store.terminate_worker(worker_id).await {
            warn!(error = %error, "couldn't remove worker process row");
        }

        info!("worker terminated");
        result
    }
}

async fn signal_catcher(
    termination: mpsc::Sender<Termination>,
    mut shutdown: watch::Receiver<()>,
) {
    let mut interrupt = match signal(SignalKind::interrupt()) {
        Ok(stream) => stream,
        Err(error) => {
            termination
                .try_send(Termination::Fatal(WorkerError::SignalHandler(error)))
                .ok();
            return;
        }
    };
    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(error) => {
            termination
                .try_send(Termination::Fatal(WorkerError::SignalHandler(error)))
                .ok();
            return;
        }
    };

    info!("listening for termination signals");

    tokio::select! {
        _ = interrupt.recv() => {
            info!(signal = "SIGINT", "received signal");
            termination.try_send(Termination::Signal).ok();
        }
        _ = terminate.recv() => {
            info!(signal = "SIGTERM", "received signal");
            termination.try_send(Termination::Signal).ok();
        }
        _ = shutdown.changed() => {}
    }
}

async fn external_terminator(
    terminator: CancelSignal,
    termination: mpsc::Sender<Termination>,
    mut shutdown: watch::Receiver<()>,
) {
    info!("listening on external terminator");

    tokio::select! {
        _ = terminator.cancelled() => {
            info!("external terminator triggered");
            termination.try_send(Termination::External).ok();
        }
        _ = shutdown.changed() => {}
    }
}

async fn heartbeat(
    store: Store,
    worker_id: i64,
    interval: Duration,
    mut shutdown: watch::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!("terminating heartbeat");
                return;
            }
            _ = ticker.tick() => {}
        }

        match store.beat_worker(worker_id).await {
            Ok(()) => debug!("heartbeat"),
            Err(error @ StoreError::WorkerMissing(_)) => {
                warn!(error = %error, "heartbeat found no process row")
            }
            Err(error) => error!(error = %error, "worker heartbeat failed"),
        }
    }
}

async fn admin_server(
    address: String,
    store: Store,
    termination: mpsc::Sender<Termination>,
    mut shutdown: watch::Receiver<()>,
) {
    let app = add_routes(Router::new(), store);

    let listener = match TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(error) => {
            termination
                .try_send(Termination::Fatal(WorkerError::AdminServer(error)))
                .ok();
            return;
        }
    };

    info!(address = %address, "admin api listening");

    let served = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown.changed().await.ok();
    });

    if let Err(error) = served.await {
        termination
            .try_send(Termination::Fatal(WorkerError::AdminServer(error)))
            .ok();
    }
}
