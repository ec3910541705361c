//! The task registry.
//!
//! An explicit mapping from task name to callback, built during process
//! initialization and handed to workers. Registration is not meant to be
//! interleaved with execution; once a worker is running, the registry is
//! read-only by contract.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use kigo_core::Value;

/// One-shot cooperative stop signal delivered to tasks that ask for it.
pub type CancelSignal = CancellationToken;

/// What a task callback resolves to. An `Err` fails the job.
pub type TaskResult = anyhow::Result<()>;

type TaskFuture = BoxFuture<'static, TaskResult>;
type Callback = Arc<dyn Fn(Vec<Value>, CancelSignal) -> TaskFuture + Send + Sync>;

/// A registered task: its callback plus whether it observes cancellation.
#[derive(Clone)]
pub struct Task {
    callback: Callback,
    takes_cancel: bool,
}

impl Task {
    pub(crate) fn invoke(&self, params: Vec<Value>, cancel: CancelSignal) -> TaskFuture {
        (self.callback)(params, cancel)
    }

    pub fn takes_cancel(&self) -> bool {
        self.takes_cancel
    }
}

/// Process-wide mapping from task name to callback.
#[derive(Default, Clone)]
pub struct TaskRegistry {
    tasks: HashMap<String, Task>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task that ignores cancellation. The callback receives the
    /// job's parameter tuple; validating arity and element types is its job.
    pub fn register<F, Fut>(&mut self, name: &str, callback: F)
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        let callback: Callback = Arc::new(move |params, _cancel| Box::pin(callback(params)));
        self.tasks.insert(
            name.to_owned(),
            Task {
                callback,
                takes_cancel: false,
            },
        );
    }

    /// Register a task whose callback receives the cancel signal ahead of
    /// its parameters. The signal fires when the worker asks the task to
    /// stop; honoring it is cooperative.
    pub fn register_with_cancel<F, Fut>(&mut self, name: &str, callback: F)
    where
        F: Fn(CancelSignal, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        let callback: Callback = Arc::new(move |params, cancel| Box::pin(callback(cancel, params)));
        self.tasks.insert(
            name.to_owned(),
            Task {
                callback,
                takes_cancel: true,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
