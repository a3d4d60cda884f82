// src/engine/lifetime.rs

//! Scheduler-lifetime handle shared with trigger instances.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::watch;
use tracing::info;

use crate::engine::flow::ExecutionFlow;
use crate::types::TaskName;

/// Cooperative cancellation signal derived from a [`Lifetime`].
///
/// Every suspension point in a trigger instance races against
/// [`Shutdown::cancelled`].
#[derive(Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl fmt::Debug for Shutdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shutdown")
            .field("requested", &self.is_requested())
            .finish()
    }
}

impl Shutdown {
    /// True once shutdown has been requested.
    pub fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown is requested, or when the owning lifetime is
    /// gone.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // An error means every sender is dropped; treat that as shutdown.
        let _ = rx.wait_for(|requested| *requested).await;
    }
}

struct LifetimeInner {
    flows: RwLock<BTreeMap<TaskName, ExecutionFlow>>,
    shutdown_tx: watch::Sender<bool>,
}

/// Running/shutdown state of a scheduler plus its execution flow registry.
///
/// Cheap to clone; all clones share the same state.
#[derive(Clone)]
pub struct Lifetime {
    inner: Arc<LifetimeInner>,
}

impl fmt::Debug for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifetime")
            .field("tasks", &self.task_names())
            .field("shutting_down", &self.is_shutting_down())
            .finish()
    }
}

impl Default for Lifetime {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifetime {
    pub fn new() -> Self {
        let (shutdown_tx, _rx) = watch::channel(false);
        Self {
            inner: Arc::new(LifetimeInner {
                flows: RwLock::new(BTreeMap::new()),
                shutdown_tx,
            }),
        }
    }

    /// Register the execution flow for `task`, returning the existing one if
    /// the task is already registered.
    pub fn register_flow(&self, task: &str) -> ExecutionFlow {
        let mut flows = self
            .inner
            .flows
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        flows
            .entry(task.to_string())
            .or_insert_with(|| ExecutionFlow::new(task))
            .clone()
    }

    /// Find the execution flow of a registered task.
    pub fn lookup_execution_flow(&self, task: &str) -> Option<ExecutionFlow> {
        self.inner
            .flows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(task)
            .cloned()
    }

    /// Names of all registered tasks, sorted.
    pub fn task_names(&self) -> Vec<TaskName> {
        self.inner
            .flows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Request shutdown. Idempotent.
    pub fn shutdown(&self) {
        let changed = self.inner.shutdown_tx.send_if_modified(|requested| {
            if *requested {
                false
            } else {
                *requested = true;
                true
            }
        });
        if changed {
            info!("scheduler shutdown requested");
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.inner.shutdown_tx.borrow()
    }

    /// A cancellation signal tied to this lifetime.
    pub fn shutdown_signal(&self) -> Shutdown {
        Shutdown {
            rx: self.inner.shutdown_tx.subscribe(),
        }
    }
}
