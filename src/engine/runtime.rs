// src/engine/runtime.rs

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::engine::{ExecutionFlow, Lifetime, Shutdown};
use crate::errors::{CadenceError, Result};
use crate::exec::TaskBody;
use crate::trigger::{EventSequence, Trigger};
use crate::types::{Response, SequenceState, TaskName};

/// How a task's run loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskExit {
    /// The trigger sequence ran out of events.
    Exhausted,
    /// Scheduler shutdown closed the sequence.
    Cancelled,
    /// A handling error was propagated by a `stop_on_error` trigger, or the
    /// driver itself crashed.
    Failed(String),
}

/// Per-task outcome of [`Scheduler::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub name: TaskName,
    /// Number of events the task body was invoked for.
    pub fired: u64,
    /// Number of those invocations that failed.
    pub failures: u64,
    pub exit: TaskExit,
}

/// Reports of every task, keyed by task name.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    reports: BTreeMap<TaskName, TaskReport>,
}

impl RunSummary {
    pub fn get(&self, task: &str) -> Option<&TaskReport> {
        self.reports.get(task)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaskReport> {
        self.reports.values()
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    fn insert(&mut self, report: TaskReport) {
        self.reports.insert(report.name.clone(), report);
    }
}

struct ScheduledTask {
    name: TaskName,
    trigger: Trigger,
    body: Arc<dyn TaskBody>,
}

/// Minimal driver binding triggers to task bodies.
///
/// Every task gets an execution flow when it is added, so `after` triggers
/// can reference tasks regardless of registration order. [`Scheduler::run`]
/// instantiates all triggers up front (configuration errors abort before any
/// task starts), then runs one tokio task per scheduled job until every
/// sequence has ended.
pub struct Scheduler {
    lifetime: Lifetime,
    tasks: Vec<ScheduledTask>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.tasks.iter().map(|t| t.name.as_str()).collect();
        f.debug_struct("Scheduler")
            .field("lifetime", &self.lifetime)
            .field("tasks", &names)
            .finish()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            lifetime: Lifetime::new(),
            tasks: Vec::new(),
        }
    }

    /// The lifetime handle; call [`Lifetime::shutdown`] on a clone to stop a
    /// running scheduler.
    pub fn lifetime(&self) -> &Lifetime {
        &self.lifetime
    }

    /// Register a task. Names must be unique.
    pub fn add_task<B>(
        &mut self,
        name: impl Into<TaskName>,
        trigger: Trigger,
        body: B,
    ) -> Result<ExecutionFlow>
    where
        B: TaskBody + 'static,
    {
        let name = name.into();
        if self.tasks.iter().any(|t| t.name == name) {
            return Err(CadenceError::ConfigError(format!(
                "task '{name}' is registered twice"
            )));
        }

        let flow = self.lifetime.register_flow(&name);
        debug!(task = %name, trigger = %trigger, "task registered");
        self.tasks.push(ScheduledTask {
            name,
            trigger,
            body: Arc::new(body),
        });
        Ok(flow)
    }

    /// Run every registered task until all of them have finished.
    pub async fn run(self) -> Result<RunSummary> {
        let Scheduler { lifetime, tasks } = self;

        let mut prepared = Vec::with_capacity(tasks.len());
        for task in tasks {
            match task.trigger.instantiate(&lifetime) {
                Ok(sequence) => prepared.push((task, sequence)),
                Err(err) => {
                    error!(task = %task.name, error = %err, "failed to instantiate trigger");
                    for (_, mut sequence) in prepared {
                        sequence.close().await;
                    }
                    return Err(err.into());
                }
            }
        }

        info!(tasks = prepared.len(), "scheduler started");

        let mut set = JoinSet::new();
        let mut names = HashMap::new();
        for (task, sequence) in prepared {
            let flow = lifetime.register_flow(&task.name);
            let handle = set.spawn(drive(
                task.name.clone(),
                sequence,
                task.body,
                flow,
                lifetime.shutdown_signal(),
            ));
            names.insert(handle.id(), task.name);
        }

        let mut summary = RunSummary::default();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(report) => summary.insert(report),
                Err(err) => {
                    let name = names.get(&err.id()).cloned().unwrap_or_default();
                    error!(task = %name, error = %err, "task driver crashed");
                    if let Some(flow) = lifetime.lookup_execution_flow(&name) {
                        flow.close();
                    }
                    summary.insert(TaskReport {
                        name,
                        fired: 0,
                        failures: 0,
                        exit: TaskExit::Failed(err.to_string()),
                    });
                }
            }
        }

        info!("scheduler finished");
        Ok(summary)
    }
}

/// Run loop of a single task.
async fn drive(
    name: TaskName,
    mut sequence: Box<dyn EventSequence>,
    body: Arc<dyn TaskBody>,
    flow: ExecutionFlow,
    shutdown: Shutdown,
) -> TaskReport {
    let mut fired = 0;
    let mut failures = 0;
    debug!(task = %name, "task loop started");

    let exit = loop {
        let event = match sequence.next().await {
            Ok(Some(event)) => event,
            Ok(None) => {
                if sequence.state() == SequenceState::Closed || shutdown.is_requested() {
                    break TaskExit::Cancelled;
                }
                break TaskExit::Exhausted;
            }
            Err(err) => {
                error!(task = %name, error = %err, "trigger failed; stopping task");
                break TaskExit::Failed(err.to_string());
            }
        };

        fired += 1;
        debug!(task = %name, seq = event.seq, value = %event.value, "running task body");

        // An event produced after shutdown is a final flush and runs to
        // completion; anything else is abandoned when shutdown arrives.
        let outcome = if shutdown.is_requested() {
            debug!(task = %name, "running final event produced during shutdown");
            Some(body.run(&name, event).await)
        } else {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => None,
                res = body.run(&name, event) => Some(res),
            }
        };

        match outcome {
            None => {
                info!(task = %name, "shutdown while task body was running; abandoning it");
                break TaskExit::Cancelled;
            }
            Some(Ok(value)) => {
                flow.publish(value.clone());
                sequence.respond(Response::Done(Some(value)));
            }
            Some(Err(err)) => {
                failures += 1;
                debug!(task = %name, error = %err, "task body failed");
                sequence.respond(Response::Failed(err));
            }
        }
    };

    sequence.close().await;
    flow.close();
    info!(task = %name, fired, failures, ?exit, "task loop finished");

    TaskReport {
        name,
        fired,
        failures,
        exit,
    }
}
