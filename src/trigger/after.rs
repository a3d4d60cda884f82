// src/trigger/after.rs

//! Dependency-chained trigger: fire once per result of another task.

use std::fmt;

use tokio::time::Instant;
use tracing::{debug, trace};

use crate::engine::{ExecutionFlow, Lifetime, Shutdown, Subscription};
use crate::errors::TriggerError;
use crate::trigger::cadence::{Feedback, Waited, deadline_after, wait_until};
use crate::trigger::{BoxFuture, Delay, EventSequence, NextEvent, describe_policy};
use crate::types::{Event, Response, SequenceState, TaskName, Value};

/// Reference to the upstream task of an [`After`] trigger.
#[derive(Debug, Clone)]
pub enum TaskRef {
    /// Resolved through [`Lifetime::lookup_execution_flow`] at instantiation.
    Name(TaskName),
    /// A live execution flow, used as-is.
    Flow(ExecutionFlow),
}

impl TaskRef {
    pub fn name(&self) -> &str {
        match self {
            TaskRef::Name(name) => name,
            TaskRef::Flow(flow) => flow.task(),
        }
    }
}

/// Emit one event per result published by the upstream task, each delayed
/// by `delay()`. Ends when the upstream flow closes.
#[derive(Debug, Clone)]
pub struct After {
    task: TaskRef,
    delay: Delay,
    stop_on_error: bool,
}

impl After {
    pub fn new(task: TaskRef) -> Self {
        Self {
            task,
            delay: Delay::none(),
            stop_on_error: false,
        }
    }

    pub fn with_delay(mut self, delay: Delay) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_stop_on_error(mut self, stop_on_error: bool) -> Self {
        self.stop_on_error = stop_on_error;
        self
    }

    pub fn task(&self) -> &TaskRef {
        &self.task
    }

    pub fn stop_on_error(&self) -> bool {
        self.stop_on_error
    }

    pub(crate) fn instantiate(
        &self,
        lifetime: &Lifetime,
    ) -> Result<Box<dyn EventSequence>, TriggerError> {
        let flow = match &self.task {
            TaskRef::Name(name) => lifetime
                .lookup_execution_flow(name)
                .ok_or_else(|| TriggerError::UnknownTask(name.clone()))?,
            TaskRef::Flow(flow) => flow.clone(),
        };

        Ok(Box::new(AfterSequence {
            delay: self.delay.clone(),
            shutdown: lifetime.shutdown_signal(),
            subscription: Some(flow.subscribe()),
            held: None,
            emitted: 0,
            state: SequenceState::Created,
            feedback: Feedback::new(self.to_string(), self.stop_on_error),
        }))
    }
}

impl fmt::Display for After {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "after '{}'", self.task.name())?;
        describe_policy(f, &self.delay, self.stop_on_error)
    }
}

enum Received {
    Value(Option<Value>),
    Cancelled,
}

struct AfterSequence {
    delay: Delay,
    shutdown: Shutdown,
    subscription: Option<Subscription>,
    /// Upstream value waiting out its jitter, with its release deadline.
    held: Option<(Value, Instant)>,
    emitted: u64,
    state: SequenceState,
    feedback: Feedback,
}

impl AfterSequence {
    fn finish(&mut self, state: SequenceState) {
        self.state = state;
        self.held = None;
        self.feedback.discard();
        if let Some(mut subscription) = self.subscription.take() {
            subscription.close();
        }
    }
}

impl EventSequence for AfterSequence {
    fn next(&mut self) -> BoxFuture<'_, NextEvent> {
        Box::pin(async move {
            if self.state.is_terminal() {
                return Ok(None);
            }
            if let Err(err) = self.feedback.settle() {
                self.finish(SequenceState::Failed);
                return Err(err);
            }
            self.state = SequenceState::Running;

            let deadline = match self.held.as_ref().map(|(_, deadline)| *deadline) {
                Some(deadline) => deadline,
                None => {
                    let Some(subscription) = self.subscription.as_mut() else {
                        self.finish(SequenceState::Exhausted);
                        return Ok(None);
                    };

                    let received = if self.shutdown.is_requested() {
                        Received::Cancelled
                    } else {
                        tokio::select! {
                            biased;
                            _ = self.shutdown.cancelled() => Received::Cancelled,
                            value = subscription.recv() => Received::Value(value),
                        }
                    };

                    match received {
                        Received::Cancelled => {
                            debug!(trigger = %self.feedback.label(), "shutdown observed; closing");
                            self.finish(SequenceState::Closed);
                            return Ok(None);
                        }
                        Received::Value(None) => {
                            debug!(trigger = %self.feedback.label(), "upstream flow closed; sequence exhausted");
                            self.finish(SequenceState::Exhausted);
                            return Ok(None);
                        }
                        Received::Value(Some(value)) => {
                            let deadline = deadline_after(Instant::now(), self.delay.sample());
                            self.held = Some((value, deadline));
                            deadline
                        }
                    }
                }
            };

            if wait_until(&self.shutdown, deadline).await == Waited::Cancelled {
                debug!(trigger = %self.feedback.label(), "shutdown observed; closing");
                self.finish(SequenceState::Closed);
                return Ok(None);
            }

            match self.held.take() {
                Some((value, _)) => {
                    self.emitted += 1;
                    trace!(trigger = %self.feedback.label(), emitted = self.emitted, "firing");
                    Ok(Some(Event::new(self.emitted, value)))
                }
                None => Ok(None),
            }
        })
    }

    fn respond(&mut self, response: Response) {
        if !self.state.is_terminal() {
            self.feedback.record(response);
        }
    }

    fn settle(&mut self) -> BoxFuture<'_, Result<(), TriggerError>> {
        Box::pin(async move {
            match self.feedback.settle() {
                Ok(_) => Ok(()),
                Err(err) => {
                    self.finish(SequenceState::Failed);
                    Err(err)
                }
            }
        })
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if !self.state.is_terminal() {
                debug!(trigger = %self.feedback.label(), "closing");
                self.finish(SequenceState::Closed);
            }
        })
    }

    fn state(&self) -> SequenceState {
        self.state
    }
}
