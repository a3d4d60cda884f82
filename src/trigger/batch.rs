// src/trigger/batch.rs

//! Windowed batching of an inner trigger's events.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tracing::{debug, trace};

use crate::engine::{Lifetime, Shutdown};
use crate::errors::TriggerError;
use crate::trigger::cadence::{Feedback, deadline_after};
use crate::trigger::{BoxFuture, EventSequence, NextEvent, SharedTrigger, Trigger};
use crate::types::{Event, Response, SequenceState, Value};

/// Collect inner events until `max_size` items or `window` elapses, then
/// emit them as one event carrying `Value::List`.
///
/// - A window that expires with nothing collected is restarted; empty
///   batches are never emitted.
/// - When the inner sequence ends (including on shutdown), a non-empty
///   partial batch is emitted once before the batch ends.
/// - Collected inner events are left unanswered, so the inner trigger
///   settles them as handled with no value. The consumer's response to the
///   batch is governed by the batch's own policy, which defaults to the inner
///   trigger's `stop_on_error`.
#[derive(Debug, Clone)]
pub struct Batch {
    inner: SharedTrigger,
    max_size: usize,
    window: Duration,
    stop_on_error: Option<bool>,
}

impl Batch {
    pub fn new(inner: Trigger, max_size: usize, window: Duration) -> Self {
        Self {
            inner: Arc::new(inner),
            max_size,
            window,
            stop_on_error: None,
        }
    }

    /// Override the error policy inherited from the inner trigger.
    pub fn with_stop_on_error(mut self, stop_on_error: bool) -> Self {
        self.stop_on_error = Some(stop_on_error);
        self
    }

    pub fn inner(&self) -> &Trigger {
        &self.inner
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn stop_on_error(&self) -> bool {
        self.stop_on_error
            .unwrap_or_else(|| self.inner.stop_on_error())
    }

    pub(crate) fn instantiate(
        &self,
        lifetime: &Lifetime,
    ) -> Result<Box<dyn EventSequence>, TriggerError> {
        if self.max_size == 0 {
            return Err(TriggerError::InvalidConfig(
                "batch: max_size must be at least 1".to_string(),
            ));
        }
        if self.window.is_zero() {
            return Err(TriggerError::InvalidConfig(
                "batch: window must be greater than zero".to_string(),
            ));
        }

        let inner = self.inner.instantiate(lifetime)?;
        Ok(Box::new(BatchSequence {
            inner,
            max_size: self.max_size,
            window: self.window,
            shutdown: lifetime.shutdown_signal(),
            buffer: Vec::with_capacity(self.max_size),
            window_deadline: None,
            inner_done: false,
            emitted: 0,
            state: SequenceState::Created,
            feedback: Feedback::new(self.to_string(), self.stop_on_error()),
        }))
    }
}

impl fmt::Display for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "batch (max {}, window {:?}) of [{}]",
            self.max_size, self.window, self.inner
        )?;
        if let Some(stop) = self.stop_on_error {
            write!(f, " stop-on-error={stop}")?;
        }
        Ok(())
    }
}

enum Step {
    Inner(NextEvent),
    WindowElapsed,
}

struct BatchSequence {
    inner: Box<dyn EventSequence>,
    max_size: usize,
    window: Duration,
    shutdown: Shutdown,
    buffer: Vec<Value>,
    window_deadline: Option<Instant>,
    inner_done: bool,
    emitted: u64,
    state: SequenceState,
    feedback: Feedback,
}

impl BatchSequence {
    async fn finish(&mut self, state: SequenceState) {
        self.inner.close().await;
        self.state = state;
        self.buffer.clear();
        self.window_deadline = None;
        self.feedback.discard();
    }

    fn emit(&mut self) -> Event {
        self.window_deadline = None;
        self.emitted += 1;
        let items = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.max_size));
        trace!(
            trigger = %self.feedback.label(),
            emitted = self.emitted,
            size = items.len(),
            "emitting batch"
        );
        Event::new(self.emitted, Value::List(items))
    }
}

impl EventSequence for BatchSequence {
    fn next(&mut self) -> BoxFuture<'_, NextEvent> {
        Box::pin(async move {
            if self.state.is_terminal() {
                return Ok(None);
            }
            if let Err(err) = self.feedback.settle() {
                self.finish(SequenceState::Failed).await;
                return Err(err);
            }
            self.state = SequenceState::Running;

            while !self.inner_done && self.buffer.len() < self.max_size {
                let window = self.window;
                let deadline = *self
                    .window_deadline
                    .get_or_insert_with(|| deadline_after(Instant::now(), window));

                // One cancellable wait racing the inner sequence against the
                // window deadline.
                let step = tokio::select! {
                    biased;
                    res = self.inner.next() => Step::Inner(res),
                    _ = sleep_until(deadline) => Step::WindowElapsed,
                };

                match step {
                    Step::Inner(Ok(Some(event))) => self.buffer.push(event.value),
                    Step::Inner(Ok(None)) => {
                        debug!(
                            trigger = %self.feedback.label(),
                            pending = self.buffer.len(),
                            "inner sequence ended"
                        );
                        self.inner_done = true;
                    }
                    Step::Inner(Err(err)) => {
                        self.finish(SequenceState::Failed).await;
                        return Err(err);
                    }
                    Step::WindowElapsed if self.buffer.is_empty() => {
                        trace!(trigger = %self.feedback.label(), "window elapsed empty; restarting");
                        self.window_deadline = None;
                    }
                    Step::WindowElapsed => break,
                }
            }

            if self.buffer.is_empty() {
                let state = if self.shutdown.is_requested() {
                    SequenceState::Closed
                } else {
                    SequenceState::Exhausted
                };
                self.finish(state).await;
                return Ok(None);
            }

            // A partial batch left by a finished inner sequence is flushed
            // here without any further suspension.
            Ok(Some(self.emit()))
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
                    self.finish(SequenceState::Failed).await;
                    Err(err)
                }
            }
        })
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if self.state.is_terminal() {
                // Inner close is idempotent; make sure it happened.
                self.inner.close().await;
                return;
            }
            if !self.buffer.is_empty() {
                debug!(
                    trigger = %self.feedback.label(),
                    dropped = self.buffer.len(),
                    "closing with a partial batch"
                );
            }
            self.finish(SequenceState::Closed).await;
        })
    }

    fn state(&self) -> SequenceState {
        self.state
    }
}
