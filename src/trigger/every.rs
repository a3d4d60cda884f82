// src/trigger/every.rs

//! Fixed-period trigger with additive jitter, and the periodic sequence it
//! shares with [`Recurrent`](crate::trigger::Recurrent).

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::engine::{Lifetime, Shutdown};
use crate::errors::TriggerError;
use crate::trigger::cadence::{Cadence, Feedback, Settled, Waited, wait_until};
use crate::trigger::{BoxFuture, Delay, EventSequence, NextEvent, describe_policy};
use crate::types::{Event, Response, SequenceState, Value};

/// Fire immediately, then every `period + delay()`.
///
/// The base interval advances by exactly `period` per event, so time spent
/// by the task body does not accumulate into drift.
#[derive(Debug, Clone)]
pub struct Every {
    period: Duration,
    delay: Delay,
    stop_on_error: bool,
}

impl Every {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
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

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn delay(&self) -> &Delay {
        &self.delay
    }

    pub fn stop_on_error(&self) -> bool {
        self.stop_on_error
    }

    pub(crate) fn instantiate(
        &self,
        lifetime: &Lifetime,
    ) -> Result<Box<dyn EventSequence>, TriggerError> {
        if self.period.is_zero() {
            return Err(TriggerError::InvalidConfig(
                "every: period must be greater than zero".to_string(),
            ));
        }
        Ok(Box::new(PeriodicSequence::new(
            self.to_string(),
            Interval::Fixed(self.period),
            self.delay.clone(),
            self.stop_on_error,
            lifetime.shutdown_signal(),
        )))
    }
}

impl fmt::Display for Every {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "every {:?}", self.period)?;
        describe_policy(f, &self.delay, self.stop_on_error)
    }
}

/// How the next interval is chosen.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Interval {
    Fixed(Duration),
    /// Default interval, overridable by a `Value::Duration` response.
    Adaptive(Duration),
}

/// Live state for `Every` and `Recurrent`.
pub(crate) struct PeriodicSequence {
    interval: Interval,
    delay: Delay,
    shutdown: Shutdown,
    cadence: Cadence,
    /// Deadline of the wait in progress, kept so a dropped `next()` resumes it.
    deadline: Option<Instant>,
    fired: u64,
    state: SequenceState,
    feedback: Feedback,
}

impl PeriodicSequence {
    pub(crate) fn new(
        label: String,
        interval: Interval,
        delay: Delay,
        stop_on_error: bool,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            interval,
            delay,
            shutdown,
            cadence: Cadence::default(),
            deadline: None,
            fired: 0,
            state: SequenceState::Created,
            feedback: Feedback::new(label, stop_on_error),
        }
    }

    fn next_interval(&self, settled: Settled) -> Duration {
        let default = match self.interval {
            Interval::Fixed(period) => return period,
            Interval::Adaptive(default) => default,
        };

        match settled {
            Settled::Nothing | Settled::Recovered => default,
            Settled::Handled(Some(Value::Duration(next))) if next.is_zero() => {
                warn!(
                    trigger = %self.feedback.label(),
                    ?default,
                    "interval override is zero; using default interval"
                );
                default
            }
            Settled::Handled(Some(Value::Duration(next))) => {
                trace!(trigger = %self.feedback.label(), ?next, "using interval override");
                next
            }
            Settled::Handled(Some(other)) => {
                warn!(
                    trigger = %self.feedback.label(),
                    kind = other.kind(),
                    ?default,
                    "interval override is not a duration; using default interval"
                );
                default
            }
            Settled::Handled(None) => {
                warn!(
                    trigger = %self.feedback.label(),
                    ?default,
                    "no interval override returned; using default interval"
                );
                default
            }
        }
    }

    fn finish(&mut self, state: SequenceState) {
        self.state = state;
        self.deadline = None;
        self.feedback.discard();
    }
}

impl EventSequence for PeriodicSequence {
    fn next(&mut self) -> BoxFuture<'_, NextEvent> {
        Box::pin(async move {
            if self.state.is_terminal() {
                return Ok(None);
            }

            let deadline = match self.deadline {
                Some(deadline) => deadline,
                None => {
                    let settled = match self.feedback.settle() {
                        Ok(settled) => settled,
                        Err(err) => {
                            self.finish(SequenceState::Failed);
                            return Err(err);
                        }
                    };
                    let interval = self.next_interval(settled);
                    let deadline = self.cadence.advance(interval, &self.delay);
                    self.deadline = Some(deadline);
                    deadline
                }
            };
            self.state = SequenceState::Running;

            if wait_until(&self.shutdown, deadline).await == Waited::Cancelled {
                debug!(trigger = %self.feedback.label(), "shutdown observed; closing");
                self.finish(SequenceState::Closed);
                return Ok(None);
            }

            self.deadline = None;
            self.fired += 1;
            trace!(trigger = %self.feedback.label(), fired = self.fired, "firing");
            Ok(Some(Event::new(self.fired, Value::Unit)))
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
