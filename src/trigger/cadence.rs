// src/trigger/cadence.rs

//! Timing and feedback plumbing shared by the leaf triggers.

use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tracing::warn;

use crate::engine::Shutdown;
use crate::errors::TriggerError;
use crate::trigger::Delay;
use crate::types::{Response, Value};

/// Drift-free schedule: deadlines are computed from a fixed anchor plus an
/// accumulated base interval, never from the time the consumer came back.
#[derive(Debug, Default)]
pub(crate) struct Cadence {
    anchor: Option<Instant>,
    base: Duration,
}

impl Cadence {
    /// Deadline for the next event.
    ///
    /// The first call anchors the schedule at "now" and returns it, so the
    /// first event fires immediately. Later calls advance the base by
    /// `interval` and add one jitter sample on top without accumulating it.
    pub(crate) fn advance(&mut self, interval: Duration, delay: &Delay) -> Instant {
        match self.anchor {
            None => {
                let now = Instant::now();
                self.anchor = Some(now);
                now
            }
            Some(anchor) => {
                self.base = self.base.saturating_add(interval);
                deadline_after(anchor, self.base.saturating_add(delay.sample()))
            }
        }
    }
}

/// Roughly 30 years, the same horizon tokio uses for a timer that never fires.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `start + offset`, clamped to a far-future instant instead of overflowing.
pub(crate) fn deadline_after(start: Instant, offset: Duration) -> Instant {
    start
        .checked_add(offset)
        .or_else(|| start.checked_add(FAR_FUTURE))
        .unwrap_or(start)
}

/// Outcome of a cancellable wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Waited {
    Elapsed,
    Cancelled,
}

/// Sleep until `deadline` unless shutdown is requested first.
pub(crate) async fn wait_until(shutdown: &Shutdown, deadline: Instant) -> Waited {
    if shutdown.is_requested() {
        return Waited::Cancelled;
    }
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => Waited::Cancelled,
        _ = sleep_until(deadline) => Waited::Elapsed,
    }
}

/// What the last response amounted to once the error policy was applied.
#[derive(Debug)]
pub(crate) enum Settled {
    /// No response was pending.
    Nothing,
    /// The consumer handled the event.
    Handled(Option<Value>),
    /// The consumer failed and the failure was reported and swallowed.
    Recovered,
}

/// Pending consumer response plus the `stop_on_error` policy.
#[derive(Debug)]
pub(crate) struct Feedback {
    label: String,
    stop_on_error: bool,
    pending: Option<Response>,
}

impl Feedback {
    pub(crate) fn new(label: String, stop_on_error: bool) -> Self {
        Self {
            label,
            stop_on_error,
            pending: None,
        }
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn record(&mut self, response: Response) {
        if self.pending.replace(response).is_some() {
            warn!(trigger = %self.label, "response replaced before it was applied");
        }
    }

    /// Apply the error policy to the pending response, if any.
    pub(crate) fn settle(&mut self) -> Result<Settled, TriggerError> {
        match self.pending.take() {
            None => Ok(Settled::Nothing),
            Some(Response::Done(value)) => Ok(Settled::Handled(value)),
            Some(Response::Failed(error)) if self.stop_on_error => Err(TriggerError::Handling {
                trigger: self.label.clone(),
                error,
            }),
            Some(Response::Failed(error)) => {
                let message = format!("{error:#}");
                warn!(
                    trigger = %self.label,
                    error = %message,
                    "task failed while handling event; continuing schedule"
                );
                Ok(Settled::Recovered)
            }
        }
    }

    /// Drop any pending response without applying it.
    pub(crate) fn discard(&mut self) {
        self.pending = None;
    }
}
