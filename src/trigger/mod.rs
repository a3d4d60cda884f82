// src/trigger/mod.rs

//! Composable, lazily evaluated triggers.
//!
//! A [`Trigger`] is an immutable description of *when* a task should run.
//! Binding it to a [`Lifetime`] with [`Trigger::instantiate`] produces a
//! fresh [`EventSequence`]: the live, per-task state that the scheduler
//! drives with a two-phase protocol:
//!
//! 1. `next().await` yields the next [`Event`] (or end of sequence),
//! 2. `respond(...)` hands the task body's outcome back to the sequence.
//!
//! The response is applied when the sequence advances: a `Recurrent`
//! trigger reads its next interval from it, and a failure is either
//! reported and swallowed or propagated out of `next()`, depending on
//! `stop_on_error`.
//!
//! - [`every`]: fixed period plus additive jitter.
//! - [`recurrent`]: like `every`, but each response may override the next
//!   interval.
//! - [`after`]: fires once per result published by another task.
//! - [`batch`]: groups inner events into count/time bounded windows.
//! - [`limit`]: `skip_first` / `take_first` prefix decorators.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::Lifetime;
use crate::errors::TriggerError;
use crate::types::{Event, Response, SequenceState, TaskName};

pub mod after;
pub mod batch;
mod cadence;
pub mod delay;
pub mod every;
pub mod limit;
pub mod recurrent;

pub use after::{After, TaskRef};
pub use batch::Batch;
pub use delay::Delay;
pub use every::Every;
pub use limit::{SkipFirst, TakeFirst, skip_first, take_first};
pub use recurrent::Recurrent;

/// Boxed, sendable future used by the object-safe [`EventSequence`] trait.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result of advancing a sequence: an event, end of sequence, or a
/// propagated error.
pub type NextEvent = Result<Option<Event>, TriggerError>;

/// Live trigger instance, exclusively owned by the task that created it.
///
/// `next()` is cancel-safe: if its future is dropped mid-wait, no event and
/// no received upstream value is lost, and the next call resumes the same
/// wait.
pub trait EventSequence: Send {
    /// Wait for the next event.
    ///
    /// Returns `Ok(None)` once the sequence is exhausted or closed (including
    /// on scheduler shutdown), and keeps returning it afterwards.
    fn next(&mut self) -> BoxFuture<'_, NextEvent>;

    /// Record the consumer's outcome for the most recent event.
    fn respond(&mut self, response: Response);

    /// Apply a pending response right away instead of on the next `next()`.
    fn settle(&mut self) -> BoxFuture<'_, Result<(), TriggerError>>;

    /// Release timers and subscriptions, closing wrapped instances first.
    ///
    /// Idempotent and callable from any state; never fails.
    fn close(&mut self) -> BoxFuture<'_, ()>;

    fn state(&self) -> SequenceState;
}

/// Immutable trigger configuration.
///
/// Cloning is cheap: wrapped triggers are shared behind `Arc`.
#[derive(Debug, Clone)]
pub enum Trigger {
    Every(Every),
    Recurrent(Recurrent),
    After(After),
    Batch(Batch),
    SkipFirst(SkipFirst),
    TakeFirst(TakeFirst),
}

impl Trigger {
    /// Fixed period, no jitter, errors recovered.
    pub fn every(period: Duration) -> Self {
        Every::new(period).into()
    }

    /// Self-adjusting recurrence with the given default interval.
    pub fn recurrent(default_interval: Duration) -> Self {
        Recurrent::new(default_interval).into()
    }

    /// Fire after each result of the named task.
    pub fn after(task: impl Into<TaskName>) -> Self {
        After::new(TaskRef::Name(task.into())).into()
    }

    /// Group the events of `inner` into windows.
    pub fn batch(inner: Trigger, max_size: usize, window: Duration) -> Self {
        Batch::new(inner, max_size, window).into()
    }

    /// Bind this trigger to a scheduler lifetime, producing a fresh and
    /// independent sequence.
    ///
    /// Configuration problems (unknown `after` task, zero period, ...) are
    /// reported here and never mid-sequence.
    pub fn instantiate(
        &self,
        lifetime: &Lifetime,
    ) -> Result<Box<dyn EventSequence>, TriggerError> {
        match self {
            Trigger::Every(t) => t.instantiate(lifetime),
            Trigger::Recurrent(t) => t.instantiate(lifetime),
            Trigger::After(t) => t.instantiate(lifetime),
            Trigger::Batch(t) => t.instantiate(lifetime),
            Trigger::SkipFirst(t) => t.instantiate(lifetime),
            Trigger::TakeFirst(t) => t.instantiate(lifetime),
        }
    }

    /// Effective error policy of this trigger.
    pub fn stop_on_error(&self) -> bool {
        match self {
            Trigger::Every(t) => t.stop_on_error(),
            Trigger::Recurrent(t) => t.stop_on_error(),
            Trigger::After(t) => t.stop_on_error(),
            Trigger::Batch(t) => t.stop_on_error(),
            Trigger::SkipFirst(t) => t.inner().stop_on_error(),
            Trigger::TakeFirst(t) => t.inner().stop_on_error(),
        }
    }

    /// Names of tasks this trigger depends on through `After`, in order of
    /// appearance.
    pub fn upstream_tasks(&self) -> Vec<TaskName> {
        let mut out = Vec::new();
        self.collect_upstream(&mut out);
        out
    }

    fn collect_upstream(&self, out: &mut Vec<TaskName>) {
        match self {
            Trigger::Every(_) | Trigger::Recurrent(_) => {}
            Trigger::After(t) => out.push(t.task().name().to_string()),
            Trigger::Batch(t) => t.inner().collect_upstream(out),
            Trigger::SkipFirst(t) => t.inner().collect_upstream(out),
            Trigger::TakeFirst(t) => t.inner().collect_upstream(out),
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Every(t) => fmt::Display::fmt(t, f),
            Trigger::Recurrent(t) => fmt::Display::fmt(t, f),
            Trigger::After(t) => fmt::Display::fmt(t, f),
            Trigger::Batch(t) => fmt::Display::fmt(t, f),
            Trigger::SkipFirst(t) => fmt::Display::fmt(t, f),
            Trigger::TakeFirst(t) => fmt::Display::fmt(t, f),
        }
    }
}

impl From<Every> for Trigger {
    fn from(t: Every) -> Self {
        Trigger::Every(t)
    }
}

impl From<Recurrent> for Trigger {
    fn from(t: Recurrent) -> Self {
        Trigger::Recurrent(t)
    }
}

impl From<After> for Trigger {
    fn from(t: After) -> Self {
        Trigger::After(t)
    }
}

impl From<Batch> for Trigger {
    fn from(t: Batch) -> Self {
        Trigger::Batch(t)
    }
}

/// Shared suffix for trigger descriptions.
pub(crate) fn describe_policy(
    f: &mut fmt::Formatter<'_>,
    delay: &Delay,
    stop_on_error: bool,
) -> fmt::Result {
    if !delay.is_none() {
        write!(f, " jitter {delay}")?;
    }
    if stop_on_error {
        f.write_str(" stop-on-error")?;
    }
    Ok(())
}

pub(crate) type SharedTrigger = Arc<Trigger>;
