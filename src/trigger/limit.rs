// src/trigger/limit.rs

//! Prefix decorators: `skip_first` and `take_first`.
//!
//! Both forward consumer responses (values and failures) to the wrapped
//! sequence unchanged, so the inner trigger's own error policy and interval
//! overrides keep working.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::engine::Lifetime;
use crate::errors::TriggerError;
use crate::trigger::{BoxFuture, EventSequence, NextEvent, SharedTrigger, Trigger};
use crate::types::{Response, SequenceState};

/// Drop the first `count` events of `trigger`.
///
/// `count == 0` returns `trigger` itself, without any wrapping.
pub fn skip_first(count: usize, trigger: Trigger) -> Trigger {
    if count == 0 {
        return trigger;
    }
    Trigger::SkipFirst(SkipFirst {
        count,
        inner: Arc::new(trigger),
    })
}

/// Forward only the first `count` events of `trigger`, then end.
pub fn take_first(count: usize, trigger: Trigger) -> Trigger {
    Trigger::TakeFirst(TakeFirst {
        count,
        inner: Arc::new(trigger),
    })
}

#[derive(Debug, Clone)]
pub struct SkipFirst {
    count: usize,
    inner: SharedTrigger,
}

impl SkipFirst {
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn inner(&self) -> &Trigger {
        &self.inner
    }

    pub(crate) fn instantiate(
        &self,
        lifetime: &Lifetime,
    ) -> Result<Box<dyn EventSequence>, TriggerError> {
        Ok(Box::new(SkipSequence {
            label: self.to_string(),
            inner: self.inner.instantiate(lifetime)?,
            remaining: self.count,
            state: SequenceState::Created,
        }))
    }
}

impl fmt::Display for SkipFirst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "skip first {} of [{}]", self.count, self.inner)
    }
}

#[derive(Debug, Clone)]
pub struct TakeFirst {
    count: usize,
    inner: SharedTrigger,
}

impl TakeFirst {
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn inner(&self) -> &Trigger {
        &self.inner
    }

    pub(crate) fn instantiate(
        &self,
        lifetime: &Lifetime,
    ) -> Result<Box<dyn EventSequence>, TriggerError> {
        Ok(Box::new(TakeSequence {
            label: self.to_string(),
            inner: self.inner.instantiate(lifetime)?,
            limit: self.count,
            taken: 0,
            state: SequenceState::Created,
        }))
    }
}

impl fmt::Display for TakeFirst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "take first {} of [{}]", self.count, self.inner)
    }
}

/// Terminal state to report once the wrapped sequence has ended.
fn ended_state(inner: &dyn EventSequence) -> SequenceState {
    match inner.state() {
        state if state.is_terminal() => state,
        _ => SequenceState::Exhausted,
    }
}

struct SkipSequence {
    label: String,
    inner: Box<dyn EventSequence>,
    remaining: usize,
    state: SequenceState,
}

impl SkipSequence {
    fn after_inner(&mut self, result: NextEvent) -> NextEvent {
        match result {
            Ok(Some(event)) => Ok(Some(event)),
            Ok(None) => {
                self.state = ended_state(self.inner.as_ref());
                Ok(None)
            }
            Err(err) => {
                self.state = SequenceState::Failed;
                Err(err)
            }
        }
    }
}

impl EventSequence for SkipSequence {
    fn next(&mut self) -> BoxFuture<'_, NextEvent> {
        Box::pin(async move {
            if self.state.is_terminal() {
                return Ok(None);
            }
            self.state = SequenceState::Running;

            while self.remaining > 0 {
                match self.inner.next().await {
                    Ok(Some(event)) => {
                        self.remaining -= 1;
                        trace!(
                            trigger = %self.label,
                            seq = event.seq,
                            remaining = self.remaining,
                            "skipping event"
                        );
                    }
                    other => return self.after_inner(other),
                }
            }

            let result = self.inner.next().await;
            self.after_inner(result)
        })
    }

    fn respond(&mut self, response: Response) {
        self.inner.respond(response);
    }

    fn settle(&mut self) -> BoxFuture<'_, Result<(), TriggerError>> {
        Box::pin(async move {
            let result = self.inner.settle().await;
            if result.is_err() {
                self.state = SequenceState::Failed;
            }
            result
        })
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.inner.close().await;
            if !self.state.is_terminal() {
                self.state = SequenceState::Closed;
            }
        })
    }

    fn state(&self) -> SequenceState {
        self.state
    }
}

struct TakeSequence {
    label: String,
    inner: Box<dyn EventSequence>,
    limit: usize,
    taken: usize,
    state: SequenceState,
}

impl EventSequence for TakeSequence {
    fn next(&mut self) -> BoxFuture<'_, NextEvent> {
        Box::pin(async move {
            if self.state.is_terminal() {
                return Ok(None);
            }
            self.state = SequenceState::Running;

            if self.taken >= self.limit {
                // The last response still goes through the inner policy.
                let settled = self.inner.settle().await;
                self.inner.close().await;
                debug!(trigger = %self.label, taken = self.taken, "limit reached; ending");
                return match settled {
                    Ok(()) => {
                        self.state = SequenceState::Exhausted;
                        Ok(None)
                    }
                    Err(err) => {
                        self.state = SequenceState::Failed;
                        Err(err)
                    }
                };
            }

            match self.inner.next().await {
                Ok(Some(event)) => {
                    self.taken += 1;
                    Ok(Some(event))
                }
                Ok(None) => {
                    self.state = ended_state(self.inner.as_ref());
                    Ok(None)
                }
                Err(err) => {
                    self.state = SequenceState::Failed;
                    Err(err)
                }
            }
        })
    }

    fn respond(&mut self, response: Response) {
        self.inner.respond(response);
    }

    fn settle(&mut self) -> BoxFuture<'_, Result<(), TriggerError>> {
        Box::pin(async move {
            let result = self.inner.settle().await;
            if result.is_err() {
                self.state = SequenceState::Failed;
            }
            result
        })
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.inner.close().await;
            if !self.state.is_terminal() {
                self.state = SequenceState::Closed;
            }
        })
    }

    fn state(&self) -> SequenceState {
        self.state
    }
}
