//! Helpers for pulling events out of a trigger instance in tests.

use std::time::Duration;

use tokio::time::Instant;

use cadence::engine::Lifetime;
use cadence::errors::TriggerError;
use cadence::trigger::{EventSequence, Trigger};
use cadence::types::{Event, Response, Value};

/// One event and when it arrived, relative to the start of the drain.
#[derive(Debug, Clone)]
pub struct Observed {
    pub at: Duration,
    pub event: Event,
}

/// Everything a drain saw.
#[derive(Debug)]
pub struct Drained {
    pub events: Vec<Observed>,
    /// Set when `next()` returned an error; the drain stops there.
    pub error: Option<TriggerError>,
    /// True when the sequence signalled end-of-sequence.
    pub ended: bool,
}

impl Drained {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn values(&self) -> Vec<Value> {
        self.events.iter().map(|o| o.event.value.clone()).collect()
    }

    pub fn seqs(&self) -> Vec<u64> {
        self.events.iter().map(|o| o.event.seq).collect()
    }

    /// Arrival times in whole milliseconds.
    pub fn times_ms(&self) -> Vec<u128> {
        self.events.iter().map(|o| o.at.as_millis()).collect()
    }

    /// Sizes of `Value::List` payloads (batches); other values count as 0.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.events
            .iter()
            .map(|o| o.event.value.as_list().map_or(0, |items| items.len()))
            .collect()
    }
}

/// Instantiate `trigger`, panicking on configuration errors.
pub fn instantiate(trigger: &Trigger, lifetime: &Lifetime) -> Box<dyn EventSequence> {
    trigger
        .instantiate(lifetime)
        .expect("trigger should instantiate")
}

/// Pull up to `max` events, answering each with `Done(None)`.
pub async fn drain(seq: &mut dyn EventSequence, max: usize) -> Drained {
    drain_with(seq, max, |_| Response::Done(None)).await
}

/// Pull up to `max` events, answering each with `respond(event)`.
pub async fn drain_with<F>(seq: &mut dyn EventSequence, max: usize, mut respond: F) -> Drained
where
    F: FnMut(&Event) -> Response,
{
    let start = Instant::now();
    let mut events = Vec::new();

    while events.len() < max {
        match seq.next().await {
            Ok(Some(event)) => {
                let response = respond(&event);
                events.push(Observed {
                    at: start.elapsed(),
                    event,
                });
                seq.respond(response);
            }
            Ok(None) => {
                return Drained {
                    events,
                    error: None,
                    ended: true,
                };
            }
            Err(err) => {
                return Drained {
                    events,
                    error: Some(err),
                    ended: false,
                };
            }
        }
    }

    Drained {
        events,
        error: None,
        ended: false,
    }
}
