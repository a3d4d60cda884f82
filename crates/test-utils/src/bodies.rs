//! Task bodies for scheduler tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use cadence::exec::TaskBody;
use cadence::trigger::BoxFuture;
use cadence::types::{Event, Value};

type Answer = dyn Fn(&Event) -> anyhow::Result<Value> + Send + Sync;

/// A body that records every event it is run for and answers through a
/// closure. Clones share the record, so keep one to assert on after handing
/// the other to the scheduler.
#[derive(Clone)]
pub struct RecordingBody {
    seen: Arc<Mutex<Vec<Event>>>,
    answer: Arc<Answer>,
    latency: Option<Duration>,
}

impl RecordingBody {
    /// Answers every event with `Value::Unit`.
    pub fn new() -> Self {
        Self::answering(|_| Ok(Value::Unit))
    }

    pub fn answering<F>(answer: F) -> Self
    where
        F: Fn(&Event) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self {
            seen: Arc::new(Mutex::new(Vec::new())),
            answer: Arc::new(answer),
            latency: None,
        }
    }

    /// Sleep this long before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn seen(&self) -> Vec<Event> {
        self.seen.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

impl Default for RecordingBody {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskBody for RecordingBody {
    fn run<'a>(&'a self, _task: &'a str, event: Event) -> BoxFuture<'a, anyhow::Result<Value>> {
        Box::pin(async move {
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
            let result = (self.answer)(&event);
            self.seen.lock().unwrap().push(event);
            result
        })
    }
}
