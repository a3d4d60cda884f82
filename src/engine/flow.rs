// src/engine/flow.rs

//! Per-task broadcast channel of completed results.
//!
//! An [`ExecutionFlow`] keeps an explicit list of subscriber channels. Every
//! published value is pushed to each live subscriber, so all subscribers see
//! the same ordered sequence of results from the moment they subscribed.
//! Each subscriber owns an unbounded queue; a slow subscriber never causes
//! another one to miss a value.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::types::{TaskName, Value};

#[derive(Debug, Default)]
struct FlowState {
    next_id: u64,
    subscribers: Vec<(u64, mpsc::UnboundedSender<Value>)>,
    closed: bool,
}

#[derive(Debug)]
struct FlowInner {
    task: TaskName,
    state: Mutex<FlowState>,
}

impl FlowInner {
    fn lock(&self) -> MutexGuard<'_, FlowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn unsubscribe(&self, id: u64) {
        let mut state = self.lock();
        let before = state.subscribers.len();
        state.subscribers.retain(|(sid, _)| *sid != id);
        if state.subscribers.len() != before {
            debug!(task = %self.task, subscriber = id, "unsubscribed from execution flow");
        }
    }
}

/// Broadcast channel of a single task's completed results.
///
/// Cloning an `ExecutionFlow` yields another handle to the same channel.
#[derive(Clone)]
pub struct ExecutionFlow {
    inner: Arc<FlowInner>,
}

impl fmt::Debug for ExecutionFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("ExecutionFlow")
            .field("task", &self.inner.task)
            .field("subscribers", &state.subscribers.len())
            .field("closed", &state.closed)
            .finish()
    }
}

impl ExecutionFlow {
    pub fn new(task: impl Into<TaskName>) -> Self {
        Self {
            inner: Arc::new(FlowInner {
                task: task.into(),
                state: Mutex::new(FlowState::default()),
            }),
        }
    }

    /// Name of the task that owns this flow.
    pub fn task(&self) -> &str {
        &self.inner.task
    }

    /// Publish a result to every current subscriber.
    ///
    /// Returns the number of subscribers the value was delivered to.
    /// Publishing on a closed flow is dropped with a warning.
    pub fn publish(&self, value: Value) -> usize {
        let mut state = self.inner.lock();
        if state.closed {
            warn!(task = %self.inner.task, "publish on closed execution flow ignored");
            return 0;
        }

        // Receivers dropped without unsubscribing are pruned here.
        state
            .subscribers
            .retain(|(_, tx)| tx.send(value.clone()).is_ok());

        let delivered = state.subscribers.len();
        trace!(task = %self.inner.task, delivered, "published result");
        delivered
    }

    /// Attach a new subscriber.
    ///
    /// Subscribing to a closed flow yields a subscription that ends
    /// immediately.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.inner.lock();
        let id = state.next_id;
        state.next_id += 1;

        if state.closed {
            debug!(task = %self.inner.task, "subscribed to closed execution flow");
            drop(tx);
        } else {
            state.subscribers.push((id, tx));
            debug!(task = %self.inner.task, subscriber = id, "subscribed to execution flow");
        }

        Subscription {
            id,
            task: self.inner.task.clone(),
            rx: Some(rx),
            flow: Arc::downgrade(&self.inner),
        }
    }

    /// Close the flow: no further publishes are accepted and every
    /// subscriber ends once it has drained the values already queued for it.
    pub fn close(&self) {
        let mut state = self.inner.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        let dropped = state.subscribers.len();
        state.subscribers.clear();
        debug!(task = %self.inner.task, subscribers = dropped, "execution flow closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}

/// A scoped subscription to an [`ExecutionFlow`].
///
/// Dropping or closing the subscription removes it from the flow.
pub struct Subscription {
    id: u64,
    task: TaskName,
    rx: Option<mpsc::UnboundedReceiver<Value>>,
    flow: Weak<FlowInner>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("task", &self.task)
            .field("open", &self.rx.is_some())
            .finish()
    }
}

impl Subscription {
    /// Name of the upstream task.
    pub fn task(&self) -> &str {
        &self.task
    }

    /// Wait for the next published value.
    ///
    /// Returns `None` once the flow is closed and every queued value has been
    /// received, or after [`Subscription::close`]. Cancel-safe.
    pub async fn recv(&mut self) -> Option<Value> {
        match self.rx.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }

    /// Deregister from the flow. Idempotent.
    pub fn close(&mut self) {
        if self.rx.take().is_none() {
            return;
        }
        if let Some(flow) = self.flow.upgrade() {
            flow.unsubscribe(self.id);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.rx.is_none()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}
