// src/exec/backend.rs

//! Pluggable task body abstraction.
//!
//! The scheduler talks to a `TaskBody` instead of spawning processes itself.
//! This makes it easy to swap in in-process closures (tests, embedding)
//! while the CLI uses [`ShellBody`](crate::exec::ShellBody).

use std::fmt;
use std::future::Future;

use crate::trigger::BoxFuture;
use crate::types::{Event, Value};

/// Work run by a scheduled task each time its trigger fires.
///
/// A successful result is published on the task's execution flow and handed
/// back to the trigger; an error is handed back as a failed response and
/// dealt with by the trigger's `stop_on_error` policy.
pub trait TaskBody: Send + Sync {
    fn run<'a>(&'a self, task: &'a str, event: Event) -> BoxFuture<'a, anyhow::Result<Value>>;
}

/// Adapter turning an async closure into a [`TaskBody`].
pub struct FnBody<F> {
    f: F,
}

impl<F> fmt::Debug for FnBody<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnBody").finish_non_exhaustive()
    }
}

/// Wrap `f` as a task body. The closure receives the firing event.
pub fn body_fn<F, Fut>(f: F) -> FnBody<F>
where
    F: Fn(Event) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    FnBody { f }
}

impl<F, Fut> TaskBody for FnBody<F>
where
    F: Fn(Event) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    fn run<'a>(&'a self, _task: &'a str, event: Event) -> BoxFuture<'a, anyhow::Result<Value>> {
        Box::pin((self.f)(event))
    }
}
