// src/engine/mod.rs

//! Scheduler-side collaborators of the trigger layer.
//!
//! - [`lifetime`] holds the shutdown signal and the execution flow registry
//!   that triggers resolve `after` references against.
//! - [`flow`] is the per-task broadcast channel of completed results.
//! - [`runtime`] is the driver: one tokio task per scheduled job, pulling
//!   events from its trigger instance, running the task body and feeding
//!   the outcome back.

pub mod flow;
pub mod lifetime;
pub mod runtime;

pub use flow::{ExecutionFlow, Subscription};
pub use lifetime::{Lifetime, Shutdown};
pub use runtime::{RunSummary, Scheduler, TaskExit, TaskReport};
