// src/exec/mod.rs

//! Task bodies: the unit of work a scheduled task runs each time its trigger
//! fires.
//!
//! - [`backend`] provides the `TaskBody` trait plus `FnBody`, an adapter for
//!   async closures (handy in tests and embedding code).
//! - [`task_runner`] provides `ShellBody`, which runs a shell command per
//!   event, used by the CLI.

pub mod backend;
pub mod task_runner;

pub use backend::{FnBody, TaskBody, body_fn};
pub use task_runner::ShellBody;
