// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

/// Errors produced by trigger instantiation and event sequences.
#[derive(Error, Debug)]
pub enum TriggerError {
    /// An `After` trigger references a task the scheduler does not know.
    #[error("unknown task '{0}' referenced by after trigger")]
    UnknownTask(String),

    /// Combinator parameters that can never produce a sensible schedule.
    #[error("invalid trigger configuration: {0}")]
    InvalidConfig(String),

    /// A task body failed and the trigger is configured with `stop_on_error`.
    #[error("task failed while handling event from {trigger}: {error:#}")]
    Handling {
        trigger: String,
        error: anyhow::Error,
    },
}

impl TriggerError {
    /// True for errors raised at instantiation time.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            TriggerError::UnknownTask(_) | TriggerError::InvalidConfig(_)
        )
    }
}

#[derive(Error, Debug)]
pub enum CadenceError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Cycle detected in after-dependencies: {0}")]
    DependencyCycle(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Trigger(#[from] TriggerError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, CadenceError>;
