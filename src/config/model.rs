// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::config::parse_duration;
use crate::trigger::{After, Batch, Delay, Every, Recurrent, TaskRef, Trigger, skip_first, take_first};
use crate::types::TaskName;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// run_for = "30s"
/// default_jitter = "100ms"
///
/// [task.poll]
/// cmd = "echo polled"
/// trigger = { kind = "every", period = "5s", jitter = "500ms" }
///
/// [task.digest]
/// cmd = "echo digest"
/// trigger = { kind = "batch", max_size = 10, window = "30s", inner = { kind = "after", task = "poll" } }
/// ```
///
/// Nothing here is checked beyond TOML shape; see [`ConfigFile`] for the
/// validated form.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Global settings from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// All tasks from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigSection {
    /// Request shutdown after this long (e.g. `"30s"`). Runs until Ctrl-C
    /// when unset.
    #[serde(default)]
    pub run_for: Option<String>,

    /// Jitter applied to `every`, `recurrent` and `after` triggers that do
    /// not set their own.
    #[serde(default)]
    pub default_jitter: Option<String>,
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// Shell command run each time the trigger fires.
    pub cmd: String,

    pub trigger: TriggerSpec,
}

/// Trigger description, tagged by `kind`.
///
/// Wrapping kinds (`batch`, `skip_first`, `take_first`) nest another spec
/// under `inner`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerSpec {
    Every {
        period: String,
        #[serde(default)]
        jitter: Option<String>,
        #[serde(default)]
        stop_on_error: bool,
    },
    Recurrent {
        interval: String,
        #[serde(default)]
        jitter: Option<String>,
        #[serde(default)]
        stop_on_error: bool,
    },
    After {
        task: String,
        #[serde(default)]
        jitter: Option<String>,
        #[serde(default)]
        stop_on_error: bool,
    },
    Batch {
        inner: Box<TriggerSpec>,
        max_size: usize,
        window: String,
        #[serde(default)]
        stop_on_error: Option<bool>,
    },
    SkipFirst {
        count: usize,
        inner: Box<TriggerSpec>,
    },
    TakeFirst {
        count: usize,
        inner: Box<TriggerSpec>,
    },
}

impl TriggerSpec {
    /// Every task named by an `after` anywhere in this spec.
    pub fn after_targets(&self) -> Vec<&str> {
        match self {
            TriggerSpec::After { task, .. } => vec![task.as_str()],
            TriggerSpec::Batch { inner, .. }
            | TriggerSpec::SkipFirst { inner, .. }
            | TriggerSpec::TakeFirst { inner, .. } => inner.after_targets(),
            TriggerSpec::Every { .. } | TriggerSpec::Recurrent { .. } => Vec::new(),
        }
    }

    /// Build the trigger this spec describes.
    ///
    /// `default_jitter` is used by leaf triggers that set no `jitter` of
    /// their own. Errors are plain messages; the validator adds the task
    /// name.
    pub fn to_trigger(&self, default_jitter: Option<Duration>) -> Result<Trigger, String> {
        let trigger: Trigger = match self {
            TriggerSpec::Every {
                period,
                jitter,
                stop_on_error,
            } => {
                let period = positive_duration("period", period)?;
                Every::new(period)
                    .with_delay(jitter_delay(jitter.as_deref(), default_jitter)?)
                    .with_stop_on_error(*stop_on_error)
                    .into()
            }
            TriggerSpec::Recurrent {
                interval,
                jitter,
                stop_on_error,
            } => {
                let interval = positive_duration("interval", interval)?;
                Recurrent::new(interval)
                    .with_delay(jitter_delay(jitter.as_deref(), default_jitter)?)
                    .with_stop_on_error(*stop_on_error)
                    .into()
            }
            TriggerSpec::After {
                task,
                jitter,
                stop_on_error,
            } => After::new(TaskRef::Name(task.clone()))
                .with_delay(jitter_delay(jitter.as_deref(), default_jitter)?)
                .with_stop_on_error(*stop_on_error)
                .into(),
            TriggerSpec::Batch {
                inner,
                max_size,
                window,
                stop_on_error,
            } => {
                if *max_size == 0 {
                    return Err("batch max_size must be >= 1 (got 0)".to_string());
                }
                let window = positive_duration("window", window)?;
                let batch = Batch::new(inner.to_trigger(default_jitter)?, *max_size, window);
                match stop_on_error {
                    Some(stop) => batch.with_stop_on_error(*stop).into(),
                    None => batch.into(),
                }
            }
            TriggerSpec::SkipFirst { count, inner } => {
                skip_first(*count, inner.to_trigger(default_jitter)?)
            }
            TriggerSpec::TakeFirst { count, inner } => {
                take_first(*count, inner.to_trigger(default_jitter)?)
            }
        };
        Ok(trigger)
    }
}

fn positive_duration(field: &str, raw: &str) -> Result<Duration, String> {
    let duration = parse_duration(raw).map_err(|e| format!("invalid {field}: {e}"))?;
    if duration.is_zero() {
        return Err(format!("{field} must be greater than zero (got '{raw}')"));
    }
    Ok(duration)
}

fn jitter_delay(jitter: Option<&str>, default_jitter: Option<Duration>) -> Result<Delay, String> {
    let max = match jitter {
        Some(raw) => Some(parse_duration(raw).map_err(|e| format!("invalid jitter: {e}"))?),
        None => default_jitter,
    };
    Ok(max.map(Delay::uniform).unwrap_or_default())
}

/// A task after validation: its command and the trigger built from its spec.
#[derive(Debug, Clone)]
pub struct TaskDefinition {
    pub name: TaskName,
    pub cmd: String,
    pub trigger: Trigger,
}

/// Validated configuration.
///
/// Obtained through `ConfigFile::try_from(RawConfigFile)` (or
/// [`load_and_validate`](crate::config::load_and_validate)), so every trigger
/// has been built and every `after` reference resolved.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    run_for: Option<Duration>,
    tasks: BTreeMap<TaskName, TaskDefinition>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        run_for: Option<Duration>,
        tasks: BTreeMap<TaskName, TaskDefinition>,
    ) -> Self {
        Self { run_for, tasks }
    }

    pub fn run_for(&self) -> Option<Duration> {
        self.run_for
    }

    pub fn task(&self, name: &str) -> Option<&TaskDefinition> {
        self.tasks.get(name)
    }

    /// Tasks in name order.
    pub fn tasks(&self) -> impl Iterator<Item = &TaskDefinition> {
        self.tasks.values()
    }

    pub fn into_tasks(self) -> impl Iterator<Item = TaskDefinition> {
        self.tasks.into_values()
    }
}
