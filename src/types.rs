// src/types.rs

//! Payload types that flow between triggers, task bodies and execution flows.

use std::fmt;
use std::time::Duration;

/// Canonical task name type used throughout the crate.
pub type TaskName = String;

/// Dynamically typed value carried by events and produced by task bodies.
///
/// - `Every` / `Recurrent` events carry `Unit`.
/// - `After` events carry whatever the upstream task returned.
/// - `Batch` events carry a `List` of the collected inner event values.
/// - A task body may return `Duration` to override the next interval of a
///   `Recurrent` trigger.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Unit,
    Bool(bool),
    Int(i64),
    Text(String),
    Duration(Duration),
    List(Vec<Value>),
}

impl Value {
    /// Returns the duration if this value is a `Duration`.
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Value::Duration(d) => Some(*d),
            _ => None,
        }
    }

    /// Returns the items if this value is a `List`.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Short type name, used in log messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Text(_) => "text",
            Value::Duration(_) => "duration",
            Value::List(_) => "list",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Text(s) => f.write_str(s),
            Value::Duration(d) => write!(f, "{}ms", d.as_millis()),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Duration> for Value {
    fn from(v: Duration) -> Self {
        Value::Duration(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

/// One "fire now" signal produced by a trigger instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// 1-based index of this event within the sequence that produced it.
    pub seq: u64,
    pub value: Value,
}

impl Event {
    pub fn new(seq: u64, value: Value) -> Self {
        Self { seq, value }
    }
}

/// Consumer feedback for the most recent event of a sequence.
#[derive(Debug)]
pub enum Response {
    /// The task body handled the event, optionally producing a value
    /// (e.g. a `Duration` override for `Recurrent`).
    Done(Option<Value>),
    /// The task body failed while handling the event.
    Failed(anyhow::Error),
}

impl Response {
    pub fn is_failure(&self) -> bool {
        matches!(self, Response::Failed(_))
    }
}

/// Lifecycle of a trigger instance.
///
/// `Created -> Running -> {Exhausted | Closed | Failed}`; only `Running`
/// produces events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceState {
    Created,
    Running,
    /// The underlying source ended (e.g. the upstream task stopped).
    Exhausted,
    /// Closed explicitly or by scheduler shutdown.
    Closed,
    /// A handling error was propagated because `stop_on_error` is set.
    Failed,
}

impl SequenceState {
    /// True for `Exhausted`, `Closed` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SequenceState::Exhausted | SequenceState::Closed | SequenceState::Failed
        )
    }
}
