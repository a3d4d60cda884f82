// tests/types_and_logging.rs

use std::time::Duration;

use anyhow::anyhow;

use cadence::cli::LogLevel;
use cadence::errors::{CadenceError, TriggerError};
use cadence::logging::resolve_level;
use cadence::trigger::Delay;
use cadence::types::{Response, SequenceState, Value};

#[test]
fn values_render_for_task_environments() {
    assert_eq!(Value::Unit.to_string(), "");
    assert_eq!(Value::from(42i64).to_string(), "42");
    assert_eq!(Value::from(Duration::from_secs(2)).to_string(), "2000ms");
    assert_eq!(
        Value::from(vec![Value::from(true), Value::from("x")]).to_string(),
        "[true, x]"
    );
    assert_eq!(Value::from(Duration::from_millis(5)).as_duration(), Some(Duration::from_millis(5)));
    assert_eq!(Value::from("5ms").as_duration(), None);
    assert_eq!(Value::Int(1).kind(), "int");
}

#[test]
fn states_and_responses() {
    assert!(!SequenceState::Created.is_terminal());
    assert!(!SequenceState::Running.is_terminal());
    assert!(SequenceState::Exhausted.is_terminal());
    assert!(SequenceState::Closed.is_terminal());
    assert!(SequenceState::Failed.is_terminal());

    assert!(Response::Failed(anyhow!("x")).is_failure());
    assert!(!Response::Done(None).is_failure());
}

#[test]
fn trigger_errors_classify_and_convert() {
    assert!(TriggerError::UnknownTask("a".into()).is_config_error());
    assert!(TriggerError::InvalidConfig("b".into()).is_config_error());

    let handling = TriggerError::Handling {
        trigger: "every 1s".into(),
        error: anyhow!("boom").context("running task"),
    };
    assert!(!handling.is_config_error());
    assert_eq!(
        handling.to_string(),
        "task failed while handling event from every 1s: running task: boom"
    );

    let wrapped: CadenceError = TriggerError::UnknownTask("ghost".into()).into();
    assert_eq!(
        wrapped.to_string(),
        "unknown task 'ghost' referenced by after trigger"
    );
}

#[test]
fn delays_sample_within_their_bounds() {
    assert_eq!(Delay::none().sample(), Duration::ZERO);
    assert!(Delay::default().is_none());
    assert_eq!(Delay::fixed(Duration::from_millis(7)).sample(), Duration::from_millis(7));
    assert!(Delay::uniform(Duration::ZERO).is_none());

    let uniform = Delay::uniform(Duration::from_millis(20));
    assert_eq!(uniform.to_string(), "uniform 0..=20ms");
    for _ in 0..200 {
        assert!(uniform.sample() <= Duration::from_millis(20));
    }

    let custom = Delay::from_fn(|| Duration::from_secs(1));
    assert!(!custom.is_none());
    assert_eq!(custom.sample(), Duration::from_secs(1));
}

#[test]
fn log_level_prefers_the_cli_flag() {
    assert_eq!(
        resolve_level(Some(LogLevel::Debug), Some("error")),
        tracing::Level::DEBUG
    );
    assert_eq!(resolve_level(None, Some(" Warning ")), tracing::Level::WARN);
    assert_eq!(resolve_level(None, Some("chatty")), tracing::Level::INFO);
    assert_eq!(resolve_level(None, None), tracing::Level::INFO);
}
