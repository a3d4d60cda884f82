// tests/shell_body.rs

use std::time::Duration;

use cadence::exec::{ShellBody, TaskBody};
use cadence::exec::task_runner::value_from_stdout;
use cadence::types::{Event, Value};
use cadence_test_utils::{init_tracing, with_timeout};

fn lines(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}

#[test]
fn stdout_is_turned_into_a_value() {
    assert_eq!(value_from_stdout(&[]), Value::Unit);
    assert_eq!(value_from_stdout(&lines(&["", "  "])), Value::Unit);
    assert_eq!(
        value_from_stdout(&lines(&["working...", "1500ms", ""])),
        Value::Duration(Duration::from_millis(1500))
    );
    assert_eq!(
        value_from_stdout(&lines(&["  next: 3s  "])),
        Value::Text("next: 3s".to_string())
    );
    assert_eq!(
        value_from_stdout(&lines(&["line one", "line two"])),
        Value::Text("line one\nline two".to_string())
    );
}

#[cfg(unix)]
#[tokio::test]
async fn shell_body_captures_stdout() {
    init_tracing();
    let body = ShellBody::new("echo hello; echo oops >&2");

    let value = with_timeout(body.run("greeter", Event::new(1, Value::Unit)))
        .await
        .unwrap();

    assert_eq!(value, Value::Text("hello".to_string()));
}

#[cfg(unix)]
#[tokio::test]
async fn shell_body_can_return_an_interval() {
    let body = ShellBody::new("echo 2s");

    let value = with_timeout(body.run("adaptive", Event::new(1, Value::Unit)))
        .await
        .unwrap();

    assert_eq!(value, Value::Duration(Duration::from_secs(2)));
}

#[cfg(unix)]
#[tokio::test]
async fn shell_body_exposes_the_event_in_its_environment() {
    let body = ShellBody::new(r#"printf '%s|%s|%s' "$CADENCE_TASK" "$CADENCE_EVENT_SEQ" "$CADENCE_EVENT""#);

    let event = Event::new(7, Value::List(vec![Value::Int(1), Value::from("two")]));
    let value = with_timeout(body.run("job", event)).await.unwrap();

    assert_eq!(value, Value::Text("job|7|[1, two]".to_string()));
}

#[cfg(unix)]
#[tokio::test]
async fn non_zero_exit_is_a_failure() {
    let body = ShellBody::new("echo partial; exit 3");

    let err = with_timeout(body.run("failing", Event::new(1, Value::Unit)))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("status 3"), "error was {err:#}");
}
