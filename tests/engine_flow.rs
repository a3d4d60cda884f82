// tests/engine_flow.rs

use cadence::engine::{ExecutionFlow, Lifetime};
use cadence::types::Value;
use cadence_test_utils::with_timeout;

#[tokio::test]
async fn publish_reaches_every_subscriber_in_order() {
    let flow = ExecutionFlow::new("a");
    let mut first = flow.subscribe();
    let mut second = flow.subscribe();
    assert_eq!(flow.subscriber_count(), 2);

    assert_eq!(flow.publish(Value::Int(1)), 2);
    assert_eq!(flow.publish(Value::Int(2)), 2);
    flow.close();

    for sub in [&mut first, &mut second] {
        assert_eq!(sub.recv().await, Some(Value::Int(1)));
        assert_eq!(sub.recv().await, Some(Value::Int(2)));
        assert_eq!(sub.recv().await, None);
    }
    assert_eq!(first.task(), "a");
}

#[tokio::test]
async fn closed_flows_reject_publishes_and_end_new_subscribers() {
    let flow = ExecutionFlow::new("a");
    flow.close();
    flow.close();

    assert!(flow.is_closed());
    assert_eq!(flow.publish(Value::Unit), 0);

    let mut late = flow.subscribe();
    assert_eq!(with_timeout(late.recv()).await, None);
    assert_eq!(flow.subscriber_count(), 0);
}

#[tokio::test]
async fn subscriptions_deregister_on_close_and_drop() {
    let flow = ExecutionFlow::new("a");
    let mut closed = flow.subscribe();
    let dropped = flow.subscribe();
    let kept = flow.subscribe();
    assert_eq!(flow.subscriber_count(), 3);

    closed.close();
    closed.close();
    assert!(closed.is_closed());
    assert_eq!(closed.recv().await, None);
    drop(dropped);

    assert_eq!(flow.subscriber_count(), 1);
    assert_eq!(flow.publish(Value::Bool(true)), 1);
    drop(kept);
    assert_eq!(flow.subscriber_count(), 0);
}

#[tokio::test]
async fn lifetime_registry_and_shutdown() {
    let lifetime = Lifetime::new();
    let a = lifetime.register_flow("a");
    let again = lifetime.register_flow("a");
    lifetime.register_flow("b");

    // Same flow: a subscriber on one handle is visible through the other.
    let _sub = a.subscribe();
    assert_eq!(again.subscriber_count(), 1);
    assert_eq!(lifetime.task_names(), vec!["a".to_string(), "b".to_string()]);
    assert!(lifetime.lookup_execution_flow("c").is_none());

    let signal = lifetime.shutdown_signal();
    assert!(!signal.is_requested());
    assert!(!lifetime.is_shutting_down());

    lifetime.shutdown();
    lifetime.shutdown();

    assert!(lifetime.is_shutting_down());
    assert!(signal.is_requested());
    with_timeout(signal.cancelled()).await;
    with_timeout(lifetime.shutdown_signal().cancelled()).await;
}
