// tests/every_recurrent.rs

use std::time::Duration;

use anyhow::anyhow;
use tokio::time::{Instant, sleep};

use cadence::engine::Lifetime;
use cadence::errors::TriggerError;
use cadence::trigger::{Delay, Every, Recurrent, Trigger};
use cadence::types::{Response, SequenceState, Value};
use cadence_test_utils::logs::capture_warnings;
use cadence_test_utils::sequences::{drain, drain_with, instantiate};
use cadence_test_utils::{init_tracing, with_timeout};

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[tokio::test(start_paused = true)]
async fn every_fires_immediately_then_once_per_period() {
    init_tracing();
    let lifetime = Lifetime::new();
    let mut seq = instantiate(&Trigger::every(ms(100)), &lifetime);

    let drained = with_timeout(drain(seq.as_mut(), 3)).await;

    assert_eq!(drained.times_ms(), vec![0, 100, 200]);
    assert_eq!(drained.seqs(), vec![1, 2, 3]);
    assert!(drained.values().iter().all(|v| *v == Value::Unit));
    assert_eq!(seq.state(), SequenceState::Running);
}

#[tokio::test(start_paused = true)]
async fn every_jitter_is_added_to_the_period() {
    init_tracing();
    let lifetime = Lifetime::new();
    // Jitter larger than the period: a max(period, jitter) rule would give
    // 80ms gaps.
    let trigger: Trigger = Every::new(ms(50)).with_delay(Delay::fixed(ms(80))).into();
    let mut seq = instantiate(&trigger, &lifetime);

    let drained = with_timeout(drain(seq.as_mut(), 4)).await;

    assert_eq!(drained.times_ms(), vec![0, 130, 180, 230]);
}

#[tokio::test(start_paused = true)]
async fn every_does_not_drift_with_handling_time() {
    init_tracing();
    let lifetime = Lifetime::new();
    let mut seq = instantiate(&Trigger::every(ms(100)), &lifetime);
    let start = Instant::now();

    let mut fired_at = Vec::new();
    for _ in 0..5 {
        let event = seq.next().await.unwrap().expect("event");
        fired_at.push(start.elapsed().as_millis());
        // Simulated task body.
        sleep(ms(40)).await;
        seq.respond(Response::Done(None));
        assert!(event.seq >= 1);
    }

    assert_eq!(fired_at, vec![0, 100, 200, 300, 400]);
}

#[tokio::test(start_paused = true)]
async fn every_fires_immediately_when_deadline_already_passed() {
    init_tracing();
    let lifetime = Lifetime::new();
    let mut seq = instantiate(&Trigger::every(ms(100)), &lifetime);
    let start = Instant::now();

    seq.next().await.unwrap().expect("first event");
    sleep(ms(250)).await;
    seq.respond(Response::Done(None));

    seq.next().await.unwrap().expect("second event");
    assert_eq!(start.elapsed().as_millis(), 250);

    // The schedule stays anchored: the third deadline (200ms) has passed too.
    seq.respond(Response::Done(None));
    seq.next().await.unwrap().expect("third event");
    assert_eq!(start.elapsed().as_millis(), 250);

    seq.respond(Response::Done(None));
    seq.next().await.unwrap().expect("fourth event");
    assert_eq!(start.elapsed().as_millis(), 300);
}

#[tokio::test(start_paused = true)]
async fn every_recovers_from_failures_by_default() {
    init_tracing();
    let lifetime = Lifetime::new();
    let mut seq = instantiate(&Trigger::every(ms(10)), &lifetime);

    let drained = with_timeout(drain_with(seq.as_mut(), 4, |event| {
        if event.seq == 2 {
            Response::Failed(anyhow!("boom"))
        } else {
            Response::Done(None)
        }
    }))
    .await;

    assert!(drained.error.is_none());
    assert_eq!(drained.seqs(), vec![1, 2, 3, 4]);
    assert_eq!(drained.times_ms(), vec![0, 10, 20, 30]);
}

#[tokio::test(start_paused = true)]
async fn every_with_stop_on_error_propagates_and_fails() {
    init_tracing();
    let lifetime = Lifetime::new();
    let trigger: Trigger = Every::new(ms(10)).with_stop_on_error(true).into();
    let mut seq = instantiate(&trigger, &lifetime);

    let drained = with_timeout(drain_with(seq.as_mut(), 10, |event| {
        if event.seq == 2 {
            Response::Failed(anyhow!("disk full"))
        } else {
            Response::Done(None)
        }
    }))
    .await;

    assert_eq!(drained.len(), 2);
    match drained.error {
        Some(TriggerError::Handling { trigger, error }) => {
            assert!(trigger.starts_with("every"), "label was {trigger}");
            assert_eq!(error.to_string(), "disk full");
        }
        other => panic!("expected handling error, got {other:?}"),
    }
    assert_eq!(seq.state(), SequenceState::Failed);
    assert!(seq.next().await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn zero_period_or_interval_is_rejected_at_instantiation() {
    let lifetime = Lifetime::new();

    assert!(matches!(
        Trigger::every(Duration::ZERO).instantiate(&lifetime),
        Err(TriggerError::InvalidConfig(_))
    ));
    assert!(matches!(
        Trigger::recurrent(Duration::ZERO).instantiate(&lifetime),
        Err(TriggerError::InvalidConfig(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn every_instances_are_independent() {
    let lifetime = Lifetime::new();
    let trigger = Trigger::every(ms(100));
    let mut first = instantiate(&trigger, &lifetime);

    let drained = drain(first.as_mut(), 2).await;
    assert_eq!(drained.times_ms(), vec![0, 100]);

    // A second instance anchors on its own first call.
    let mut second = instantiate(&trigger, &lifetime);
    let drained = drain(second.as_mut(), 2).await;
    assert_eq!(drained.seqs(), vec![1, 2]);
    assert_eq!(drained.times_ms(), vec![0, 100]);
}

#[tokio::test(start_paused = true)]
async fn recurrent_uses_duration_overrides_and_falls_back_otherwise() {
    init_tracing();
    let lifetime = Lifetime::new();
    let mut seq = instantiate(&Trigger::recurrent(ms(100)), &lifetime);

    let drained = with_timeout(drain_with(seq.as_mut(), 5, |event| match event.seq {
        1 => Response::Done(Some(Value::Duration(ms(30)))),
        2 => Response::Done(Some(Value::Text("soon".into()))),
        3 => Response::Done(Some(Value::Duration(ms(500)))),
        4 => Response::Failed(anyhow!("flaky")),
        _ => Response::Done(None),
    }))
    .await;

    // 0, +30 (override), +100 (wrong type), +500 (override), +100 (failure)
    assert_eq!(drained.times_ms(), vec![0, 30, 130, 630, 730]);
}

#[tokio::test(start_paused = true)]
async fn recurrent_without_override_uses_default_interval() {
    let lifetime = Lifetime::new();
    let trigger: Trigger = Recurrent::new(ms(250)).into();
    let mut seq = instantiate(&trigger, &lifetime);

    let drained = drain(seq.as_mut(), 3).await;
    assert_eq!(drained.times_ms(), vec![0, 250, 500]);
}

#[tokio::test(start_paused = true)]
async fn recurrent_with_stop_on_error_fails() {
    let lifetime = Lifetime::new();
    let trigger: Trigger = Recurrent::new(ms(50)).with_stop_on_error(true).into();
    let mut seq = instantiate(&trigger, &lifetime);

    let drained = drain_with(seq.as_mut(), 3, |_| Response::Failed(anyhow!("nope"))).await;

    assert_eq!(drained.len(), 1);
    assert!(matches!(drained.error, Some(TriggerError::Handling { .. })));
    assert_eq!(seq.state(), SequenceState::Failed);
}

#[tokio::test(start_paused = true)]
async fn shutdown_interrupts_a_waiting_sequence() {
    init_tracing();
    let lifetime = Lifetime::new();
    let mut seq = instantiate(&Trigger::every(Duration::from_secs(10)), &lifetime);
    let start = Instant::now();

    seq.next().await.unwrap().expect("first event");
    seq.respond(Response::Done(None));

    let stopper = lifetime.clone();
    tokio::spawn(async move {
        sleep(ms(500)).await;
        stopper.shutdown();
    });

    assert!(with_timeout(seq.next()).await.unwrap().is_none());
    assert_eq!(start.elapsed().as_millis(), 500);
    assert_eq!(seq.state(), SequenceState::Closed);

    // Stays ended.
    assert!(seq.next().await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn dropped_next_future_resumes_the_same_deadline() {
    let lifetime = Lifetime::new();
    let mut seq = instantiate(&Trigger::every(ms(100)), &lifetime);
    let start = Instant::now();

    seq.next().await.unwrap().expect("first event");
    seq.respond(Response::Done(None));

    // Give up on the wait half way through.
    let timed_out = tokio::time::timeout(ms(60), seq.next()).await;
    assert!(timed_out.is_err());

    let event = seq.next().await.unwrap().expect("second event");
    assert_eq!(event.seq, 2);
    assert_eq!(start.elapsed().as_millis(), 100);
}

#[tokio::test(start_paused = true)]
async fn close_is_idempotent_and_ends_the_sequence() {
    let lifetime = Lifetime::new();
    let mut seq = instantiate(&Trigger::every(ms(10)), &lifetime);
    assert_eq!(seq.state(), SequenceState::Created);

    seq.close().await;
    seq.close().await;

    assert_eq!(seq.state(), SequenceState::Closed);
    assert!(seq.next().await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn huge_interval_override_waits_instead_of_overflowing() {
    let lifetime = Lifetime::new();
    let mut seq = instantiate(&Trigger::recurrent(ms(100)), &lifetime);

    assert!(seq.next().await.unwrap().is_some());
    seq.respond(Response::Done(Some(Value::Duration(Duration::from_secs(
        u64::MAX,
    )))));

    let waited = tokio::time::timeout(Duration::from_secs(3600), seq.next()).await;
    assert!(waited.is_err(), "the next event belongs in the far future");
    assert_eq!(seq.state(), SequenceState::Running);

    seq.close().await;
    assert_eq!(seq.state(), SequenceState::Closed);
}

#[tokio::test(start_paused = true)]
async fn huge_jitter_waits_instead_of_overflowing() {
    let lifetime = Lifetime::new();
    let trigger: Trigger = Every::new(ms(100))
        .with_delay(Delay::fixed(Duration::MAX))
        .into();
    let mut seq = instantiate(&trigger, &lifetime);

    assert!(seq.next().await.unwrap().is_some());
    seq.respond(Response::Done(None));

    let waited = tokio::time::timeout(Duration::from_secs(3600), seq.next()).await;
    assert!(waited.is_err());
    seq.close().await;
}

#[tokio::test(start_paused = true)]
async fn zero_interval_override_falls_back_to_default() {
    let (warnings, _guard) = capture_warnings();
    let lifetime = Lifetime::new();
    let mut seq = instantiate(&Trigger::recurrent(ms(100)), &lifetime);

    let drained = with_timeout(drain_with(seq.as_mut(), 3, |_| {
        Response::Done(Some(Value::Duration(Duration::ZERO)))
    }))
    .await;

    assert_eq!(drained.times_ms(), vec![0, 100, 200]);
    assert!(warnings.count() >= 2, "saw {} warnings", warnings.count());
}
