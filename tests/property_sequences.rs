// tests/property_sequences.rs

use std::time::Duration;

use proptest::prelude::*;
use tokio::time::sleep;

use cadence::engine::Lifetime;
use cadence::trigger::{Trigger, skip_first, take_first};
use cadence::types::Value;
use cadence_test_utils::sequences::{Drained, drain, instantiate};

/// Publish `gaps.len()` values on a fresh upstream flow (value `i` after
/// sleeping `gaps[i]` ms), close it, and drain `build(after upstream)`.
fn run_against_upstream(gaps: Vec<u64>, build: impl FnOnce(Trigger) -> Trigger) -> Drained {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .unwrap();

    rt.block_on(async move {
        let lifetime = Lifetime::new();
        let flow = lifetime.register_flow("upstream");
        let mut seq = instantiate(&build(Trigger::after("upstream")), &lifetime);

        tokio::spawn(async move {
            for (i, gap) in gaps.into_iter().enumerate() {
                sleep(Duration::from_millis(gap)).await;
                flow.publish(Value::Int(i as i64));
            }
            flow.close();
        });

        drain(seq.as_mut(), usize::MAX).await
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn batches_concatenate_to_the_inner_sequence(
        gaps in proptest::collection::vec(0u64..40, 0..30),
        max_size in 1usize..6,
        window_ms in 1u64..60,
    ) {
        let count = gaps.len();
        let drained = run_against_upstream(gaps, |inner| {
            Trigger::batch(inner, max_size, Duration::from_millis(window_ms))
        });

        prop_assert!(drained.ended);
        prop_assert!(drained.error.is_none());

        let mut flattened = Vec::new();
        for value in drained.values() {
            let items = value.as_list().expect("batch events carry lists");
            prop_assert!(!items.is_empty());
            prop_assert!(items.len() <= max_size);
            flattened.extend(items.iter().cloned());
        }

        let expected: Vec<Value> = (0..count as i64).map(Value::Int).collect();
        prop_assert_eq!(flattened, expected);
    }

    #[test]
    fn skip_then_take_counts(
        published in 0usize..20,
        skip in 0usize..8,
        take in 0usize..8,
    ) {
        let drained = run_against_upstream(vec![1; published], |inner| {
            take_first(take, skip_first(skip, inner))
        });

        prop_assert!(drained.ended);
        prop_assert_eq!(drained.len(), take.min(published.saturating_sub(skip)));

        let expected: Vec<Value> = (skip..published)
            .take(take)
            .map(|i| Value::Int(i as i64))
            .collect();
        prop_assert_eq!(drained.values(), expected);
    }
}
