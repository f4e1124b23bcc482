//! Property tests for the failure monitor.
//!
//! Invariants tested:
//! - Every logged record reaches the history
//! - Predicates are evaluated exactly once per `k` logs
//! - Predicates never see a snapshot missing the record that triggered them

use breakwater_circuitbreaker::{FailureMonitor, Monitor, OutcomeRecord};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: evaluations == floor(logs / k)
    #[test]
    fn evaluations_follow_the_interval(
        k in 1usize..=10,
        logs in 0usize..=200,
        capacity in 1usize..=50,
    ) {
        let evaluations = Arc::new(AtomicUsize::new(0));
        let e = Arc::clone(&evaluations);
        let monitor = Monitor::builder()
            .history_capacity(capacity)
            .alarm_when(move |_| {
                e.fetch_add(1, Ordering::SeqCst);
                false
            })
            .evaluate_every(k)
            .build()
            .unwrap();

        for i in 0..logs {
            monitor.log(OutcomeRecord::timed_out(Duration::from_millis(i as u64)));
        }

        prop_assert_eq!(evaluations.load(Ordering::SeqCst), logs / k);
        prop_assert_eq!(monitor.snapshot().len(), logs.min(capacity));
    }

    /// Property: the newest record seen by a predicate is the one just logged
    #[test]
    fn predicates_see_the_latest_record(
        k in 1usize..=5,
        logs in 1usize..=60,
    ) {
        let newest = Arc::new(Mutex::new(Vec::new()));
        let n = Arc::clone(&newest);
        let monitor = Monitor::builder()
            .history_capacity(8)
            .alarm_when(move |records| {
                n.lock().unwrap().push(records[0].elapsed());
                false
            })
            .evaluate_every(k)
            .build()
            .unwrap();

        for i in 1..=logs {
            monitor.log(OutcomeRecord::timed_out(Duration::from_millis(i as u64)));
        }

        let expected: Vec<Duration> = (1..=logs)
            .filter(|i| i % k == 0)
            .map(|i| Duration::from_millis(i as u64))
            .collect();
        prop_assert_eq!(newest.lock().unwrap().clone(), expected);
    }
}
