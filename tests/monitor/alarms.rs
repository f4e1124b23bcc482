use super::{fault, timeout};
use breakwater_circuitbreaker::{alarms, FailureKind, FailureMonitor, Monitor};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn counting(monitor: &Monitor) -> Arc<AtomicUsize> {
    let alarms = Arc::new(AtomicUsize::new(0));
    let a = Arc::clone(&alarms);
    monitor.on_alarm(move |_| {
        a.fetch_add(1, Ordering::SeqCst);
    });
    alarms
}

#[test]
fn failure_count_is_bounded_by_history() {
    let monitor = Monitor::builder()
        .history_capacity(3)
        .alarm_predicates([alarms::failures_at_least(4)])
        .build()
        .unwrap();
    let raised = counting(&monitor);

    for _ in 0..10 {
        monitor.log(fault(1));
    }

    // The history never holds four records, so the alarm can never fire.
    assert_eq!(raised.load(Ordering::SeqCst), 0);
}

#[test]
fn timeouts_trip_kind_alarm() {
    let monitor = Monitor::builder()
        .alarm_predicates([alarms::kind_at_least(FailureKind::TimedOut, 2)])
        .build()
        .unwrap();
    let raised = counting(&monitor);

    monitor.log(fault(1));
    monitor.log(timeout(1));
    monitor.log(fault(1));
    assert_eq!(raised.load(Ordering::SeqCst), 0);

    monitor.log(timeout(1));
    assert_eq!(raised.load(Ordering::SeqCst), 1);
}

#[test]
fn slow_failures_trip_latency_alarm() {
    let monitor = Monitor::builder()
        .alarm_predicates([alarms::slow_at_least(Duration::from_millis(500), 1)])
        .build()
        .unwrap();
    let raised = counting(&monitor);

    monitor.log(fault(499));
    assert_eq!(raised.load(Ordering::SeqCst), 0);

    monitor.log(timeout(500));
    assert_eq!(raised.load(Ordering::SeqCst), 1);
}
