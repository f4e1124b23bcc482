use super::fault;
use breakwater_circuitbreaker::{Alarm, FailureMonitor, Monitor};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

#[test]
fn every_listener_receives_each_alarm() {
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));
    let monitor = Monitor::builder().alarm_when(|_| true).build().unwrap();

    let f = Arc::clone(&first);
    monitor.on_alarm(move |_| {
        f.fetch_add(1, Ordering::SeqCst);
    });
    let s = Arc::clone(&second);
    monitor.listen(Arc::new(move |alarm: &Alarm| {
        assert_eq!(*alarm, Alarm);
        s.fetch_add(1, Ordering::SeqCst);
    }));

    monitor.log(fault(1));
    monitor.log(fault(1));

    assert_eq!(first.load(Ordering::SeqCst), 2);
    assert_eq!(second.load(Ordering::SeqCst), 2);
}

#[test]
fn listeners_run_on_the_logging_thread() {
    let threads = Arc::new(Mutex::new(Vec::new()));
    let t = Arc::clone(&threads);
    let monitor = Arc::new(Monitor::builder().alarm_when(|_| true).build().unwrap());
    monitor.on_alarm(move |_| t.lock().unwrap().push(thread::current().id()));

    let logger = {
        let monitor = Arc::clone(&monitor);
        thread::spawn(move || {
            monitor.log(fault(1));
            thread::current().id()
        })
    };
    let logger_id = logger.join().unwrap();

    assert_eq!(*threads.lock().unwrap(), vec![logger_id]);
}

#[test]
fn panicking_listener_does_not_stop_the_others() {
    let reached = Arc::new(AtomicUsize::new(0));
    let r = Arc::clone(&reached);
    let monitor = Monitor::builder().alarm_when(|_| true).build().unwrap();
    monitor.on_alarm(|_| panic!("listener bug"));
    monitor.on_alarm(move |_| {
        r.fetch_add(1, Ordering::SeqCst);
    });

    monitor.log(fault(1));

    assert_eq!(reached.load(Ordering::SeqCst), 1);
}

#[test]
fn no_predicates_means_no_alarms() {
    let alarms = Arc::new(AtomicUsize::new(0));
    let a = Arc::clone(&alarms);
    let monitor = Monitor::builder().build().unwrap();
    monitor.on_alarm(move |_| {
        a.fetch_add(1, Ordering::SeqCst);
    });

    for _ in 0..500 {
        monitor.log(fault(1));
    }

    assert_eq!(alarms.load(Ordering::SeqCst), 0);
    assert_eq!(monitor.snapshot().len(), 100);
}
