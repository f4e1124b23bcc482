use breakwater_history::BoundedHistory;

#[test]
fn partially_filled_history_returns_only_written_records() {
    let history = BoundedHistory::new(8);
    for i in 0..3 {
        history.put(i);
    }

    assert_eq!(history.snapshot(), vec![2, 1, 0]);
    assert_eq!(history.len(), 3);
    assert_eq!(history.capacity(), 8);
}

#[test]
fn oldest_records_are_evicted_first() {
    let history = BoundedHistory::new(3);
    for i in 1..=7 {
        history.put(i);
    }

    assert_eq!(history.snapshot(), vec![7, 6, 5]);
}

#[test]
fn default_values_are_kept() {
    let history = BoundedHistory::new(4);
    for _ in 0..3 {
        history.put(0u32);
    }

    assert_eq!(history.snapshot(), vec![0, 0, 0]);
    assert_eq!(history.len(), 3);
}

#[test]
fn optional_values_are_not_mistaken_for_empty_slots() {
    let history: BoundedHistory<Option<&str>> = BoundedHistory::new(2);
    history.put(None);
    assert_eq!(history.snapshot(), vec![None]);

    history.put(Some("a"));
    history.put(None);
    assert_eq!(history.snapshot(), vec![None, Some("a")]);
}

#[test]
fn snapshot_is_detached_from_later_writes() {
    let history = BoundedHistory::new(2);
    history.put("first");
    let before = history.snapshot();

    history.put("second");
    history.put("third");

    assert_eq!(before, vec!["first"]);
    assert_eq!(history.snapshot(), vec!["third", "second"]);
}

#[test]
fn capacity_one_keeps_only_the_latest() {
    let history = BoundedHistory::new(1);
    history.put('a');
    history.put('b');
    assert_eq!(history.snapshot(), vec!['b']);
}

#[test]
#[should_panic(expected = "history capacity must be greater than zero")]
fn zero_capacity_is_rejected() {
    let _ = BoundedHistory::<u8>::new(0);
}
