use super::TestError;
use breakwater_circuitbreaker::{Cancelled, CircuitBreaker, FailureKind, FailureMonitor};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn zero_deadline_is_an_immediate_timeout() {
    let runs = Arc::new(AtomicUsize::new(0));
    let r = Arc::clone(&runs);
    let breaker = CircuitBreaker::<u32>::builder()
        .deadline(Duration::ZERO)
        .fallback_value(5)
        .build();

    let value = breaker
        .invoke(|_| async move {
            r.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok::<_, TestError>(10)
        })
        .await;

    assert_eq!(value, 5);
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    let history = breaker.monitor().snapshot();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind(), FailureKind::TimedOut);
}

#[tokio::test(start_paused = true)]
async fn deadline_cancels_cooperative_operation() {
    let breaker = CircuitBreaker::<u32>::builder()
        .deadline(Duration::from_millis(100))
        .fallback_value(5)
        .build();

    let value = breaker
        .invoke(|token| async move {
            tokio::select! {
                _ = token.cancelled() => Err(Cancelled),
                _ = tokio::time::sleep(Duration::from_secs(10)) => Ok(10),
            }
        })
        .await;

    assert_eq!(value, 5);
    let history = breaker.monitor().snapshot();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind(), FailureKind::TimedOut);
    assert_eq!(history[0].elapsed(), Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn deadline_starts_at_invocation() {
    let breaker = CircuitBreaker::<u32>::builder()
        .deadline(Duration::from_millis(100))
        .build();

    // Time spent between configuration and invocation does not count.
    tokio::time::sleep(Duration::from_secs(5)).await;

    let value = breaker
        .invoke(|_| async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, TestError>(10)
        })
        .await;

    assert_eq!(value, 10);
    assert!(breaker.monitor().snapshot().is_empty());
}

#[tokio::test(start_paused = true)]
async fn late_success_is_still_a_success() {
    let breaker = CircuitBreaker::<u32>::builder()
        .deadline(Duration::from_millis(10))
        .fallback_value(5)
        .build();

    // Ignores its token and completes after the deadline.
    let value = breaker
        .invoke(|_| async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            Ok::<_, TestError>(10)
        })
        .await;

    assert_eq!(value, 10);
    assert!(breaker.monitor().snapshot().is_empty());
}

#[tokio::test]
async fn cancelled_caller_gets_default_without_side_effects() {
    let caller = CancellationToken::new();
    caller.cancel();

    let fallbacks = Arc::new(AtomicUsize::new(0));
    let f = Arc::clone(&fallbacks);
    let runs = Arc::new(AtomicUsize::new(0));
    let r = Arc::clone(&runs);

    let breaker = CircuitBreaker::<u32>::builder()
        .cancellation(caller)
        .fallback(move |_| {
            f.fetch_add(1, Ordering::SeqCst);
            async { 5 }
        })
        .build();

    let value = breaker
        .invoke(|_| async move {
            r.fetch_add(1, Ordering::SeqCst);
            Ok::<_, TestError>(10)
        })
        .await;

    assert_eq!(value, 0);
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert_eq!(fallbacks.load(Ordering::SeqCst), 0);
    assert!(breaker.monitor().snapshot().is_empty());
}

#[tokio::test(start_paused = true)]
async fn caller_cancelling_mid_call_is_not_recorded() {
    let caller = CancellationToken::new();
    let breaker = CircuitBreaker::<u32>::builder()
        .cancellation(caller.clone())
        .deadline(Duration::from_secs(10))
        .fallback_value(5)
        .build();

    let canceller = tokio::spawn({
        let caller = caller.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            caller.cancel();
        }
    });

    let value = breaker
        .invoke(|token| async move {
            token.cancelled().await;
            Err::<u32, _>(Cancelled)
        })
        .await;
    canceller.await.unwrap();

    assert_eq!(value, 0);
    assert!(breaker.monitor().snapshot().is_empty());
    assert!(breaker.is_engaged());
}

#[tokio::test]
async fn fallback_receives_the_caller_token() {
    let caller = CancellationToken::new();
    let breaker = CircuitBreaker::<bool>::builder()
        .cancellation(caller.clone())
        .fallback(|token| async move { token.is_cancelled() })
        .build();

    let before = breaker
        .invoke(|_| async { Err::<bool, _>(TestError("boom")) })
        .await;
    assert!(!before);

    // Once the caller cancels, calls short-circuit before the fallback.
    caller.cancel();
    let after = breaker
        .invoke(|_| async { Err::<bool, _>(TestError("boom")) })
        .await;
    assert!(!after);
}

#[tokio::test(start_paused = true)]
async fn concurrent_calls_have_independent_deadlines() {
    let breaker = CircuitBreaker::<u32>::builder()
        .deadline(Duration::from_millis(100))
        .fallback_value(0)
        .build();

    let slow = {
        let breaker = breaker.clone();
        tokio::spawn(async move {
            breaker
                .invoke(|token| async move {
                    token.cancelled().await;
                    Err::<u32, _>(Cancelled)
                })
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(90)).await;

    // Started 90ms after the first call; its own deadline is still 100ms away
    // when the first one expires.
    let fast = breaker
        .invoke(|_| async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, TestError>(7)
        })
        .await;

    assert_eq!(fast, 7);
    assert_eq!(slow.await.unwrap(), 0);
    assert_eq!(breaker.monitor().snapshot().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn error_after_deadline_is_still_a_fault() {
    let intercepted = Arc::new(AtomicUsize::new(0));
    let i = Arc::clone(&intercepted);
    let breaker = CircuitBreaker::<u32>::builder()
        .deadline(Duration::from_millis(10))
        .fallback_value(5)
        .intercept_fault(move |_| {
            i.fetch_add(1, Ordering::SeqCst);
        })
        .build();

    // Ignores its token and fails on its own after the deadline.
    let value = breaker
        .invoke(|_| async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            Err::<u32, _>(TestError("refused"))
        })
        .await;

    assert_eq!(value, 5);
    assert_eq!(intercepted.load(Ordering::SeqCst), 1);
    let history = breaker.monitor().snapshot();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind(), FailureKind::Fault);
    assert_eq!(
        history[0].cause().map(|c| c.to_string()).as_deref(),
        Some("refused")
    );
}

#[tokio::test]
async fn unrelated_error_during_caller_cancellation_is_a_fault() {
    let caller = CancellationToken::new();
    let intercepted = Arc::new(AtomicUsize::new(0));
    let i = Arc::clone(&intercepted);
    let breaker = CircuitBreaker::<u32>::builder()
        .cancellation(caller.clone())
        .fallback_value(5)
        .intercept_fault(move |_| {
            i.fetch_add(1, Ordering::SeqCst);
        })
        .build();

    let value = breaker
        .invoke(|_| async move {
            caller.cancel();
            Err::<u32, _>(TestError("refused"))
        })
        .await;

    assert_eq!(value, 5);
    assert_eq!(intercepted.load(Ordering::SeqCst), 1);
    let history = breaker.monitor().snapshot();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind(), FailureKind::Fault);
}

#[tokio::test]
async fn cancelled_error_without_a_fired_signal_is_a_fault() {
    let breaker = CircuitBreaker::<u32>::builder().fallback_value(5).build();

    let value = breaker
        .invoke(|_| async { Err::<u32, _>(Cancelled) })
        .await;

    assert_eq!(value, 5);
    let history = breaker.monitor().snapshot();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind(), FailureKind::Fault);
}
