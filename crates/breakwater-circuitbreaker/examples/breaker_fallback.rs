//! Circuit breaker guarding a flaky remote call.
//!
//! A simulated quote service fails in bursts and sometimes hangs. The breaker
//! applies a deadline, rejects malformed quotes, serves the last known quote
//! as a fallback, and disengages once the recent failure history trips an
//! alarm. Probes re-engage it once the service recovers.
//!
//! Run with:
//! ```sh
//! cargo run -p breakwater-circuitbreaker --example breaker_fallback --features tracing
//! ```

use breakwater_circuitbreaker::{alarms, Cancelled, CircuitBreaker, CircuitState, FailureKind};
use breakwater_core::BoxError;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct QuoteError(&'static str);

impl std::fmt::Display for QuoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "quote service error: {}", self.0)
    }
}

impl std::error::Error for QuoteError {}

/// Simulates a remote quote service whose health changes over time.
#[derive(Clone)]
struct QuoteService {
    calls: Arc<AtomicUsize>,
}

impl QuoteService {
    fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns a price in cents.
    async fn fetch(&self, token: CancellationToken) -> Result<u64, BoxError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);

        // Calls 8..20 are an outage; after that the service recovers.
        let work = async move {
            match n {
                8..=13 => Err(BoxError::from(QuoteError("connection refused"))),
                14..=19 => {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    Ok(10_000)
                }
                _ if n % 7 == 3 => Ok(0),
                _ => {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok(10_000 + n as u64)
                }
            }
        };

        tokio::select! {
            _ = token.cancelled() => Err(BoxError::from(Cancelled)),
            result = work => result,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("Circuit breaker with fallback\n");

    let service = QuoteService::new();
    let last_known = Arc::new(AtomicU64::new(9_999));

    let cached = Arc::clone(&last_known);
    let breaker = CircuitBreaker::<u64>::builder()
        .name("quotes")
        .deadline(Duration::from_millis(200))
        .result_validator(|price| *price > 0)
        .fallback(move |_| {
            let price = cached.load(Ordering::SeqCst);
            async move { price }
        })
        .intercept_fault(|err| println!("   ! intercepted: {err}"))
        .history_capacity(10)
        .alarm_predicate(alarms::failures_at_least(4))
        .alarm_predicate(alarms::kind_at_least(FailureKind::TimedOut, 2))
        .probe_every(3)
        .on_state_change(|state| match state {
            CircuitState::Disengaged => println!("   >> breaker disengaged"),
            CircuitState::Engaged => println!("   >> breaker re-engaged"),
        })
        .on_probe(|succeeded| println!("   ?? probe succeeded: {succeeded}"))
        .build();

    for i in 0..40 {
        let svc = service.clone();
        let price = breaker.invoke(|token| async move { svc.fetch(token).await }).await;

        if breaker.is_engaged() {
            last_known.store(price, Ordering::SeqCst);
        }

        println!(
            "   request {i:>2}: {price} cents (state: {:?}, diverted: {})",
            breaker.state(),
            breaker.disengaged_calls()
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let history = breaker.monitor().snapshot();
    println!("\nRecent failures ({}):", history.len());
    for record in history {
        println!("   {} after {:?}", record.kind(), record.elapsed());
    }
}
