//! A circuit breaker that diverts calls to a fallback once a failure monitor
//! raises an alarm.
//!
//! Each call runs under its own cancellation scope, merging the caller's
//! long-lived [`CancellationToken`] with a per-call deadline. Failed calls
//! (errors, timeouts and results rejected by a validator) are recorded in a
//! [`Monitor`], whose alarm predicates decide when the breaker disengages.
//! While disengaged, calls skip the operation and go straight to the
//! fallback, except for an occasional probe that can re-engage the breaker.
//!
//! ## States
//! - **Engaged**: calls execute the operation
//! - **Disengaged**: calls are diverted to the fallback; a probe policy
//!   admits the occasional trial call
//!
//! Failures never reach the caller. `invoke` always returns a value: the
//! operation's result, the fallback's result, or `T::default()`.
//!
//! ## Basic Usage
//!
//! ```rust
//! use breakwater_circuitbreaker::{alarms, CircuitBreaker};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let breaker = CircuitBreaker::<u32>::builder()
//!     .name("inventory")
//!     .deadline(Duration::from_millis(250))
//!     .fallback_value(0)
//!     .alarm_predicate(alarms::failures_at_least(5))
//!     .build();
//!
//! let stock = breaker
//!     .invoke(|_token| async { Ok::<_, std::io::Error>(42) })
//!     .await;
//! assert_eq!(stock, 42);
//! # }
//! ```
//!
//! ## Cooperative Cancellation
//!
//! The token handed to the operation fires when the deadline elapses or the
//! caller cancels. The breaker never drops a running operation; it is up to
//! the operation to observe the token:
//!
//! ```rust
//! use breakwater_circuitbreaker::{Cancelled, CircuitBreaker};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let breaker = CircuitBreaker::<String>::builder()
//!     .deadline(Duration::from_millis(50))
//!     .fallback(|_| async { "cached".to_string() })
//!     .build();
//!
//! let value = breaker
//!     .invoke(|token| async move {
//!         tokio::select! {
//!             _ = token.cancelled() => Err(Cancelled),
//!             _ = tokio::time::sleep(Duration::from_secs(5)) => Ok("fresh".to_string()),
//!         }
//!     })
//!     .await;
//! assert_eq!(value, "cached");
//! # }
//! ```
//!
//! ## Result Validation and Fault Interception
//!
//! ```rust
//! use breakwater_circuitbreaker::CircuitBreaker;
//!
//! let breaker = CircuitBreaker::<Vec<u8>>::builder()
//!     .result_validator(|body| !body.is_empty())
//!     .intercept_fault(|err| eprintln!("remote call failed: {err}"))
//!     .build();
//! ```
//!
//! ## Event Listeners
//!
//! ```rust
//! use breakwater_circuitbreaker::CircuitBreaker;
//!
//! let breaker = CircuitBreaker::<u32>::builder()
//!     .on_state_change(|state| println!("breaker is now {:?}", state))
//!     .on_call_diverted(|calls| println!("{calls} calls diverted since last probe"))
//!     .on_probe(|succeeded| println!("probe succeeded: {succeeded}"))
//!     .build();
//! ```
//!
//! ## Tower Integration
//!
//! ```rust
//! use breakwater_circuitbreaker::CircuitBreaker;
//! use tower::{service_fn, ServiceBuilder};
//!
//! let breaker = CircuitBreaker::<String>::builder()
//!     .fallback_value("unavailable".to_string())
//!     .build();
//!
//! let service = ServiceBuilder::new()
//!     .layer(breaker.layer())
//!     .service(service_fn(|req: String| async move { Ok::<_, std::io::Error>(req) }));
//! ```

use crate::circuit::{Admission, Circuit};
use crate::signal::CallSignal;
use breakwater_core::error::share;
use breakwater_core::BoxError;
use futures::future::BoxFuture;
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, histogram};
use std::error::Error;
use std::future::Future;
use std::sync::Arc;
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

pub use circuit::CircuitState;
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder, DEFAULT_PROBE_THRESHOLD};
pub use error::{Cancelled, ConfigError};
pub use events::CircuitBreakerEvent;
pub use layer::{CircuitBreakerLayer, CircuitBreakerService};
pub use monitor::{Alarm, AlarmHandler, AlarmPredicate, FailureMonitor, Monitor, MonitorBuilder};
pub use outcome::{FailureKind, OutcomeRecord};

pub mod alarms;
mod circuit;
mod config;
mod error;
mod events;
mod layer;
mod monitor;
mod outcome;
mod signal;

/// Decides whether a disengaged call becomes a probe, given the number of
/// calls diverted since the last probe.
pub type ProbePolicy = Arc<dyn Fn(usize) -> bool + Send + Sync>;

pub(crate) type FallbackFn<T> = dyn Fn(CancellationToken) -> BoxFuture<'static, T> + Send + Sync;
pub(crate) type SharedFallback<T> = Arc<FallbackFn<T>>;
pub(crate) type SharedValidator<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;
pub(crate) type SharedFaultInterceptor =
    Arc<dyn Fn(&(dyn Error + Send + Sync + 'static)) + Send + Sync>;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

pub(crate) fn describe_metrics() {
    #[cfg(feature = "metrics")]
    {
        METRICS_INIT.call_once(|| {
            describe_counter!(
                "circuitbreaker_calls_total",
                "Total number of calls through the circuit breaker by outcome"
            );
            describe_counter!(
                "circuitbreaker_transitions_total",
                "Total number of circuit breaker state transitions"
            );
            describe_gauge!(
                "circuitbreaker_state",
                "Current state of the circuit breaker"
            );
            describe_histogram!(
                "circuitbreaker_call_duration_seconds",
                "Duration of operations executed by the circuit breaker"
            );
            describe_counter!(
                "monitor_alarms_total",
                "Total number of alarms raised by failure monitors"
            );
        });
    }
}

/// How one execution of the operation ended.
enum CallOutcome<T> {
    Success(T),
    Failure(OutcomeRecord),
    /// The caller cancelled; nothing is recorded and no fallback runs.
    Cancelled,
}

/// A circuit breaker guarding calls that produce a `T`.
///
/// Cloning is cheap and clones share state, so one breaker can serve many
/// concurrent callers.
pub struct CircuitBreaker<T> {
    circuit: Arc<Circuit>,
    monitor: Arc<dyn FailureMonitor>,
    config: Arc<CircuitBreakerConfig<T>>,
}

impl<T> CircuitBreaker<T> {
    /// Creates a new builder for configuring a circuit breaker.
    pub fn builder() -> CircuitBreakerConfigBuilder<T> {
        CircuitBreakerConfig::builder()
    }

    pub(crate) fn new(
        circuit: Arc<Circuit>,
        monitor: Arc<dyn FailureMonitor>,
        config: Arc<CircuitBreakerConfig<T>>,
    ) -> Self {
        Self {
            circuit,
            monitor,
            config,
        }
    }

    /// Runs `operation` through the breaker.
    ///
    /// The operation receives a token that fires when either the caller's
    /// cancellation token or this call's deadline fires. Errors, timeouts and
    /// rejected results are recorded with the monitor and replaced by the
    /// fallback, or by `T::default()` when none is configured.
    ///
    /// An operation that gives up because its token fired should return
    /// [`Cancelled`]. That error counts as a timeout when the deadline fired,
    /// and when the caller cancelled the call returns `T::default()` without
    /// recording anything. Any other error is a fault, even if a token
    /// fired while the operation was running.
    ///
    /// While disengaged the operation is skipped, except when the probe
    /// policy admits this call as a probe. A probe that succeeds re-engages
    /// the breaker; probe failures are not recorded with the monitor.
    pub async fn invoke<F, Fut, E>(&self, operation: F) -> T
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<BoxError>,
        T: Default,
    {
        let signal = CallSignal::new(&self.config.cancellation, self.config.deadline);

        match self.circuit.state() {
            CircuitState::Engaged => {
                let outcome = self.execute(&signal, operation).await;
                self.settle(outcome, false).await
            }
            CircuitState::Disengaged => match self.circuit.admit() {
                Admission::Divert(disengaged_calls) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        breaker = %self.circuit.name(),
                        disengaged_calls,
                        "call diverted to fallback"
                    );

                    #[cfg(feature = "metrics")]
                    counter!("circuitbreaker_calls_total", "circuitbreaker" => self.name().to_string(), "outcome" => "diverted").increment(1);

                    self.circuit.emit(&CircuitBreakerEvent::CallDiverted {
                        breaker: self.name().to_string(),
                        timestamp: Instant::now(),
                        disengaged_calls,
                    });

                    self.fallback().await
                }
                Admission::Probe => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(breaker = %self.circuit.name(), "probe admitted");

                    self.circuit.emit(&CircuitBreakerEvent::ProbeAdmitted {
                        breaker: self.name().to_string(),
                        timestamp: Instant::now(),
                    });

                    let outcome = self.execute(&signal, operation).await;
                    let succeeded = matches!(outcome, CallOutcome::Success(_));
                    if succeeded {
                        self.circuit.engage();
                    }

                    #[cfg(feature = "tracing")]
                    tracing::debug!(breaker = %self.circuit.name(), succeeded, "probe completed");

                    self.circuit.emit(&CircuitBreakerEvent::ProbeCompleted {
                        breaker: self.name().to_string(),
                        timestamp: Instant::now(),
                        succeeded,
                    });

                    self.settle(outcome, true).await
                }
            },
        }
    }

    /// Runs the operation once and classifies how it ended.
    async fn execute<F, Fut, E>(&self, signal: &CallSignal, operation: F) -> CallOutcome<T>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<BoxError>,
    {
        if signal.caller_cancelled() {
            return CallOutcome::Cancelled;
        }
        if signal.deadline_elapsed() {
            return CallOutcome::Failure(OutcomeRecord::timed_out(Duration::ZERO));
        }

        let start = tokio::time::Instant::now();
        let result = signal.run(operation(signal.token())).await;
        let elapsed = start.elapsed();

        #[cfg(feature = "metrics")]
        histogram!("circuitbreaker_call_duration_seconds", "circuitbreaker" => self.name().to_string())
            .record(elapsed.as_secs_f64());

        match result {
            Ok(value) => match &self.config.result_validator {
                Some(validator) if !validator(&value) => {
                    CallOutcome::Failure(OutcomeRecord::invalid_result(elapsed))
                }
                _ => CallOutcome::Success(value),
            },
            Err(err) => {
                let err: BoxError = err.into();
                if err.is::<Cancelled>() {
                    if signal.deadline_elapsed() {
                        return CallOutcome::Failure(OutcomeRecord::timed_out(elapsed));
                    }
                    if signal.caller_cancelled() {
                        return CallOutcome::Cancelled;
                    }
                }
                let cause = share(err);
                if let Some(interceptor) = &self.config.fault_interceptor {
                    interceptor(&*cause);
                }
                CallOutcome::Failure(OutcomeRecord::fault(elapsed, cause))
            }
        }
    }

    /// Turns an outcome into the value returned to the caller.
    async fn settle(&self, outcome: CallOutcome<T>, probe: bool) -> T
    where
        T: Default,
    {
        match outcome {
            CallOutcome::Success(value) => {
                #[cfg(feature = "metrics")]
                counter!("circuitbreaker_calls_total", "circuitbreaker" => self.name().to_string(), "outcome" => "success").increment(1);

                value
            }
            CallOutcome::Cancelled => {
                #[cfg(feature = "tracing")]
                tracing::debug!(breaker = %self.circuit.name(), "call cancelled by caller");

                #[cfg(feature = "metrics")]
                counter!("circuitbreaker_calls_total", "circuitbreaker" => self.name().to_string(), "outcome" => "cancelled").increment(1);

                self.circuit.emit(&CircuitBreakerEvent::CallCancelled {
                    breaker: self.name().to_string(),
                    timestamp: Instant::now(),
                });

                T::default()
            }
            CallOutcome::Failure(record) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    breaker = %self.circuit.name(),
                    kind = %record.kind(),
                    elapsed = ?record.elapsed(),
                    probe,
                    "call failed"
                );

                #[cfg(feature = "metrics")]
                counter!("circuitbreaker_calls_total", "circuitbreaker" => self.name().to_string(), "outcome" => record.kind().as_str()).increment(1);

                self.circuit.emit(&CircuitBreakerEvent::FailureRecorded {
                    breaker: self.name().to_string(),
                    timestamp: Instant::now(),
                    kind: record.kind(),
                    elapsed: record.elapsed(),
                    probe,
                });

                if !probe {
                    self.monitor.log(record);
                }

                self.fallback().await
            }
        }
    }

    async fn fallback(&self) -> T
    where
        T: Default,
    {
        match &self.config.fallback {
            Some(fallback) => fallback(self.config.cancellation.clone()).await,
            None => T::default(),
        }
    }

    /// Returns the current state of the breaker.
    pub fn state(&self) -> CircuitState {
        self.circuit.state()
    }

    /// Returns whether calls currently execute the operation.
    pub fn is_engaged(&self) -> bool {
        self.state() == CircuitState::Engaged
    }

    /// Forces the breaker into the disengaged state, notifying listeners if
    /// the state changed.
    pub fn force_disengaged(&self) {
        self.circuit.disengage();
    }

    /// Forces the breaker into the engaged state, notifying listeners if the
    /// state changed.
    pub fn force_engaged(&self) {
        self.circuit.engage();
    }

    /// Number of calls diverted since the breaker disengaged or last probed.
    pub fn disengaged_calls(&self) -> usize {
        self.circuit.disengaged_calls()
    }

    /// The monitor receiving this breaker's failure records.
    pub fn monitor(&self) -> &Arc<dyn FailureMonitor> {
        &self.monitor
    }

    pub fn name(&self) -> &str {
        self.circuit.name()
    }

    /// Returns a Tower layer that routes every request through this breaker.
    pub fn layer(&self) -> CircuitBreakerLayer<T> {
        CircuitBreakerLayer::new(self.clone())
    }
}

impl<T> Clone for CircuitBreaker<T> {
    fn clone(&self) -> Self {
        Self {
            circuit: Arc::clone(&self.circuit),
            monitor: Arc::clone(&self.monitor),
            config: Arc::clone(&self.config),
        }
    }
}

impl<T> std::fmt::Debug for CircuitBreaker<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name())
            .field("state", &self.state())
            .field("disengaged_calls", &self.disengaged_calls())
            .field("deadline", &self.config.deadline)
            .finish()
    }
}
