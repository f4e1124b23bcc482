use crate::circuit::Circuit;
use crate::error::ConfigError;
use crate::events::CircuitBreakerEvent;
use crate::monitor::{Alarm, AlarmPredicate, FailureMonitor, MonitorBuilder};
use crate::outcome::FailureKind;
use crate::{
    CircuitBreaker, CircuitState, ProbePolicy, SharedFallback, SharedFaultInterceptor,
    SharedValidator,
};
use breakwater_core::Callbacks;
use futures::future::BoxFuture;
use std::error::Error;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Number of diverted calls after which the default probe policy admits a probe.
pub const DEFAULT_PROBE_THRESHOLD: usize = 5;

/// Per-call configuration of a built circuit breaker.
///
/// Fixed once [`CircuitBreakerConfigBuilder::build`] returns; concurrent
/// calls only ever read it.
pub struct CircuitBreakerConfig<T> {
    pub(crate) deadline: Option<Duration>,
    pub(crate) cancellation: CancellationToken,
    pub(crate) fallback: Option<SharedFallback<T>>,
    pub(crate) result_validator: Option<SharedValidator<T>>,
    pub(crate) fault_interceptor: Option<SharedFaultInterceptor>,
}

impl<T> CircuitBreakerConfig<T> {
    /// Creates a new configuration builder.
    pub fn builder() -> CircuitBreakerConfigBuilder<T> {
        crate::describe_metrics();
        CircuitBreakerConfigBuilder::new()
    }
}

/// Builder for configuring and constructing a circuit breaker.
pub struct CircuitBreakerConfigBuilder<T> {
    name: String,
    deadline: Option<Duration>,
    cancellation: CancellationToken,
    fallback: Option<SharedFallback<T>>,
    result_validator: Option<SharedValidator<T>>,
    fault_interceptor: Option<SharedFaultInterceptor>,
    probe_policy: ProbePolicy,
    listeners: Callbacks<CircuitBreakerEvent>,
    monitor_builder: MonitorBuilder,
    monitor: Option<Arc<dyn FailureMonitor>>,
}

impl<T> CircuitBreakerConfigBuilder<T> {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            name: String::from("<unnamed>"),
            deadline: None,
            cancellation: CancellationToken::new(),
            fallback: None,
            result_validator: None,
            fault_interceptor: None,
            probe_policy: Arc::new(|calls: usize| calls >= DEFAULT_PROBE_THRESHOLD),
            listeners: Callbacks::new(),
            monitor_builder: MonitorBuilder::new(),
            monitor: None,
        }
    }

    /// Give this breaker a human-readable name for observability.
    ///
    /// Default: `<unnamed>`
    pub fn name<N: Into<String>>(mut self, n: N) -> Self {
        self.name = n.into();
        self
    }

    /// Caps the execution time of each call.
    ///
    /// The clock starts when [`CircuitBreaker::invoke`] is called, not when
    /// the breaker is built. A zero deadline times every call out before the
    /// operation is started.
    ///
    /// Default: None (no deadline)
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets the caller's long-lived cancellation token.
    ///
    /// Cancelling it makes in-flight and future calls return `T::default()`
    /// without recording a failure or running the fallback.
    ///
    /// Default: a token that is never cancelled
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Sets the computation used when the operation is skipped or fails.
    ///
    /// The fallback receives the caller's cancellation token and runs at most
    /// once per call. Its own panics are not caught.
    ///
    /// Default: None (failed calls return `T::default()`)
    pub fn fallback<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        self.fallback = Some(Arc::new(move |token: CancellationToken| -> BoxFuture<'static, T> {
            Box::pin(f(token))
        }));
        self
    }

    /// Uses a fixed value as the fallback.
    pub fn fallback_value(self, value: T) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        self.fallback(move |_| {
            let value = value.clone();
            async move { value }
        })
    }

    /// Declares successful results invalid when `validator` returns false.
    ///
    /// Invalid results are recorded as [`FailureKind::InvalidResult`] and
    /// replaced by the fallback.
    pub fn result_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.result_validator = Some(Arc::new(validator));
        self
    }

    /// Registers a side channel notified of every error the operation returns.
    ///
    /// Called before the failure is recorded, including on probe calls.
    /// Timeouts and caller cancellations are not faults and do not reach it.
    pub fn intercept_fault<F>(mut self, interceptor: F) -> Self
    where
        F: Fn(&(dyn Error + Send + Sync + 'static)) + Send + Sync + 'static,
    {
        self.fault_interceptor = Some(Arc::new(interceptor));
        self
    }

    /// Decides whether a disengaged call becomes a probe.
    ///
    /// The policy receives the number of calls diverted since the last probe.
    /// It runs while the breaker holds its admission lock: it may read
    /// [`CircuitBreaker::disengaged_calls`] or [`CircuitBreaker::state`], but
    /// calling `force_engaged` or `force_disengaged` on the same breaker from
    /// the policy deadlocks.
    ///
    /// Default: probe once 5 calls have been diverted
    pub fn probe_policy<F>(mut self, policy: F) -> Self
    where
        F: Fn(usize) -> bool + Send + Sync + 'static,
    {
        self.probe_policy = Arc::new(policy);
        self
    }

    /// Probes after every `n` diverted calls.
    pub fn probe_every(self, n: usize) -> Self {
        self.probe_policy(move |calls| calls >= n)
    }

    /// Sets how many failure records the internal monitor retains.
    ///
    /// Ignored when a monitor is supplied with [`monitor`](Self::monitor).
    ///
    /// Default: 100
    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.monitor_builder = self.monitor_builder.history_capacity(capacity);
        self
    }

    /// Adds an alarm predicate to the internal monitor.
    ///
    /// When a predicate over the recent failures returns true the breaker
    /// disengages. Without predicates the breaker never disengages on its own.
    /// Ignored when a monitor is supplied with [`monitor`](Self::monitor).
    pub fn alarm_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&[crate::OutcomeRecord]) -> bool + Send + Sync + 'static,
    {
        self.monitor_builder = self.monitor_builder.alarm_when(predicate);
        self
    }

    /// Adds a shared alarm predicate, such as one from [`alarms`](crate::alarms).
    pub fn alarm_predicate(mut self, predicate: AlarmPredicate) -> Self {
        self.monitor_builder = self.monitor_builder.alarm_predicates([predicate]);
        self
    }

    /// Evaluates the internal monitor's predicates once every `k` failures.
    ///
    /// Default: 1
    pub fn evaluate_every(mut self, k: usize) -> Self {
        self.monitor_builder = self.monitor_builder.evaluate_every(k);
        self
    }

    /// Uses an externally constructed monitor instead of building one.
    ///
    /// The breaker registers itself as an alarm listener on `monitor` when
    /// built.
    pub fn monitor(mut self, monitor: Arc<dyn FailureMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Registers a callback invoked with the new state on every transition.
    ///
    /// # Example
    /// ```rust
    /// use breakwater_circuitbreaker::{CircuitBreakerConfig, CircuitState};
    ///
    /// let breaker = CircuitBreakerConfig::<u32>::builder()
    ///     .on_state_change(|state| match state {
    ///         CircuitState::Disengaged => println!("call site disengaged"),
    ///         CircuitState::Engaged => println!("call site re-engaged"),
    ///     })
    ///     .build();
    /// ```
    pub fn on_state_change<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.listeners.push(move |event: &CircuitBreakerEvent| {
            if let CircuitBreakerEvent::StateTransition { to_state, .. } = event {
                f(*to_state);
            }
        });
        self
    }

    /// Registers a callback invoked when a disengaged call is diverted.
    ///
    /// Receives the number of calls diverted since the last probe.
    pub fn on_call_diverted<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.listeners.push(move |event: &CircuitBreakerEvent| {
            if let CircuitBreakerEvent::CallDiverted {
                disengaged_calls, ..
            } = event
            {
                f(*disengaged_calls);
            }
        });
        self
    }

    /// Registers a callback invoked when a probe finishes, with whether it
    /// re-engaged the breaker.
    pub fn on_probe<F>(mut self, f: F) -> Self
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.listeners.push(move |event: &CircuitBreakerEvent| {
            if let CircuitBreakerEvent::ProbeCompleted { succeeded, .. } = event {
                f(*succeeded);
            }
        });
        self
    }

    /// Registers a callback invoked for every failed call, probes included.
    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(FailureKind) + Send + Sync + 'static,
    {
        self.listeners.push(move |event: &CircuitBreakerEvent| {
            if let CircuitBreakerEvent::FailureRecorded { kind, .. } = event {
                f(*kind);
            }
        });
        self
    }

    /// Registers a callback receiving every event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&CircuitBreakerEvent) + Send + Sync + 'static,
    {
        self.listeners.push(f);
        self
    }

    /// Builds the circuit breaker.
    ///
    /// # Panics
    ///
    /// Panics if the internal monitor configuration is invalid. Use
    /// [`try_build`](Self::try_build) to handle that case.
    pub fn build(self) -> CircuitBreaker<T> {
        match self.try_build() {
            Ok(breaker) => breaker,
            Err(err) => panic!("invalid circuit breaker configuration: {err}"),
        }
    }

    /// Builds the circuit breaker, reporting invalid configuration.
    pub fn try_build(self) -> Result<CircuitBreaker<T>, ConfigError> {
        let monitor: Arc<dyn FailureMonitor> = match self.monitor {
            Some(monitor) => monitor,
            None => Arc::new(self.monitor_builder.name(self.name.clone()).build()?),
        };

        let circuit = Arc::new(Circuit::new(
            self.name,
            self.probe_policy,
            self.listeners,
        ));

        let weak: Weak<Circuit> = Arc::downgrade(&circuit);
        monitor.listen(Arc::new(move |_: &Alarm| {
            if let Some(circuit) = weak.upgrade() {
                circuit.disengage();
            }
        }));

        let config = CircuitBreakerConfig {
            deadline: self.deadline,
            cancellation: self.cancellation,
            fallback: self.fallback,
            result_validator: self.result_validator,
            fault_interceptor: self.fault_interceptor,
        };

        Ok(CircuitBreaker::new(circuit, monitor, Arc::new(config)))
    }
}

impl<T> Default for CircuitBreakerConfigBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}
