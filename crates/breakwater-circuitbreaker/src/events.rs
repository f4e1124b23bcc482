use crate::outcome::FailureKind;
use crate::CircuitState;
use std::time::{Duration, Instant};

/// Events emitted by a circuit breaker.
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// The breaker moved between `Engaged` and `Disengaged`.
    StateTransition {
        breaker: String,
        timestamp: Instant,
        from_state: CircuitState,
        to_state: CircuitState,
    },
    /// A disengaged call skipped the operation and went to the fallback.
    CallDiverted {
        breaker: String,
        timestamp: Instant,
        /// Disengaged calls counted since the last probe, including this one.
        disengaged_calls: usize,
    },
    /// A disengaged call was admitted as a probe of the operation.
    ProbeAdmitted {
        breaker: String,
        timestamp: Instant,
    },
    /// A probe finished. `succeeded` is true when it re-engaged the breaker.
    ProbeCompleted {
        breaker: String,
        timestamp: Instant,
        succeeded: bool,
    },
    /// A call failed and its fallback is about to run.
    FailureRecorded {
        breaker: String,
        timestamp: Instant,
        kind: FailureKind,
        elapsed: Duration,
        /// Probe failures are not forwarded to the monitor.
        probe: bool,
    },
    /// The caller's cancellation fired; the call returned the default value.
    CallCancelled {
        breaker: String,
        timestamp: Instant,
    },
}

impl CircuitBreakerEvent {
    /// Name of the breaker that emitted this event.
    pub fn breaker(&self) -> &str {
        match self {
            CircuitBreakerEvent::StateTransition { breaker, .. }
            | CircuitBreakerEvent::CallDiverted { breaker, .. }
            | CircuitBreakerEvent::ProbeAdmitted { breaker, .. }
            | CircuitBreakerEvent::ProbeCompleted { breaker, .. }
            | CircuitBreakerEvent::FailureRecorded { breaker, .. }
            | CircuitBreakerEvent::CallCancelled { breaker, .. } => breaker,
        }
    }

    /// When the event happened.
    pub fn timestamp(&self) -> Instant {
        match self {
            CircuitBreakerEvent::StateTransition { timestamp, .. }
            | CircuitBreakerEvent::CallDiverted { timestamp, .. }
            | CircuitBreakerEvent::ProbeAdmitted { timestamp, .. }
            | CircuitBreakerEvent::ProbeCompleted { timestamp, .. }
            | CircuitBreakerEvent::FailureRecorded { timestamp, .. }
            | CircuitBreakerEvent::CallCancelled { timestamp, .. } => *timestamp,
        }
    }
}
