use crate::events::CircuitBreakerEvent;
use crate::ProbePolicy;
use breakwater_core::Callbacks;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::time::Instant;

/// Whether calls currently reach the wrapped operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum CircuitState {
    /// Calls execute the operation.
    Engaged = 0,
    /// Calls are diverted to the fallback, except for occasional probes.
    Disengaged = 1,
}

impl CircuitState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => CircuitState::Disengaged,
            _ => CircuitState::Engaged,
        }
    }

    /// Returns a stable label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Engaged => "Engaged",
            CircuitState::Disengaged => "Disengaged",
        }
    }
}

/// How a call made while disengaged is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    /// Skip the operation; carries the updated disengaged-call count.
    Divert(usize),
    /// Run the operation as a probe.
    Probe,
}

/// Shared state machine of one breaker.
///
/// The state is an atomic read without locking on every call. The
/// disengaged-call counter sits behind a mutex so that deciding on a probe
/// and resetting the counter happen as one step. `observed` mirrors the
/// counter for readers, which never take the lock.
pub(crate) struct Circuit {
    state: AtomicU8,
    disengaged_calls: Mutex<usize>,
    observed: AtomicUsize,
    probe_policy: ProbePolicy,
    listeners: Callbacks<CircuitBreakerEvent>,
    name: String,
}

impl Circuit {
    pub(crate) fn new(
        name: String,
        probe_policy: ProbePolicy,
        listeners: Callbacks<CircuitBreakerEvent>,
    ) -> Self {
        Self {
            state: AtomicU8::new(CircuitState::Engaged as u8),
            disengaged_calls: Mutex::new(0),
            observed: AtomicUsize::new(0),
            probe_policy,
            listeners,
            name,
        }
    }

    pub(crate) fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn disengaged_calls(&self) -> usize {
        self.observed.load(Ordering::Acquire)
    }

    /// Decides whether a disengaged call becomes the probe.
    ///
    /// Only one caller per reset window can win: the policy is consulted and
    /// the counter reset under the same lock. The policy may read
    /// [`disengaged_calls`](Self::disengaged_calls) but must not transition
    /// the circuit.
    pub(crate) fn admit(&self) -> Admission {
        let mut calls = self.disengaged_calls.lock();
        let admission = if (self.probe_policy)(*calls) {
            *calls = 0;
            Admission::Probe
        } else {
            *calls += 1;
            Admission::Divert(*calls)
        };
        self.observed.store(*calls, Ordering::Release);
        admission
    }

    /// Engaged -> Disengaged. Returns false if the breaker was already disengaged.
    pub(crate) fn disengage(&self) -> bool {
        self.transition(CircuitState::Engaged, CircuitState::Disengaged)
    }

    /// Disengaged -> Engaged. Returns false if the breaker was already engaged.
    pub(crate) fn engage(&self) -> bool {
        self.transition(CircuitState::Disengaged, CircuitState::Engaged)
    }

    pub(crate) fn emit(&self, event: &CircuitBreakerEvent) {
        self.listeners.notify(&self.name, "event listener", event);
    }

    fn transition(&self, from: CircuitState, to: CircuitState) -> bool {
        {
            let mut calls = self.disengaged_calls.lock();
            if self
                .state
                .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return false;
            }
            if to == CircuitState::Disengaged {
                *calls = 0;
                self.observed.store(0, Ordering::Release);
            }
        }

        #[cfg(feature = "tracing")]
        tracing::info!(breaker = %self.name, from = ?from, to = ?to, "circuit state transition");

        #[cfg(feature = "metrics")]
        {
            counter!(
                "circuitbreaker_transitions_total",
                "circuitbreaker" => self.name.clone(),
                "from" => from.as_str(),
                "to" => to.as_str()
            )
            .increment(1);
            gauge!("circuitbreaker_state", "circuitbreaker" => self.name.clone(), "state" => from.as_str())
                .set(0.0);
            gauge!("circuitbreaker_state", "circuitbreaker" => self.name.clone(), "state" => to.as_str())
                .set(1.0);
        }

        self.emit(&CircuitBreakerEvent::StateTransition {
            breaker: self.name.clone(),
            timestamp: Instant::now(),
            from_state: from,
            to_state: to,
        });
        true
    }
}
