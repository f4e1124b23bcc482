//! Ready-made alarm predicates.
//!
//! Each function returns an [`AlarmPredicate`] for use with
//! [`MonitorBuilder::alarm_predicates`](crate::MonitorBuilder::alarm_predicates)
//! or [`CircuitBreakerConfigBuilder::alarm_predicate`](crate::CircuitBreakerConfigBuilder::alarm_predicate).
//!
//! ```rust
//! use breakwater_circuitbreaker::{alarms, FailureKind, Monitor};
//!
//! let monitor = Monitor::builder()
//!     .history_capacity(20)
//!     .alarm_predicates([
//!         alarms::failures_at_least(10),
//!         alarms::kind_at_least(FailureKind::TimedOut, 3),
//!     ])
//!     .build()
//!     .unwrap();
//! ```

use crate::monitor::AlarmPredicate;
use crate::outcome::{FailureKind, OutcomeRecord};
use std::sync::Arc;
use std::time::Duration;

/// Fires once the history holds at least `n` failures of any kind.
pub fn failures_at_least(n: usize) -> AlarmPredicate {
    Arc::new(move |records: &[OutcomeRecord]| records.len() >= n)
}

/// Fires once the history holds at least `n` failures of `kind`.
pub fn kind_at_least(kind: FailureKind, n: usize) -> AlarmPredicate {
    Arc::new(move |records: &[OutcomeRecord]| {
        records.iter().filter(|r| r.kind() == kind).count() >= n
    })
}

/// Fires once at least `n` recorded failures took `threshold` or longer.
pub fn slow_at_least(threshold: Duration, n: usize) -> AlarmPredicate {
    Arc::new(move |records: &[OutcomeRecord]| {
        records.iter().filter(|r| r.elapsed() >= threshold).count() >= n
    })
}
