//! Failure monitoring and alarms.
//!
//! A [`Monitor`] keeps the most recent failure records in a
//! [`BoundedHistory`] and, every `k` logged records, evaluates a list of alarm
//! predicates against a fresh snapshot of that history. The first predicate
//! that returns `true` raises an [`Alarm`], delivered synchronously to every
//! registered listener on the thread that called [`FailureMonitor::log`].
//!
//! ```rust
//! use breakwater_circuitbreaker::{FailureMonitor, Monitor, OutcomeRecord};
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let monitor = Monitor::builder()
//!     .history_capacity(10)
//!     .alarm_when(|records| records.len() >= 2)
//!     .build()
//!     .unwrap();
//!
//! let raised = Arc::new(AtomicBool::new(false));
//! let flag = Arc::clone(&raised);
//! monitor.on_alarm(move |_| flag.store(true, Ordering::SeqCst));
//!
//! monitor.log(OutcomeRecord::timed_out(Duration::from_millis(5)));
//! assert!(!raised.load(Ordering::SeqCst));
//!
//! monitor.log(OutcomeRecord::timed_out(Duration::from_millis(7)));
//! assert!(raised.load(Ordering::SeqCst));
//! ```

use crate::error::ConfigError;
use crate::outcome::OutcomeRecord;
use breakwater_core::{guarded, Callback, Callbacks};
use breakwater_history::BoundedHistory;
#[cfg(feature = "metrics")]
use metrics::counter;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;

/// Marker delivered to alarm listeners when a predicate fires.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Alarm;

/// A condition over the failure history, newest record first.
pub type AlarmPredicate = Arc<dyn Fn(&[OutcomeRecord]) -> bool + Send + Sync>;

/// A callback invoked when an alarm is raised.
pub type AlarmHandler = Callback<Alarm>;

/// The interface a circuit breaker needs from its failure monitor.
///
/// [`Monitor`] is the standard implementation. Supplying another one lets a
/// breaker share a monitor with other call sites or be driven by tests.
pub trait FailureMonitor: Send + Sync {
    /// Records one failed call.
    fn log(&self, record: OutcomeRecord);

    /// Registers a handler invoked on every alarm.
    fn listen(&self, handler: AlarmHandler);

    /// Returns the retained failure records, newest first.
    ///
    /// Monitors that keep no history return an empty list.
    fn snapshot(&self) -> Vec<OutcomeRecord> {
        Vec::new()
    }
}

/// Aggregates failure records and raises alarms.
pub struct Monitor {
    name: String,
    history: BoundedHistory<OutcomeRecord>,
    predicates: Vec<AlarmPredicate>,
    evaluate_every: usize,
    pending: Mutex<usize>,
    listeners: RwLock<Callbacks<Alarm>>,
}

impl Monitor {
    /// Creates a new monitor builder.
    pub fn builder() -> MonitorBuilder {
        MonitorBuilder::new()
    }

    /// Registers a closure invoked on every alarm.
    pub fn on_alarm<F>(&self, f: F)
    where
        F: Fn(&Alarm) + Send + Sync + 'static,
    {
        self.listen(Arc::new(f));
    }

    /// Returns the maximum number of records retained.
    pub fn history_capacity(&self) -> usize {
        self.history.capacity()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Counts one log against the evaluation interval, returning true when
    /// the predicates are due.
    fn tick(&self) -> bool {
        let mut pending = self.pending.lock();
        *pending += 1;
        if *pending >= self.evaluate_every {
            *pending = 0;
            true
        } else {
            false
        }
    }

    /// Evaluates predicates in registration order and stops at the first
    /// one that fires.
    ///
    /// A panicking predicate counts as not firing and ends the evaluation;
    /// the remaining predicates are skipped until the next interval.
    fn evaluate(&self) -> bool {
        let records = self.history.snapshot();
        for predicate in &self.predicates {
            match guarded(&self.name, "alarm predicate", || predicate(&records)) {
                Some(true) => return true,
                Some(false) => {}
                None => return false,
            }
        }
        false
    }

    fn raise(&self) {
        #[cfg(feature = "tracing")]
        tracing::warn!(monitor = %self.name, "alarm raised");

        #[cfg(feature = "metrics")]
        counter!("monitor_alarms_total", "monitor" => self.name.clone()).increment(1);

        // Handlers run outside the lock so they may register more handlers.
        let handlers = self.listeners.read().clone();
        handlers.notify(&self.name, "alarm listener", &Alarm);
    }
}

impl FailureMonitor for Monitor {
    fn log(&self, record: OutcomeRecord) {
        self.history.put(record);

        if self.predicates.is_empty() {
            return;
        }

        if self.tick() && self.evaluate() {
            self.raise();
        }
    }

    fn listen(&self, handler: AlarmHandler) {
        self.listeners.write().push_shared(handler);
    }

    fn snapshot(&self) -> Vec<OutcomeRecord> {
        self.history.snapshot()
    }
}

impl fmt::Debug for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monitor")
            .field("name", &self.name)
            .field("history", &self.history)
            .field("predicates", &self.predicates.len())
            .field("evaluate_every", &self.evaluate_every)
            .field("listeners", &self.listeners.read().len())
            .finish()
    }
}

/// Builder for [`Monitor`].
pub struct MonitorBuilder {
    name: String,
    history_capacity: usize,
    predicates: Vec<AlarmPredicate>,
    evaluate_every: usize,
}

impl MonitorBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            name: String::from("<unnamed>"),
            history_capacity: 100,
            predicates: Vec::new(),
            evaluate_every: 1,
        }
    }

    /// Gives this monitor a human-readable name for observability.
    ///
    /// Default: `<unnamed>`
    pub fn name<N: Into<String>>(mut self, name: N) -> Self {
        self.name = name.into();
        self
    }

    /// Sets how many of the most recent failure records are retained.
    ///
    /// Default: 100
    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Adds an alarm predicate. Predicates are evaluated in the order added.
    pub fn alarm_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&[OutcomeRecord]) -> bool + Send + Sync + 'static,
    {
        self.predicates.push(Arc::new(predicate));
        self
    }

    /// Adds several shared alarm predicates at once.
    pub fn alarm_predicates<I>(mut self, predicates: I) -> Self
    where
        I: IntoIterator<Item = AlarmPredicate>,
    {
        self.predicates.extend(predicates);
        self
    }

    /// Evaluates the predicates once every `k` logged records.
    ///
    /// Default: 1 (every record)
    pub fn evaluate_every(mut self, k: usize) -> Self {
        self.evaluate_every = k;
        self
    }

    /// Builds the monitor.
    pub fn build(self) -> Result<Monitor, ConfigError> {
        if self.history_capacity == 0 {
            return Err(ConfigError::ZeroHistoryCapacity);
        }
        if self.evaluate_every == 0 {
            return Err(ConfigError::ZeroEvaluationInterval);
        }

        Ok(Monitor {
            name: self.name,
            history: BoundedHistory::new(self.history_capacity),
            predicates: self.predicates,
            evaluate_every: self.evaluate_every,
            pending: Mutex::new(0),
            listeners: RwLock::new(Callbacks::new()),
        })
    }
}

impl Default for MonitorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
