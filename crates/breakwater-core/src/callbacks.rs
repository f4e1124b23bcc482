//! Synchronous callback fan-out.
//!
//! Breakers report state changes and monitors report alarms by invoking plain
//! callbacks on the thread where the change happened. User code run this way
//! must never unwind into the call being guarded, so every invocation goes
//! through [`guarded`].

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// A shared callback receiving a borrowed `E`.
pub type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Runs user-supplied code, turning a panic into `None`.
///
/// `origin` is the name of the breaker or monitor the code runs for and `role`
/// says what the code is (e.g. `"alarm predicate"`); both only appear in the
/// warning logged when the `tracing` feature is enabled.
pub fn guarded<R>(origin: &str, role: &'static str, f: impl FnOnce() -> R) -> Option<R> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(_) => {
            #[cfg(feature = "tracing")]
            tracing::warn!(origin, role, "callback panicked");
            #[cfg(not(feature = "tracing"))]
            let _ = (origin, role);
            None
        }
    }
}

/// Callbacks invoked in registration order.
pub struct Callbacks<E: ?Sized> {
    entries: Vec<Callback<E>>,
}

impl<E: ?Sized> Callbacks<E> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Appends a closure.
    pub fn push<F>(&mut self, f: F)
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.entries.push(Arc::new(f));
    }

    /// Appends an already shared callback.
    pub fn push_shared(&mut self, callback: Callback<E>) {
        self.entries.push(callback);
    }

    /// Invokes every callback with `event`, returning how many panicked.
    ///
    /// A panicking callback does not stop the ones registered after it.
    pub fn notify(&self, origin: &str, role: &'static str, event: &E) -> usize {
        self.entries
            .iter()
            .filter(|callback| guarded(origin, role, || callback(event)).is_none())
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<E: ?Sized> Clone for Callbacks<E> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<E: ?Sized> Default for Callbacks<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ?Sized> fmt::Debug for Callbacks<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("len", &self.entries.len())
            .finish()
    }
}
