//! A fixed-capacity, thread-safe history of the most recent records.
//!
//! [`BoundedHistory`] keeps the last `N` items written to it. Once full, each
//! new item overwrites the oldest one. Reads return a full copy of the
//! retained items, newest first, so callers can inspect a snapshot without
//! holding any lock while new items arrive.
//!
//! Writers take exclusive access; readers share access with each other but
//! never overlap a writer.
//!
//! ## Usage
//!
//! ```rust
//! use breakwater_history::BoundedHistory;
//!
//! let history = BoundedHistory::new(3);
//! for n in 1..=5 {
//!     history.put(n);
//! }
//!
//! // Only the three most recent items survive, newest first.
//! assert_eq!(history.snapshot(), vec![5, 4, 3]);
//! ```
//!
//! ## Empty slots
//!
//! Occupancy is tracked with an explicit fill count. A stored value is never
//! mistaken for an empty slot, even when it equals `T::default()`:
//!
//! ```rust
//! use breakwater_history::BoundedHistory;
//!
//! let history = BoundedHistory::new(4);
//! history.put(0);
//! history.put(0);
//!
//! assert_eq!(history.snapshot(), vec![0, 0]);
//! ```

mod ring;

use parking_lot::RwLock;
use ring::Ring;
use std::fmt;

/// A fixed-capacity, thread-safe store of the most recent items.
///
/// The capacity is fixed at construction and never changes. See the
/// [crate-level documentation](crate) for the read/write discipline.
pub struct BoundedHistory<T> {
    ring: RwLock<Ring<T>>,
}

impl<T> BoundedHistory<T> {
    /// Creates an empty history retaining at most `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "history capacity must be greater than zero");
        Self {
            ring: RwLock::new(Ring::with_capacity(capacity)),
        }
    }

    /// Appends an item, evicting the oldest one when the history is full.
    pub fn put(&self, item: T) {
        self.ring.write().push(item);
    }

    /// Returns the maximum number of items retained.
    pub fn capacity(&self) -> usize {
        self.ring.read().capacity()
    }

    /// Returns the number of items currently retained.
    pub fn len(&self) -> usize {
        self.ring.read().len()
    }

    /// Returns true if nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.ring.read().len() == 0
    }
}

impl<T: Clone> BoundedHistory<T> {
    /// Returns a copy of the retained items, newest first.
    ///
    /// The copy reflects one consistent point in time and is decoupled from
    /// later writes. Fewer than `capacity` items are returned until the
    /// history has been filled once.
    pub fn snapshot(&self) -> Vec<T> {
        let ring = self.ring.read();
        ring.newest_first().cloned().collect()
    }
}

impl<T> fmt::Debug for BoundedHistory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ring = self.ring.read();
        f.debug_struct("BoundedHistory")
            .field("capacity", &ring.capacity())
            .field("len", &ring.len())
            .finish()
    }
}
