/// Unsynchronized ring storage behind [`BoundedHistory`](crate::BoundedHistory).
///
/// `slots` grows by pushing until it reaches `capacity`; after that `next`
/// wraps around and overwrites. `slots.len()` is the fill count, so a slot is
/// occupied exactly when its index is below it.
pub(crate) struct Ring<T> {
    slots: Vec<T>,
    capacity: usize,
    next: usize,
}

impl<T> Ring<T> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            next: 0,
        }
    }

    pub(crate) fn push(&mut self, item: T) {
        if self.slots.len() < self.capacity {
            self.slots.push(item);
        } else {
            self.slots[self.next] = item;
        }
        self.next = (self.next + 1) % self.capacity;
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterates occupied slots from the most recent write backwards.
    pub(crate) fn newest_first(&self) -> impl Iterator<Item = &T> + '_ {
        let len = self.slots.len();
        let cap = self.capacity;
        let newest = self.next + cap - 1;
        (0..len).map(move |age| &self.slots[(newest - age) % cap])
    }
}
