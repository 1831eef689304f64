//! Fixed-capacity, oldest-evicting history.
//!
//! Entries are stored in a ring indexed by a write cursor. Once full, each
//! push overwrites the oldest slot, so insertion is O(1) and logical order
//! (oldest to newest) is always recoverable from the cursor.

/// Maximum number of price updates retained per asset.
pub const PRICE_HISTORY_CAPACITY: usize = 100;

#[derive(Debug, Clone)]
pub struct BoundedHistory<T> {
    slots: Vec<T>,
    /// Index of the oldest entry once `slots` is full.
    head: usize,
    capacity: usize,
}

impl<T> BoundedHistory<T> {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "history capacity must be positive");
        Self {
            slots: Vec::with_capacity(capacity),
            head: 0,
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Append an entry, returning the evicted oldest entry when full.
    pub fn push(&mut self, entry: T) -> Option<T> {
        if self.slots.len() < self.capacity {
            self.slots.push(entry);
            return None;
        }
        let evicted = std::mem::replace(&mut self.slots[self.head], entry);
        self.head = (self.head + 1) % self.capacity;
        Some(evicted)
    }

    /// Entry at logical position `index` (0 = oldest retained).
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.slots.len() {
            return None;
        }
        self.slots.get((self.head + index) % self.slots.len())
    }

    pub fn latest(&self) -> Option<&T> {
        self.slots.len().checked_sub(1).and_then(|last| self.get(last))
    }

    /// Oldest-to-newest iterator.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.slots.len()).filter_map(move |i| self.get(i))
    }

    /// Up to `limit` entries starting at logical `offset`. Empty when
    /// `offset` is at or past the end.
    pub fn page(&self, offset: usize, limit: usize) -> impl Iterator<Item = &T> + '_ {
        let len = self.slots.len();
        let count = if offset >= len {
            0
        } else {
            limit.min(len - offset)
        };
        (offset..offset + count).filter_map(move |i| self.get(i))
    }
}
