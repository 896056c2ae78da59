//! Bounded staging buffer
//!
//! Holds items pending confirmation, keyed by fingerprint and ordered by
//! arrival. On overflow the oldest entry is handed back to the caller,
//! which must commit it: staged work is never dropped by eviction.

use crate::identity::Fingerprint;
use crate::item::Item;
use classify_common::{Error, Result};
use std::collections::{HashMap, VecDeque};

/// FIFO staging area with eviction-with-promotion
#[derive(Debug)]
pub struct Buffer {
    capacity: usize,
    entries: HashMap<Fingerprint, Item>,
    arrival: VecDeque<Fingerprint>,
}

impl Buffer {
    /// Create an empty buffer (capacity is at least 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            arrival: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &Fingerprint) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &Fingerprint) -> Option<&Item> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: &Fingerprint) -> Option<&mut Item> {
        self.entries.get_mut(id)
    }

    /// Insert or overwrite an entry
    ///
    /// Re-arrival moves the id to the back of the arrival order. Returns the
    /// evicted front item when the buffer overflows; the caller commits it.
    #[must_use = "an evicted item must be promoted to the item store"]
    pub fn add(&mut self, id: Fingerprint, item: Item) -> Option<Item> {
        if self.entries.insert(id, item).is_some() {
            self.arrival.retain(|queued| *queued != id);
        }
        self.arrival.push_back(id);

        if self.entries.len() > self.capacity {
            self.evict_front()
        } else {
            None
        }
    }

    /// Remove a staged item for commit
    pub fn validate(&mut self, id: &Fingerprint) -> Result<Item> {
        self.remove(id)
            .ok_or_else(|| Error::NotFound(format!("item {} in buffer", id)))
    }

    /// Remove an entry without promotion
    pub fn remove(&mut self, id: &Fingerprint) -> Option<Item> {
        let item = self.entries.remove(id)?;
        self.arrival.retain(|queued| queued != id);
        Some(item)
    }

    /// Clear everything without promotion
    ///
    /// Returns the number of discarded entries.
    pub fn remove_all(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.arrival.clear();
        count
    }

    /// Snapshot of staged items in arrival order
    pub fn get_current_list(&self) -> Vec<Item> {
        self.arrival
            .iter()
            .filter_map(|id| self.entries.get(id))
            .cloned()
            .collect()
    }

    /// Change capacity; returns the items evicted (oldest first) to fit
    #[must_use = "evicted items must be promoted to the item store"]
    pub fn set_capacity(&mut self, capacity: usize) -> Vec<Item> {
        self.capacity = capacity.max(1);
        let mut evicted = Vec::new();
        while self.entries.len() > self.capacity {
            match self.evict_front() {
                Some(item) => evicted.push(item),
                None => break,
            }
        }
        evicted
    }

    fn evict_front(&mut self) -> Option<Item> {
        while let Some(id) = self.arrival.pop_front() {
            if let Some(item) = self.entries.remove(&id) {
                return Some(item);
            }
        }
        None
    }
}
