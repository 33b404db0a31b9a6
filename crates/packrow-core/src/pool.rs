//! Object pool store
//!
//! Deduplicating value store addressed by a small integer slot. Equal values
//! (by `Eq`) share one slot; slots are handed out in insertion order and never
//! reused or removed.

use std::hash::Hash;

use hashbrown::HashMap;

use crate::error::{StoreError, StoreResult};

/// Deduplicating store of pooled values.
#[derive(Debug, Clone)]
pub struct PoolStore<T> {
    /// Values by slot
    elements: Vec<T>,
    /// Slot of every stored value
    index: HashMap<T, u32>,
}

impl<T: Eq + Hash + Clone> PoolStore<T> {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Store a value and return its slot. A value equal to one already
    /// pooled returns the existing slot.
    pub fn set(&mut self, value: T) -> u32 {
        if let Some(&slot) = self.index.get(&value) {
            return slot;
        }

        let slot = self.elements.len() as u32;
        self.index.insert(value.clone(), slot);
        self.elements.push(value);
        slot
    }

    /// Value stored at the given slot.
    pub fn get(&self, slot: u32) -> StoreResult<&T> {
        self.elements
            .get(slot as usize)
            .ok_or(StoreError::PoolIndexOutOfRange {
                index: slot,
                len: self.elements.len(),
            })
    }

    /// Slot of an already pooled value.
    pub fn position_of(&self, value: &T) -> Option<u32> {
        self.index.get(value).copied()
    }

    /// Number of distinct pooled values.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns true if nothing was pooled yet.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Pooled values in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.elements.iter()
    }
}

impl<T: Eq + Hash + Clone> Default for PoolStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Eq + Hash + Clone> FromIterator<T> for PoolStore<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut pool = Self::new();
        for value in iter {
            pool.set(value);
        }
        pool
    }
}
