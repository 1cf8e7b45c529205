//! Generic slot table.
//!
//! The allocation primitive behind the process descriptor tables and the
//! system-wide open file table: a growable indexed store using a circular
//! probe that resumes after the last successful insert. Slot 0 is
//! permanently reserved so that index 0 can mean "no item" everywhere.
//!
//! The table never treats exhaustion as fatal. A full table makes `add`
//! return `None` and leaves the contents untouched.

extern crate alloc;

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use crate::error::{Error, Result};

/// Capability set an item must provide to live in a [`SlotTable`].
///
/// `Clone` is the copy policy used by growth and [`SlotTable::duplicate`];
/// `Debug` is the rendering hook; `key` extracts the value compared by the
/// keyed lookup and removal operations.
pub trait TableItem: Clone + fmt::Debug {
    type Key: PartialEq;

    fn key(&self) -> Self::Key;
}

/// Slots allocated up front before any growth is needed.
const INITIAL_SLOTS: usize = 8;

/// Growable circular-probe container with a reserved sentinel slot.
///
/// Capacity grows by `min(2 * current + 1, ceiling)` when a free slot is
/// needed; the ceiling admits exactly `max_items` live entries plus the
/// sentinel.
pub struct SlotTable<T: TableItem> {
    slots: Vec<Option<T>>,
    /// Total slot ceiling, sentinel included.
    ceiling: usize,
    /// Occupied slots.
    len: usize,
    /// Index of the last successful insert; probes resume after it.
    last: usize,
}

impl<T: TableItem> SlotTable<T> {
    /// Create a table admitting at most `max_items` live entries.
    pub fn new(max_items: usize) -> Self {
        let ceiling = max_items + 1;
        let cap = INITIAL_SLOTS.min(ceiling);
        Self {
            slots: vec![None; cap],
            ceiling,
            len: 0,
            last: 0,
        }
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Currently allocated slot count, sentinel included.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Insert an item into the first free slot found by the circular
    /// probe. Returns the slot index, or `None` when the table is full.
    pub fn add(&mut self, item: T) -> Option<usize> {
        if let Some(i) = self.probe_free() {
            self.slots[i] = Some(item);
            self.last = i;
            self.len += 1;
            return Some(i);
        }
        if self.slots.len() < self.ceiling {
            self.grow();
            // Growth always exposes at least one free slot.
            let i = self.probe_free()?;
            self.slots[i] = Some(item);
            self.last = i;
            self.len += 1;
            return Some(i);
        }
        None
    }

    /// Place an item at a specific slot. The slot must be in range,
    /// not the sentinel, and currently free.
    pub fn set(&mut self, index: usize, item: T) -> Result<()> {
        if index == 0 || index >= self.ceiling {
            return Err(Error::InvalidSlot);
        }
        while self.slots.len() <= index {
            self.grow();
        }
        if self.slots[index].is_some() {
            return Err(Error::InvalidSlot);
        }
        self.slots[index] = Some(item);
        self.len += 1;
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        if index == 0 {
            return None;
        }
        self.slots.get(index).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if index == 0 {
            return None;
        }
        self.slots.get_mut(index).and_then(|s| s.as_mut())
    }

    /// Remove the item at `index`. Fails on the sentinel, out-of-range
    /// indices, and empty slots; the table is unchanged on failure.
    pub fn remove(&mut self, index: usize) -> Result<T> {
        if index == 0 || index >= self.slots.len() {
            return Err(Error::InvalidSlot);
        }
        match self.slots[index].take() {
            Some(item) => {
                self.len -= 1;
                Ok(item)
            }
            None => Err(Error::NotFound),
        }
    }

    /// Indices of every live item whose key equals `key`.
    pub fn find_by_key(&self, key: &T::Key) -> Vec<usize> {
        self.iter()
            .filter(|(_, item)| item.key() == *key)
            .map(|(i, _)| i)
            .collect()
    }

    /// Remove every live item whose key equals `key`. Fails only if no
    /// entry matched; returns the number removed otherwise.
    pub fn remove_by_key(&mut self, key: &T::Key) -> Result<usize> {
        let matches = self.find_by_key(key);
        if matches.is_empty() {
            return Err(Error::NotFound);
        }
        for i in &matches {
            self.slots[*i] = None;
            self.len -= 1;
        }
        Ok(matches.len())
    }

    /// Deep structural copy: same capacity, every live item copied through
    /// the item's copy policy, mutation-independent thereafter.
    pub fn duplicate(&self) -> Self {
        Self {
            slots: self.slots.clone(),
            ceiling: self.ceiling,
            len: self.len,
            last: self.last,
        }
    }

    /// Live entries with their indices, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|item| (i, item)))
    }

    /// Circular scan for a free slot starting after the last insert.
    fn probe_free(&self) -> Option<usize> {
        let cap = self.slots.len();
        if cap <= 1 {
            return None;
        }
        let start = if self.last + 1 >= cap { 1 } else { self.last + 1 };
        let mut i = start;
        loop {
            if self.slots[i].is_none() {
                return Some(i);
            }
            i += 1;
            if i >= cap {
                i = 1;
            }
            if i == start {
                return None;
            }
        }
    }

    fn grow(&mut self) {
        let new_cap = (self.slots.len() * 2 + 1).min(self.ceiling);
        let mut slots: Vec<Option<T>> = vec![None; new_cap];
        for (i, slot) in self.slots.iter().enumerate() {
            if let Some(item) = slot {
                slots[i] = Some(item.clone());
            }
        }
        self.slots = slots;
    }
}

impl<T: TableItem> fmt::Debug for SlotTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
