//! Lock-guarded string-to-counter store
//!
//! Every aggregate view of the state engine is a `CounterStore`. Writers take
//! the exclusive lock once per mutation; readers that need several reads to be
//! consistent with each other hold a [`CounterReadGuard`] for the whole sequence.

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Ordered mapping from key to unsigned 64-bit counter
#[derive(Debug)]
pub struct CounterStore {
    name: &'static str,
    entries: RwLock<BTreeMap<String, u64>>,
}

impl CounterStore {
    /// Create an empty store labelled `name` in reports
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Counter for `key`, or 0 when it has never been written
    pub fn get(&self, key: &str) -> u64 {
        self.read_entries().get(key).copied().unwrap_or(0)
    }

    /// Insert or overwrite the counter for `key`
    pub fn set(&self, key: &str, value: u64) {
        let mut entries = self.write_entries();
        match entries.get_mut(key) {
            Some(slot) => *slot = value,
            None => {
                entries.insert(key.to_string(), value);
            }
        }
    }

    /// Add `delta` to the counter for `key` under one write lock, returning the new value
    pub fn add(&self, key: &str, delta: u64) -> u64 {
        let mut entries = self.write_entries();
        match entries.get_mut(key) {
            Some(slot) => {
                *slot = slot.saturating_add(delta);
                *slot
            }
            None => {
                entries.insert(key.to_string(), delta);
                delta
            }
        }
    }

    /// Remove `key`; absent keys are ignored
    pub fn remove(&self, key: &str) -> Option<u64> {
        self.write_entries().remove(key)
    }

    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_entries().is_empty()
    }

    /// Copy of the current contents
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.read_entries().clone()
    }

    /// Hold the shared lock for a sequence of reads.
    ///
    /// The lock is released when the guard is dropped. Calling any other method
    /// of the same store while holding the guard on the same thread may deadlock.
    pub fn read(&self) -> CounterReadGuard<'_> {
        CounterReadGuard {
            name: self.name,
            entries: self.read_entries(),
        }
    }

    // Counters are plain integers, so a panic in another holder cannot leave
    // them half-written; recover the data instead of propagating the poison.
    fn read_entries(&self) -> RwLockReadGuard<'_, BTreeMap<String, u64>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, BTreeMap<String, u64>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Shared access to a [`CounterStore`] held until drop
#[derive(Debug)]
pub struct CounterReadGuard<'a> {
    name: &'static str,
    entries: RwLockReadGuard<'a, BTreeMap<String, u64>>,
}

impl CounterReadGuard<'_> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn get(&self, key: &str) -> u64 {
        self.entries.get(key).copied().unwrap_or(0)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in ascending key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(String::as_str)
    }

    /// Sum of every counter in the store
    pub fn total(&self) -> u64 {
        self.entries
            .values()
            .fold(0u64, |acc, v| acc.saturating_add(*v))
    }
}

impl Serialize for CounterReadGuard<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Serialize::serialize(&*self.entries, serializer)
    }
}
