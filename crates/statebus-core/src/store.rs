//! Authoritative `(scope, id)` → value store.
//!
//! Backed by a sharded concurrent map: single-key reads and writes lock one
//! shard briefly, and snapshot iteration visits shards one at a time so it
//! never holds up writers to other shards. The store performs no side
//! effects; broadcasting and publishing are the caller's job.

use std::fmt;

use dashmap::DashMap;
use tracing::trace;

use crate::errors::{BusError, Result};
use crate::value::WireValue;

/// Key of one entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EntryKey {
    /// First-level namespace.
    pub scope: String,
    /// Second-level name within the scope.
    pub id: String,
}

impl EntryKey {
    /// Build a key from borrowed parts.
    pub fn new(scope: &str, id: &str) -> Self {
        Self {
            scope: scope.to_owned(),
            id: id.to_owned(),
        }
    }
}

/// One `(scope, id, value)` record, as returned by [`Store::snapshot`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    /// Scope of the entry.
    pub scope: String,
    /// Id of the entry.
    pub id: String,
    /// Current value.
    pub value: WireValue,
}

/// Concurrent in-memory store of wire values.
#[derive(Default)]
pub struct Store {
    entries: DashMap<EntryKey, WireValue>,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl Store {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value, or `None` if the key was never set.
    pub fn get(&self, scope: &str, id: &str) -> Option<WireValue> {
        self.entries
            .get(&EntryKey::new(scope, id))
            .map(|entry| entry.value().clone())
    }

    /// Insert or replace a value.
    pub fn set(&self, scope: &str, id: &str, value: WireValue) {
        self.set_with(scope, id, value, |_| {});
    }

    /// Insert or replace a value, running `on_commit` while the entry is
    /// still locked.
    ///
    /// Writers to the same key are serialized on the entry lock, so the
    /// order in which `on_commit` observes values is the order they were
    /// stored in. `on_commit` must not touch this store.
    pub fn set_with<C>(&self, scope: &str, id: &str, value: WireValue, on_commit: C)
    where
        C: FnOnce(&WireValue),
    {
        let slot = self.entries.entry(EntryKey::new(scope, id)).insert(value);
        on_commit(slot.value());
    }

    /// Atomically replace the value of an existing key with `updater(current)`.
    ///
    /// Runs a compare-and-swap loop: the updater is applied outside any lock,
    /// and the result is only written if the entry still holds the value the
    /// updater saw. On a lost race the updater runs again against the fresh
    /// value, so it must be free of side effects.
    ///
    /// Fails with [`BusError::NotFound`] without calling the updater if the
    /// key is absent. An error from the updater aborts the update and leaves
    /// the entry untouched.
    pub fn try_update<F>(&self, scope: &str, id: &str, updater: F) -> Result<WireValue>
    where
        F: FnMut(&WireValue) -> Result<WireValue>,
    {
        self.try_update_with(scope, id, updater, |_| {})
    }

    /// [`try_update`](Self::try_update) with an `on_commit` hook that runs
    /// once, under the entry lock, for the value that was finally written.
    pub fn try_update_with<F, C>(
        &self,
        scope: &str,
        id: &str,
        mut updater: F,
        on_commit: C,
    ) -> Result<WireValue>
    where
        F: FnMut(&WireValue) -> Result<WireValue>,
        C: FnOnce(&WireValue),
    {
        let key = EntryKey::new(scope, id);
        loop {
            let current = self
                .entries
                .get(&key)
                .map(|entry| entry.value().clone())
                .ok_or_else(|| BusError::not_found(scope, id))?;

            let next = updater(&current)?;

            let mut slot = self
                .entries
                .get_mut(&key)
                .ok_or_else(|| BusError::not_found(scope, id))?;
            if slot.same_write(&current) {
                *slot = next.clone();
                on_commit(&next);
                return Ok(next);
            }
            drop(slot);
            trace!(scope, id, "entry changed during update, retrying");
        }
    }

    /// Every entry, each read atomically.
    ///
    /// Entries are read shard by shard, so two entries may reflect slightly
    /// different moments, but no single value is ever torn.
    pub fn snapshot(&self) -> Vec<Entry> {
        self.entries
            .iter()
            .map(|entry| Entry {
                scope: entry.key().scope.clone(),
                id: entry.key().id.clone(),
                value: entry.value().clone(),
            })
            .collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
