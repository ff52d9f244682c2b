//! Shared variable store for run state.

use crate::errors::StoreConflictError;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

/// Thread-safe, single-assignment mapping from variable name to produced
/// value, shared by reference across one run.
///
/// The store is seeded with externally supplied values before wave 0 and
/// each wave's outputs are merged in one batch at the wave boundary, so a
/// wave never observes a sibling's writes. A name, once written, is never
/// overwritten or removed for the rest of the run; after a failed run the
/// entries written by completed waves stay readable for diagnostics.
#[derive(Debug, Default)]
pub struct VariableStore {
    values: RwLock<HashMap<String, serde_json::Value>>,
}

impl VariableStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with pre-satisfied entries.
    #[must_use]
    pub fn seeded(entries: impl IntoIterator<Item = (String, serde_json::Value)>) -> Self {
        Self {
            values: RwLock::new(entries.into_iter().collect()),
        }
    }

    /// Reads a value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<serde_json::Value> {
        self.values.read().get(name).cloned()
    }

    /// Checks whether a name has been written.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.read().contains_key(name)
    }

    /// Writes a single value.
    ///
    /// # Errors
    ///
    /// Returns `StoreConflictError` if the name was already written.
    pub fn insert(
        &self,
        name: impl Into<String>,
        value: serde_json::Value,
    ) -> Result<(), StoreConflictError> {
        let name = name.into();
        let mut values = self.values.write();

        if values.contains_key(&name) {
            return Err(StoreConflictError::new(name));
        }
        values.insert(name, value);
        Ok(())
    }

    /// Merges a wave's outputs in one batch.
    ///
    /// The whole batch is validated before the first write, so either every
    /// entry lands or the store is untouched.
    ///
    /// # Errors
    ///
    /// Returns `StoreConflictError` on the first name that was already
    /// written, or that appears twice within the batch.
    pub fn insert_batch(
        &self,
        entries: Vec<(String, serde_json::Value)>,
    ) -> Result<(), StoreConflictError> {
        let mut values = self.values.write();

        let mut incoming: HashSet<&str> = HashSet::with_capacity(entries.len());
        for (name, _) in &entries {
            if values.contains_key(name) || !incoming.insert(name) {
                return Err(StoreConflictError::new(name.clone()));
            }
        }

        values.extend(entries);
        Ok(())
    }

    /// All written names.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.values.read().keys().cloned().collect()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    /// Returns true when nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }

    /// Returns a copy of all entries.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, serde_json::Value> {
        self.values.read().clone()
    }
}

impl Clone for VariableStore {
    fn clone(&self) -> Self {
        Self {
            values: RwLock::new(self.values.read().clone()),
        }
    }
}
