//! Shared variable store driving stateful stubs.
//!
//! Stubs read the store through `stub-only-if` and write it through
//! `stub-set`. Values live for the lifetime of the store; nothing expires.
//!
//! Concurrent dispatches may interleave their reads and writes. When two
//! requests race, the outcome for a gated stub depends on timing and the
//! only guarantee is last writer wins per key.

use parking_lot::RwLock;
use std::collections::HashMap;

/// Backend-agnostic variable storage.
pub trait StateStore: Send + Sync {
    /// Current value of `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Overwrite `key` with `value`.
    fn set(&self, key: &str, value: &str);

    /// Remove every variable.
    fn reset(&self);

    /// Copy of all variables.
    fn snapshot(&self) -> HashMap<String, String>;

    /// True if every `(key, value)` equals the stored value. A missing key
    /// never satisfies a condition, not even an empty expected value.
    fn satisfies(&self, conditions: &HashMap<String, String>) -> bool {
        conditions
            .iter()
            .all(|(key, value)| self.get(key).as_deref() == Some(value.as_str()))
    }

    /// Write every `(key, value)` pair.
    fn apply(&self, updates: &HashMap<String, String>) {
        for (key, value) in updates {
            self.set(key, value);
        }
    }
}

/// In-memory implementation of [`StateStore`].
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    variables: RwLock<HashMap<String, String>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for InMemoryStateStore {
    fn get(&self, key: &str) -> Option<String> {
        self.variables.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.variables
            .write()
            .insert(key.to_string(), value.to_string());
    }

    fn reset(&self) {
        self.variables.write().clear();
    }

    fn snapshot(&self) -> HashMap<String, String> {
        self.variables.read().clone()
    }

    fn satisfies(&self, conditions: &HashMap<String, String>) -> bool {
        let variables = self.variables.read();
        conditions
            .iter()
            .all(|(key, value)| variables.get(key) == Some(value))
    }

    fn apply(&self, updates: &HashMap<String, String>) {
        if updates.is_empty() {
            return;
        }
        let mut variables = self.variables.write();
        for (key, value) in updates {
            variables.insert(key.clone(), value.clone());
        }
    }
}
