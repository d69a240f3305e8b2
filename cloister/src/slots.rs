//! Hidden per-owner storage.
//!
//! A [`SlotTable`] is an insertion-ordered map from [`PropertyKey`] to
//! [`Value`]. It knows nothing about who may reach it: the only way to
//! obtain one is through a [`DefinitionToken`](crate::token::DefinitionToken).

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::value::{PropertyKey, Value};

#[derive(Default)]
pub struct SlotTable {
    entries: Mutex<IndexMap<PropertyKey, Value>>,
}

impl SlotTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &PropertyKey) -> Option<Value> {
        self.entries.lock().get(key).cloned()
    }

    /// Insert or overwrite. Any key is accepted.
    pub fn set(&self, key: PropertyKey, value: Value) {
        // The previous value is dropped after the lock is released.
        let _previous = self.entries.lock().insert(key, value);
    }

    pub fn has(&self, key: &PropertyKey) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Remove `key`, reporting whether it was present.
    pub fn delete(&self, key: &PropertyKey) -> bool {
        let removed = self.entries.lock().shift_remove(key);
        removed.is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Vec<PropertyKey> {
        self.entries.lock().keys().cloned().collect()
    }
}

impl std::fmt::Debug for SlotTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotTable")
            .field("keys", &self.keys())
            .finish()
    }
}
