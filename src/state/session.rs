//! Per-session store.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::state::{lock, StoreValue};

/// Session id → (key → value). Sub-maps are created on first write.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, HashMap<String, StoreValue>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, session_id: &str, key: &str, value: StoreValue) {
        if session_id.is_empty() || key.is_empty() {
            return;
        }

        lock(&self.sessions)
            .entry(session_id.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    pub fn get(&self, session_id: &str, key: &str) -> Option<StoreValue> {
        if session_id.is_empty() || key.is_empty() {
            return None;
        }

        lock(&self.sessions)
            .get(session_id)
            .and_then(|entries| entries.get(key))
            .cloned()
    }

    /// Remove one key. Missing sessions and keys are ignored.
    pub fn remove(&self, session_id: &str, key: &str) {
        if session_id.is_empty() || key.is_empty() {
            return;
        }

        if let Some(entries) = lock(&self.sessions).get_mut(session_id) {
            entries.remove(key);
        }
    }

    /// Number of sessions that have ever been written to.
    pub fn session_count(&self) -> usize {
        lock(&self.sessions).len()
    }
}
