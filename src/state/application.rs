//! Process-wide application store.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::state::{lock, StoreValue};

/// Flat key → value map shared by every request.
#[derive(Debug, Default)]
pub struct ApplicationStore {
    entries: Mutex<HashMap<String, StoreValue>>,
}

impl ApplicationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: &str, value: StoreValue) {
        if key.is_empty() {
            return;
        }
        lock(&self.entries).insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<StoreValue> {
        if key.is_empty() {
            return None;
        }
        lock(&self.entries).get(key).cloned()
    }

    pub fn remove(&self, key: &str) {
        if key.is_empty() {
            return;
        }
        lock(&self.entries).remove(key);
    }
}
