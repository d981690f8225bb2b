//! In-memory data store, the reference persistence collaborator.
//!
//! Good enough for demos and tests; real hosts bring their own
//! [`DataStore`] backed by whatever storage they have.

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value;

use crate::entities::traits::DataStore;

/// HashMap-backed store keyed by (scope, key)
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<(String, String), Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored values across all scopes
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DataStore for MemoryStore {
    fn get(&self, scope_id: &str, key: &str) -> anyhow::Result<Option<Value>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        Ok(entries
            .get(&(scope_id.to_string(), key.to_string()))
            .cloned())
    }

    fn set(&self, scope_id: &str, key: &str, value: Value) -> anyhow::Result<bool> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert((scope_id.to_string(), key.to_string()), value);
        Ok(true)
    }
}
