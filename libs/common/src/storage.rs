//! Key-value storage abstraction
//!
//! Stands in for the browser's local storage: session tokens, recent
//! searches, and the search log are persisted through this trait. The
//! original web client assumes a single writer (one tab), and so does this
//! abstraction; there is no cross-process coordination.

use std::collections::HashMap;
use std::sync::Mutex;

/// Persistent string key-value store
pub trait KeyValueStore: Send + Sync {
    /// Get the value stored under `key`, if any
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str);

    /// Remove the value stored under `key`
    fn remove(&self, key: &str);

    /// Remove every stored value
    fn clear(&self);
}

/// In-memory store, the default backend
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
    }

    fn clear(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove() {
        let store = MemoryStore::new();

        store.set("token", "abc");
        assert_eq!(store.get("token"), Some("abc".to_string()));

        store.set("token", "def");
        assert_eq!(store.get("token"), Some("def".to_string()));

        store.remove("token");
        assert_eq!(store.get("token"), None);
    }

    #[test]
    fn clear_removes_everything() {
        let store = MemoryStore::new();
        store.set("a", "1");
        store.set("b", "2");

        store.clear();

        assert_eq!(store.get("a"), None);
        assert_eq!(store.get("b"), None);
    }
}
