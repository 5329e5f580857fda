//! In-memory store used by tests and ephemeral sessions.

use std::collections::HashMap;
use std::sync::Mutex;

use super::{PersistentStore, StoreError};

/// Non-durable [`PersistentStore`] over a mutex-guarded map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistentStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_round_trip() {
        let store = MemoryStore::new();
        assert!(store.get("auth.tokens").expect("get").is_none());

        store.put("auth.tokens", "pair").expect("put");
        assert_eq!(
            store.get("auth.tokens").expect("get").as_deref(),
            Some("pair")
        );

        store.remove("auth.tokens").expect("remove");
        assert!(store.get("auth.tokens").expect("get").is_none());
    }
}
