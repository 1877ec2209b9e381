//! Key/value storage scoped to the lifetime of the server process.
//!
//! The server-side counterpart of browser session storage: values survive
//! for as long as the process runs and are gone after a restart.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// String key/value store.
pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
    fn remove(&self, key: &str);
}

/// In-memory [`SessionStorage`].
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: String) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value);
    }

    fn remove(&self, key: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("k"), None);

        storage.set("k", "v1".to_string());
        storage.set("k", "v2".to_string());
        assert_eq!(storage.get("k").as_deref(), Some("v2"));

        storage.remove("k");
        storage.remove("k");
        assert_eq!(storage.get("k"), None);
    }
}
