//! Local key-value persistence
//!
//! The core treats local state (theme choice, favorites mirror) as an
//! opaque string store; hosts plug in whatever storage they have.

use std::collections::HashMap;
use std::sync::Mutex;

/// Well-known store keys
pub const THEME_KEY: &str = "ottr_theme";
pub const FAVORITES_KEY: &str = "ottr_favorites";

/// Minimal string key-value store seam
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// In-memory store, also the test double
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().expect("store lock").get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values
            .lock()
            .expect("store lock")
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.values.lock().expect("store lock").remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trips() {
        let store = MemoryStore::new();
        assert!(store.get(THEME_KEY).is_none());
        store.set(THEME_KEY, "dark");
        assert_eq!(store.get(THEME_KEY).as_deref(), Some("dark"));
        store.remove(THEME_KEY);
        assert!(store.get(THEME_KEY).is_none());
    }
}
