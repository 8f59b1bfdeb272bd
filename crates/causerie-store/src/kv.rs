//! The key-value boundary consumed by the chat core.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::Result;

/// A durable string-keyed store. Identity bootstrap treats any failure
/// here as fatal, so implementations should not swallow errors.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// In-memory store for tests and throwaway sessions.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().expect("store lock").get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .expect("store lock")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_set_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("nick").unwrap(), None);

        store.set("nick", "steve").unwrap();
        assert_eq!(store.get("nick").unwrap(), Some("steve".to_string()));

        store.set("nick", "eve").unwrap();
        assert_eq!(store.get("nick").unwrap(), Some("eve".to_string()));
    }
}
