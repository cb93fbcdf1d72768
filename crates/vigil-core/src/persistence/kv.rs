//! Key-addressed durable store abstraction and an in-memory implementation.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{VigilError, VigilResult};

/// Durable key-value storage for serialized aggregates.
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` if the key was never written.
    fn get(&self, key: &str) -> VigilResult<Option<String>>;

    /// Write a value, replacing any previous one.
    ///
    /// Fails with [`VigilError::CapacityExceeded`] when the store is full.
    fn set(&self, key: &str, value: &str) -> VigilResult<()>;

    /// Delete a value. Missing keys are not an error.
    fn remove(&self, key: &str) -> VigilResult<()>;
}

/// Process-local store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    max_value_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes of values larger than `bytes`.
    pub fn with_max_value_bytes(mut self, bytes: usize) -> Self {
        self.max_value_bytes = Some(bytes);
        self
    }

    pub fn len(&self) -> usize {
        self.values.lock().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> VigilResult<Option<String>> {
        let values = self
            .values
            .lock()
            .map_err(|e| VigilError::storage(e.to_string()))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> VigilResult<()> {
        if let Some(limit) = self.max_value_bytes {
            if value.len() > limit {
                return Err(VigilError::capacity(value.len(), limit));
            }
        }
        let mut values = self
            .values
            .lock()
            .map_err(|e| VigilError::storage(e.to_string()))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> VigilResult<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|e| VigilError::storage(e.to_string()))?;
        values.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").unwrap(), None);

        store.set("k", "v1").unwrap();
        store.set("k", "v2").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v2"));
        assert_eq!(store.len(), 1);

        store.remove("k").unwrap();
        store.remove("k").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_capacity() {
        let store = MemoryStore::new().with_max_value_bytes(4);
        store.set("k", "1234").unwrap();
        let err = store.set("k", "12345").unwrap_err();
        assert!(err.is_capacity_exceeded());
        assert_eq!(store.get("k").unwrap().as_deref(), Some("1234"));
    }
}
