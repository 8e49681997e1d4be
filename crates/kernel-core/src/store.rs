//! Key/Value Store
//!
//! Externalized persistence capability injected into tools that need to
//! remember something between tasks. The kernel itself stores nothing.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Save/load capability for tools
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Store a value, replacing any previous one
    async fn save(&self, key: &str, value: Value) -> Result<()>;

    /// Load a value by key
    async fn load(&self, key: &str) -> Result<Option<Value>>;
}

/// In-memory store (for development/testing)
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn save(&self, key: &str, value: Value) -> Result<()> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<Value>> {
        Ok(self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::new();
        store.save("scan_target_1", json!("example.com")).await.unwrap();
        store.save("scan_target_1", json!("example.org")).await.unwrap();

        assert_eq!(store.load("scan_target_1").await.unwrap(), Some(json!("example.org")));
        assert_eq!(store.load("missing").await.unwrap(), None);
        assert_eq!(store.len(), 1);
    }
}
