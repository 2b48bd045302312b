//! In-memory key-value store.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::store::KeyValueStore;

/// In-process store with no durability. Useful in tests and in embedders
/// that provide their own persistence behind the trait.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn update(&self, key: &str, value: Option<Value>) -> Result<()> {
        let mut records = self.records.write().await;
        match value {
            Some(value) => {
                records.insert(key.to_string(), value);
            }
            None => {
                records.remove(key);
            }
        }
        Ok(())
    }
}
