//! Configuration store capability.
//!
//! The host editor owns configuration; the core only reads and writes
//! through this seam. Reads must reflect earlier writes immediately; the
//! settings reconciliation in [`crate::settings`] depends on read-after-write
//! consistency.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

/// Host configuration access.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Read a configuration value. Unset keys read as `Value::Null`.
    async fn get(&self, key: &str) -> Result<Value>;

    /// Write a configuration value, visible to subsequent `get` calls.
    async fn set(&self, key: &str, value: Value) -> Result<()>;
}

/// In-memory configuration, for tests and headless embedders.
#[derive(Default)]
pub struct MemoryConfig {
    values: RwLock<HashMap<String, Value>>,
}

impl MemoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an initial set of values.
    pub async fn seed(&self, values: impl IntoIterator<Item = (String, Value)>) {
        self.values.write().await.extend(values);
    }
}

#[async_trait]
impl ConfigStore for MemoryConfig {
    async fn get(&self, key: &str) -> Result<Value> {
        Ok(self
            .values
            .read()
            .await
            .get(key)
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.values.write().await.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_read_after_write() {
        let config = MemoryConfig::new();
        assert_eq!(config.get("editor.zoom").await.unwrap(), Value::Null);

        config.set("editor.zoom", json!(1.5)).await.unwrap();
        assert_eq!(config.get("editor.zoom").await.unwrap(), json!(1.5));
    }
}
