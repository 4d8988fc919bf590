//! Backing store adapters.
//!
//! The backing store is the source of truth for config entries. Adapters
//! report an absent entry as `Ok(None)` and infrastructure trouble as `Err`.

pub mod etcd;
pub mod factory;
pub mod memory;
pub mod redis;

use crate::{ConfigKey, EncodedValue, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use etcd::EtcdConfigStore;
pub use factory::StoreBuilder;
pub use memory::MemoryConfigStore;
pub use redis::RedisConfigStore;

/// Default prefix for storage keys.
pub const DEFAULT_KEY_PREFIX: &str = "tessel";

#[async_trait]
pub trait ConfigStore: Send + Sync {
    fn backend_name(&self) -> &'static str;

    async fn get(&self, key: &ConfigKey) -> Result<Option<EncodedValue>>;

    async fn put(&self, key: &ConfigKey, value: &EncodedValue) -> Result<()>;

    /// Deleting an absent key succeeds.
    async fn delete(&self, key: &ConfigKey) -> Result<()>;

    /// Paths stored under `namespace`, sorted.
    async fn list(&self, namespace: &str) -> Result<Vec<String>>;
}

/// Persisted form of a config entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigRecord {
    pub namespace: String,
    pub path: String,
    #[serde(flatten)]
    pub value: EncodedValue,
}

impl ConfigRecord {
    pub fn new(key: &ConfigKey, value: &EncodedValue) -> Self {
        Self {
            namespace: key.namespace().to_string(),
            path: key.path().to_string(),
            value: value.clone(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ValueFormat;

    #[test]
    fn test_record_layout() {
        let key = ConfigKey::new("tenant-a", "feature.x").unwrap();
        let value = EncodedValue::new("true", ValueFormat::Json, "cli", 100);
        let payload = ConfigRecord::new(&key, &value).encode().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&payload).unwrap();

        assert_eq!(json["namespace"], "tenant-a");
        assert_eq!(json["path"], "feature.x");
        assert_eq!(json["data"], "dHJ1ZQ==");
        assert_eq!(json["timestamp"], 100);

        let record = ConfigRecord::decode(&payload).unwrap();
        assert_eq!(record.value, value);
    }
}
