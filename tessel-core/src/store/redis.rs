use super::{ConfigRecord, ConfigStore};
use crate::key::namespace_prefix;
use crate::{ConfigKey, EncodedValue, Result, TesselError};
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

pub struct RedisConfigStore {
    conn: ConnectionManager,
    key_prefix: String,
}

impl RedisConfigStore {
    pub async fn new(url: &str, key_prefix: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|error| {
            TesselError::Config(format!("invalid redis url '{}': {}", url, error))
        })?;
        let conn = ConnectionManager::new(client).await?;

        tracing::info!("connected redis config store at {}", url);

        Ok(Self {
            conn,
            key_prefix: key_prefix.to_string(),
        })
    }
}

#[async_trait]
impl ConfigStore for RedisConfigStore {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &ConfigKey) -> Result<Option<EncodedValue>> {
        let mut conn = self.conn.clone();
        let payload: Option<Vec<u8>> = conn.get(key.storage_key(&self.key_prefix)).await?;

        payload
            .map(|payload| ConfigRecord::decode(&payload).map(|record| record.value))
            .transpose()
    }

    async fn put(&self, key: &ConfigKey, value: &EncodedValue) -> Result<()> {
        let payload = ConfigRecord::new(key, value).encode()?;
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key.storage_key(&self.key_prefix), payload)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &ConfigKey) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key.storage_key(&self.key_prefix)).await?;
        Ok(())
    }

    async fn list(&self, namespace: &str) -> Result<Vec<String>> {
        let prefix = namespace_prefix(&self.key_prefix, namespace);
        let pattern = format!("{}*", escape_glob(&prefix));

        let mut conn = self.conn.clone();
        let mut keys = Vec::new();
        {
            let mut iter = conn.scan_match::<_, String>(pattern).await?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }

        let mut paths: Vec<String> = keys
            .into_iter()
            .filter_map(|key| key.strip_prefix(&prefix).map(str::to_string))
            .filter(|path| !path.is_empty())
            .collect();
        paths.sort();
        paths.dedup();
        Ok(paths)
    }
}

/// Escape redis glob metacharacters so a prefix matches literally.
fn escape_glob(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
