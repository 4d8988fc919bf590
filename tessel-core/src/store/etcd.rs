use super::{ConfigRecord, ConfigStore};
use crate::key::namespace_prefix;
use crate::{ConfigKey, EncodedValue, Result};
use async_trait::async_trait;
use etcd_client::{Client, GetOptions};

pub struct EtcdConfigStore {
    client: Client,
    key_prefix: String,
}

impl EtcdConfigStore {
    pub async fn new(endpoints: &[String], key_prefix: &str) -> Result<Self> {
        let client = Client::connect(endpoints, None).await?;

        tracing::info!("connected etcd config store at {:?}", endpoints);

        Ok(Self {
            client,
            key_prefix: key_prefix.to_string(),
        })
    }
}

#[async_trait]
impl ConfigStore for EtcdConfigStore {
    fn backend_name(&self) -> &'static str {
        "etcd"
    }

    async fn get(&self, key: &ConfigKey) -> Result<Option<EncodedValue>> {
        let mut kv = self.client.kv_client();
        let response = kv.get(key.storage_key(&self.key_prefix), None).await?;

        response
            .kvs()
            .first()
            .map(|entry| ConfigRecord::decode(entry.value()).map(|record| record.value))
            .transpose()
    }

    async fn put(&self, key: &ConfigKey, value: &EncodedValue) -> Result<()> {
        let payload = ConfigRecord::new(key, value).encode()?;
        let mut kv = self.client.kv_client();
        kv.put(key.storage_key(&self.key_prefix), payload, None)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &ConfigKey) -> Result<()> {
        let mut kv = self.client.kv_client();
        kv.delete(key.storage_key(&self.key_prefix), None).await?;
        Ok(())
    }

    async fn list(&self, namespace: &str) -> Result<Vec<String>> {
        let prefix = namespace_prefix(&self.key_prefix, namespace);
        let mut kv = self.client.kv_client();
        let response = kv
            .get(
                prefix.as_str(),
                Some(GetOptions::new().with_prefix().with_keys_only()),
            )
            .await?;

        let mut paths: Vec<String> = response
            .kvs()
            .iter()
            .filter_map(|entry| {
                String::from_utf8_lossy(entry.key())
                    .strip_prefix(prefix.as_str())
                    .map(str::to_string)
            })
            .filter(|path| !path.is_empty())
            .collect();
        paths.sort();
        Ok(paths)
    }
}
