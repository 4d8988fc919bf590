use super::{
    ConfigStore, DEFAULT_KEY_PREFIX, etcd::EtcdConfigStore, memory::MemoryConfigStore,
    redis::RedisConfigStore,
};
use crate::{Result, TesselError};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct StoreBuilder {
    backend: Option<String>,
    key_prefix: Option<String>,
    etcd_endpoints: Option<Vec<String>>,
    redis_url: Option<String>,
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = Some(backend.into());
        self
    }

    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    pub fn etcd_endpoints(mut self, endpoints: Vec<String>) -> Self {
        self.etcd_endpoints = Some(endpoints);
        self
    }

    pub fn redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = Some(url.into());
        self
    }

    fn resolve_key_prefix(&self) -> String {
        self.key_prefix
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_KEY_PREFIX)
            .to_string()
    }

    fn resolve_backend(&self) -> Result<String> {
        let backend = self
            .backend
            .as_deref()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if backend.is_empty() {
            return Err(TesselError::Config(
                "store backend cannot be empty".to_string(),
            ));
        }

        Ok(backend)
    }

    pub async fn build(&self) -> Result<Arc<dyn ConfigStore>> {
        let key_prefix = self.resolve_key_prefix();
        let backend = self.resolve_backend()?;

        match backend.as_str() {
            "etcd" => {
                let endpoints: Vec<String> = self
                    .etcd_endpoints
                    .clone()
                    .ok_or_else(|| {
                        TesselError::Config(
                            "etcd endpoints are required for etcd backend".to_string(),
                        )
                    })?
                    .into_iter()
                    .map(|endpoint| endpoint.trim().to_string())
                    .filter(|endpoint| !endpoint.is_empty())
                    .collect();

                if endpoints.is_empty() {
                    return Err(TesselError::Config(
                        "etcd endpoints cannot be empty for etcd backend".to_string(),
                    ));
                }

                let store = EtcdConfigStore::new(&endpoints, &key_prefix).await?;
                Ok(Arc::new(store))
            }
            "redis" => {
                let url = self.redis_url.as_deref().unwrap_or_default().trim();
                if url.is_empty() {
                    return Err(TesselError::Config(
                        "redis url is required for redis backend".to_string(),
                    ));
                }

                let store = RedisConfigStore::new(url, &key_prefix).await?;
                Ok(Arc::new(store))
            }
            "memory" => Ok(Arc::new(MemoryConfigStore::new())),
            other => Err(TesselError::Config(format!(
                "unsupported store backend: {}",
                other
            ))),
        }
    }
}
