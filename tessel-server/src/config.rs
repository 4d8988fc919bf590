use serde::{Deserialize, Serialize};
use std::time::Duration;
use tessel_core::{Result, ServiceOptions, StoreBuilder, TesselError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Stable instance name for logs and events; a ULID is generated if unset.
    #[serde(default)]
    pub instance_id: Option<String>,
    pub store: StoreConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default = "default_publish_queue_capacity")]
    pub publish_queue_capacity: usize,
}

/// Backing store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    #[serde(default)]
    pub key_prefix: Option<String>,
    pub etcd: Option<EtcdConfig>,
    pub redis: Option<RedisConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Etcd,
    Redis,
    Memory,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Etcd => "etcd",
            Self::Redis => "redis",
            Self::Memory => "memory",
        }
    }
}

/// Change notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "default_notify_backend")]
    pub backend: NotifyBackend,
    #[serde(default = "default_topic")]
    pub topic: String,
    /// Falls back to `store.redis` when unset.
    pub redis: Option<RedisConfig>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            backend: default_notify_backend(),
            topic: default_topic(),
            redis: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyBackend {
    Redis,
    Memory,
}

impl NotifyBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Redis => "redis",
            Self::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtcdConfig {
    pub endpoints: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_duration_secs")]
    pub duration_secs: u64,
    #[serde(default = "default_cache_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            duration_secs: default_cache_duration_secs(),
            cleanup_interval_secs: default_cache_cleanup_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_timeout_ms")]
    pub store_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub publish_ms: u64,
    #[serde(default = "default_resubscribe_backoff_ms")]
    pub resubscribe_backoff_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            store_ms: default_timeout_ms(),
            publish_ms: default_timeout_ms(),
            resubscribe_backoff_ms: default_resubscribe_backoff_ms(),
        }
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_notify_backend() -> NotifyBackend {
    NotifyBackend::Memory
}

fn default_topic() -> String {
    tessel_core::notify::DEFAULT_TOPIC.to_string()
}

fn default_cache_duration_secs() -> u64 {
    5 * 60
}

fn default_cache_cleanup_interval_secs() -> u64 {
    2 * 60
}

fn default_timeout_ms() -> u64 {
    3000
}

fn default_resubscribe_backoff_ms() -> u64 {
    1000
}

fn default_publish_queue_capacity() -> usize {
    1024
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(path))
            .add_source(::config::Environment::with_prefix("TESSEL").separator("__"))
            .build()
            .map_err(|e| TesselError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| TesselError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Checks the settings a running instance cannot do without.
    pub fn validate(&self) -> Result<()> {
        match self.store.backend {
            StoreBackend::Etcd => {
                let endpoints = self
                    .store
                    .etcd
                    .as_ref()
                    .map(|etcd| etcd.endpoints.as_slice())
                    .unwrap_or_default();
                if endpoints.iter().all(|endpoint| endpoint.trim().is_empty()) {
                    return Err(TesselError::Config(
                        "etcd endpoints are required for etcd store backend".to_string(),
                    ));
                }
            }
            StoreBackend::Redis => {
                if self.store_redis_url().is_none() {
                    return Err(TesselError::Config(
                        "redis url is required for redis store backend".to_string(),
                    ));
                }
            }
            StoreBackend::Memory => {}
        }

        if self.notify.backend == NotifyBackend::Redis && self.notify_redis_url().is_none() {
            return Err(TesselError::Config(
                "redis url is required for redis notify backend".to_string(),
            ));
        }

        if self.cache.duration_secs == 0 {
            return Err(TesselError::Config(
                "cache.duration_secs must be positive".to_string(),
            ));
        }

        if self.cache.cleanup_interval_secs == 0 {
            return Err(TesselError::Config(
                "cache.cleanup_interval_secs must be positive".to_string(),
            ));
        }

        Ok(())
    }

    fn store_redis_url(&self) -> Option<&str> {
        self.store
            .redis
            .as_ref()
            .map(|redis| redis.url.trim())
            .filter(|url| !url.is_empty())
    }

    pub fn notify_redis_url(&self) -> Option<&str> {
        self.notify
            .redis
            .as_ref()
            .map(|redis| redis.url.trim())
            .filter(|url| !url.is_empty())
            .or_else(|| self.store_redis_url())
    }

    pub fn store_builder(&self) -> StoreBuilder {
        let mut builder = StoreBuilder::new().backend(self.store.backend.as_str());

        if let Some(prefix) = &self.store.key_prefix {
            builder = builder.key_prefix(prefix.as_str());
        }
        if let Some(etcd) = &self.store.etcd {
            builder = builder.etcd_endpoints(etcd.endpoints.clone());
        }
        if let Some(url) = self.store_redis_url() {
            builder = builder.redis_url(url);
        }

        builder
    }

    pub fn service_options(&self) -> ServiceOptions {
        let defaults = ServiceOptions::default();
        ServiceOptions {
            instance_id: self
                .instance_id
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
                .unwrap_or(defaults.instance_id),
            cache_duration: Duration::from_secs(self.cache.duration_secs),
            cache_cleanup_interval: Duration::from_secs(self.cache.cleanup_interval_secs),
            store_timeout: Duration::from_millis(self.timeouts.store_ms),
            publish_timeout: Duration::from_millis(self.timeouts.publish_ms),
            publish_queue_capacity: self.publish_queue_capacity,
            resubscribe_backoff: Duration::from_millis(self.timeouts.resubscribe_backoff_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Config {
        ::config::Config::builder()
            .add_source(::config::File::from_str(yaml, ::config::FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse("store:\n  backend: memory\n");
        config.validate().unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.notify.backend, NotifyBackend::Memory);
        assert_eq!(config.notify.topic, "tessel.config.watch");

        let options = config.service_options();
        assert_eq!(options.cache_duration, Duration::from_secs(300));
        assert_eq!(options.cache_cleanup_interval, Duration::from_secs(120));
        assert_eq!(options.store_timeout, Duration::from_secs(3));
        assert!(!options.instance_id.is_empty());
    }

    #[test]
    fn test_redis_store_requires_url() {
        let config = parse("store:\n  backend: redis\n");
        assert!(matches!(config.validate(), Err(TesselError::Config(_))));
    }

    #[test]
    fn test_notify_redis_falls_back_to_store_url() {
        let config = parse(
            "instance_id: node-a\nstore:\n  backend: redis\n  redis:\n    url: redis://127.0.0.1/\nnotify:\n  backend: redis\n",
        );
        config.validate().unwrap();
        assert_eq!(config.notify_redis_url(), Some("redis://127.0.0.1/"));
        assert_eq!(config.service_options().instance_id, "node-a");
    }

    #[test]
    fn test_etcd_requires_endpoints() {
        let config = parse("store:\n  backend: etcd\n  etcd:\n    endpoints: []\n");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_cache_duration_rejected() {
        let config = parse("store:\n  backend: memory\ncache:\n  duration_secs: 0\n");
        assert!(config.validate().is_err());
    }
}
