use super::with_deadline;
use crate::{ConfigKey, ConfigStore, EncodedValue, LocalCache, Result};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct ReadConfigOperation {
    store: Arc<dyn ConfigStore>,
    cache: Arc<LocalCache>,
    store_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ReadConfigOperationRequest {
    pub namespace: String,
    pub path: String,
    /// Overrides the default store deadline.
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadConfigOperationOutcome {
    Found(EncodedValue),
    NotFound,
}

impl ReadConfigOperation {
    pub fn new(store: Arc<dyn ConfigStore>, cache: Arc<LocalCache>, store_timeout: Duration) -> Self {
        Self {
            store,
            cache,
            store_timeout,
        }
    }

    pub async fn run(&self, request: ReadConfigOperationRequest) -> Result<ReadConfigOperationOutcome> {
        let ReadConfigOperationRequest {
            namespace,
            path,
            timeout,
        } = request;

        let key = ConfigKey::new(namespace, path)?;

        // taken before the cache lookup so a write racing the store call wins
        let since = self.cache.generation();
        if let Some(value) = self.cache.get(&key).await {
            tracing::debug!("cache hit for {}", key);
            return Ok(found_or_absent(value));
        }

        let deadline = timeout.unwrap_or(self.store_timeout);
        let stored = with_deadline(deadline, "store get", self.store.get(&key)).await?;

        let Some(value) = stored else {
            tracing::debug!("{} not found in {} store", key, self.store.backend_name());
            return Ok(ReadConfigOperationOutcome::NotFound);
        };

        if value.is_null_like() {
            return Ok(ReadConfigOperationOutcome::NotFound);
        }

        self.cache.populate(&key, value.clone(), since).await;
        Ok(ReadConfigOperationOutcome::Found(value))
    }
}

fn found_or_absent(value: EncodedValue) -> ReadConfigOperationOutcome {
    if value.is_null_like() {
        ReadConfigOperationOutcome::NotFound
    } else {
        ReadConfigOperationOutcome::Found(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::{
        DeleteConfigOperation, DeleteConfigOperationRequest, UpdateConfigOperation,
        UpdateConfigOperationRequest,
    };
    use crate::{BroadcastNotifier, ChangePublisher, MemoryConfigStore, TesselError, ValueFormat};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Notify;

    fn request(path: &str) -> ReadConfigOperationRequest {
        ReadConfigOperationRequest {
            namespace: "global".to_string(),
            path: path.to_string(),
            timeout: None,
        }
    }

    fn setup() -> (Arc<MemoryConfigStore>, Arc<LocalCache>, ReadConfigOperation) {
        let store = Arc::new(MemoryConfigStore::new());
        let cache = Arc::new(LocalCache::new(Duration::from_secs(60)));
        let operation = ReadConfigOperation::new(store.clone(), cache.clone(), Duration::from_secs(1));
        (store, cache, operation)
    }

    #[tokio::test]
    async fn test_absent_key_is_not_found() {
        let (_, _, operation) = setup();
        let outcome = operation.run(request("missing")).await.unwrap();
        assert_eq!(outcome, ReadConfigOperationOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_empty_path_rejected_before_io() {
        let (store, _, operation) = setup();
        let err = operation.run(request("")).await.unwrap_err();
        assert!(matches!(err, TesselError::InvalidRequest(_)));
        assert_eq!(store.get_count(), 0);
    }

    #[tokio::test]
    async fn test_miss_populates_cache_and_hit_skips_store() {
        let (store, cache, operation) = setup();
        let key = ConfigKey::in_default_namespace("feature.x").unwrap();
        let value = EncodedValue::new("true", ValueFormat::Json, "cli", 100);
        store.put(&key, &value).await.unwrap();

        let first = operation.run(request("feature.x")).await.unwrap();
        assert_eq!(first, ReadConfigOperationOutcome::Found(value.clone()));
        assert_eq!(store.get_count(), 1);
        assert_eq!(cache.get(&key).await, Some(value.clone()));

        let second = operation.run(request("feature.x")).await.unwrap();
        assert_eq!(second, ReadConfigOperationOutcome::Found(value));
        assert_eq!(store.get_count(), 1);
    }

    #[tokio::test]
    async fn test_null_payload_reads_as_not_found() {
        let (store, cache, operation) = setup();
        let key = ConfigKey::in_default_namespace("cleared").unwrap();
        store
            .put(&key, &EncodedValue::new("null", ValueFormat::Json, "cli", 1))
            .await
            .unwrap();

        let outcome = operation.run(request("cleared")).await.unwrap();
        assert_eq!(outcome, ReadConfigOperationOutcome::NotFound);
        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_store_failure_is_not_not_found() {
        let (store, _, operation) = setup();
        store.set_unavailable(true);

        let err = operation.run(request("feature.x")).await.unwrap_err();
        assert!(err.is_transient());
    }

    struct StalledStore;

    #[async_trait]
    impl ConfigStore for StalledStore {
        fn backend_name(&self) -> &'static str {
            "stalled"
        }

        async fn get(&self, _key: &ConfigKey) -> Result<Option<EncodedValue>> {
            std::future::pending().await
        }

        async fn put(&self, _key: &ConfigKey, _value: &EncodedValue) -> Result<()> {
            std::future::pending().await
        }

        async fn delete(&self, _key: &ConfigKey) -> Result<()> {
            std::future::pending().await
        }

        async fn list(&self, _namespace: &str) -> Result<Vec<String>> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_timeout_is_transient_failure() {
        let cache = Arc::new(LocalCache::new(Duration::from_secs(60)));
        let operation = ReadConfigOperation::new(Arc::new(StalledStore), cache, Duration::from_secs(3));

        let mut req = request("feature.x");
        req.timeout = Some(Duration::from_millis(50));
        let err = operation.run(req).await.unwrap_err();

        assert!(matches!(err, TesselError::Timeout(_)));
        assert!(err.is_transient());
    }

    /// Holds the first `get` after reading the value until released.
    struct GatedStore {
        inner: MemoryConfigStore,
        gated: AtomicBool,
        entered: Notify,
        release: Notify,
    }

    impl GatedStore {
        fn new() -> Self {
            Self {
                inner: MemoryConfigStore::new(),
                gated: AtomicBool::new(true),
                entered: Notify::new(),
                release: Notify::new(),
            }
        }
    }

    #[async_trait]
    impl ConfigStore for GatedStore {
        fn backend_name(&self) -> &'static str {
            "gated"
        }

        async fn get(&self, key: &ConfigKey) -> Result<Option<EncodedValue>> {
            let value = self.inner.get(key).await?;
            if self.gated.swap(false, Ordering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
            }
            Ok(value)
        }

        async fn put(&self, key: &ConfigKey, value: &EncodedValue) -> Result<()> {
            self.inner.put(key, value).await
        }

        async fn delete(&self, key: &ConfigKey) -> Result<()> {
            self.inner.delete(key).await
        }

        async fn list(&self, namespace: &str) -> Result<Vec<String>> {
            self.inner.list(namespace).await
        }
    }

    fn publisher() -> ChangePublisher {
        let (publisher, _) = ChangePublisher::spawn(
            Arc::new(BroadcastNotifier::new("topic")),
            16,
            Duration::from_secs(1),
        );
        publisher
    }

    #[tokio::test]
    async fn test_slow_read_does_not_resurrect_deleted_key() {
        let store = Arc::new(GatedStore::new());
        let cache = Arc::new(LocalCache::new(Duration::from_secs(60)));
        let key = ConfigKey::in_default_namespace("k").unwrap();
        store
            .inner
            .put(&key, &EncodedValue::new("old", ValueFormat::Json, "cli", 10))
            .await
            .unwrap();

        let read = ReadConfigOperation::new(store.clone(), cache.clone(), Duration::from_secs(5));
        let delete = DeleteConfigOperation::new(
            store.clone(),
            cache.clone(),
            publisher(),
            "node-a",
            Duration::from_secs(5),
        );

        let slow_read = tokio::spawn({
            let read = read.clone();
            async move { read.run(request("k")).await }
        });
        store.entered.notified().await;

        delete
            .run(DeleteConfigOperationRequest {
                namespace: "global".to_string(),
                path: "k".to_string(),
                timeout: None,
            })
            .await
            .unwrap();
        store.release.notify_one();
        slow_read.await.unwrap().unwrap();

        assert!(cache.get(&key).await.is_none());
        let outcome = read.run(request("k")).await.unwrap();
        assert_eq!(outcome, ReadConfigOperationOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_slow_read_does_not_shadow_same_second_write() {
        let store = Arc::new(GatedStore::new());
        let cache = Arc::new(LocalCache::new(Duration::from_secs(60)));
        let key = ConfigKey::in_default_namespace("k").unwrap();
        store
            .inner
            .put(&key, &EncodedValue::new("v1", ValueFormat::Json, "cli", 10))
            .await
            .unwrap();

        let read = ReadConfigOperation::new(store.clone(), cache.clone(), Duration::from_secs(5));
        let update = UpdateConfigOperation::new(
            store.clone(),
            cache.clone(),
            publisher(),
            "node-a",
            Duration::from_secs(5),
        );

        let slow_read = tokio::spawn({
            let read = read.clone();
            async move { read.run(request("k")).await }
        });
        store.entered.notified().await;

        update
            .run(UpdateConfigOperationRequest {
                namespace: "global".to_string(),
                path: "k".to_string(),
                value: EncodedValue::new("v2", ValueFormat::Json, "cli", 10),
                timeout: None,
            })
            .await
            .unwrap();
        store.release.notify_one();
        slow_read.await.unwrap().unwrap();

        let outcome = read.run(request("k")).await.unwrap();
        let ReadConfigOperationOutcome::Found(value) = outcome else {
            panic!("expected value");
        };
        assert_eq!(value.data().as_ref(), b"v2");
    }
}
