use super::with_deadline;
use crate::{
    CacheUpdate, ChangeEvent, ChangePublisher, ConfigKey, ConfigStore, EncodedValue, LocalCache,
    Result,
};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct UpdateConfigOperation {
    store: Arc<dyn ConfigStore>,
    cache: Arc<LocalCache>,
    publisher: ChangePublisher,
    instance_id: String,
    store_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct UpdateConfigOperationRequest {
    pub namespace: String,
    pub path: String,
    pub value: EncodedValue,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct UpdateConfigOperationResult {
    pub key: ConfigKey,
    pub cache_update: CacheUpdate,
    /// Whether the change event made it onto the publish queue.
    pub queued: bool,
}

impl UpdateConfigOperation {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        cache: Arc<LocalCache>,
        publisher: ChangePublisher,
        instance_id: impl Into<String>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            publisher,
            instance_id: instance_id.into(),
            store_timeout,
        }
    }

    /// Persist, then cache, then queue the change event. Only the store write
    /// decides success; a timeout leaves the outcome unknown.
    pub async fn run(
        &self,
        request: UpdateConfigOperationRequest,
    ) -> Result<UpdateConfigOperationResult> {
        let UpdateConfigOperationRequest {
            namespace,
            path,
            value,
            timeout,
        } = request;

        let key = ConfigKey::new(namespace, path)?;

        let deadline = timeout.unwrap_or(self.store_timeout);
        with_deadline(deadline, "store put", self.store.put(&key, &value)).await?;

        let cache_update = self.cache.write_through(&key, value.clone()).await;
        if cache_update == CacheUpdate::Evicted {
            tracing::info!(
                "cached value for {} is newer than written ts={}; evicted",
                key,
                value.timestamp()
            );
        }

        let queued = self
            .publisher
            .enqueue(ChangeEvent::put(key.clone(), value, self.instance_id.as_str()));

        Ok(UpdateConfigOperationResult {
            key,
            cache_update,
            queued,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BroadcastNotifier, ChangeNotifier, MemoryConfigStore, TesselError, ValueFormat};
    use futures_util::StreamExt;

    struct Fixture {
        store: Arc<MemoryConfigStore>,
        cache: Arc<LocalCache>,
        notifier: Arc<BroadcastNotifier>,
        operation: UpdateConfigOperation,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryConfigStore::new());
        let cache = Arc::new(LocalCache::new(Duration::from_secs(60)));
        let notifier = Arc::new(BroadcastNotifier::new("topic"));
        let (publisher, _) = ChangePublisher::spawn(notifier.clone(), 16, Duration::from_secs(1));
        let operation = UpdateConfigOperation::new(
            store.clone(),
            cache.clone(),
            publisher,
            "node-a",
            Duration::from_secs(1),
        );
        Fixture {
            store,
            cache,
            notifier,
            operation,
        }
    }

    fn request(path: &str, data: &'static str, timestamp: i64) -> UpdateConfigOperationRequest {
        UpdateConfigOperationRequest {
            namespace: "global".to_string(),
            path: path.to_string(),
            value: EncodedValue::new(data, ValueFormat::Json, "cli", timestamp),
            timeout: None,
        }
    }

    #[tokio::test]
    async fn test_update_persists_caches_and_publishes() {
        let fx = fixture();
        let mut events = fx.notifier.subscribe().await.unwrap();

        let result = fx.operation.run(request("feature.x", "true", 100)).await.unwrap();
        assert_eq!(result.cache_update, CacheUpdate::Applied);
        assert!(result.queued);

        let stored = fx.store.get(&result.key).await.unwrap().unwrap();
        assert_eq!(stored.data().as_ref(), b"true");
        assert_eq!(fx.cache.get(&result.key).await, Some(stored.clone()));

        let event = events.next().await.unwrap().unwrap();
        assert_eq!(event.key, result.key);
        assert_eq!(event.origin_timestamp, 100);
        assert_eq!(event.origin, "node-a");
    }

    #[tokio::test]
    async fn test_invalid_key_touches_nothing() {
        let fx = fixture();
        let err = fx.operation.run(request("", "true", 1)).await.unwrap_err();

        assert!(matches!(err, TesselError::InvalidRequest(_)));
        assert_eq!(fx.store.put_count(), 0);
        assert!(fx.cache.is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_skips_cache_and_publish() {
        let fx = fixture();
        fx.store.set_unavailable(true);

        let err = fx.operation.run(request("feature.x", "true", 1)).await.unwrap_err();
        assert!(err.is_transient());
        assert!(fx.cache.is_empty());

        tokio::task::yield_now().await;
        assert_eq!(fx.notifier.published_count(), 0);
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_fail_write() {
        let fx = fixture();
        fx.notifier.set_unavailable(true);

        let result = fx.operation.run(request("feature.x", "true", 1)).await.unwrap();
        assert!(fx.store.get(&result.key).await.unwrap().is_some());
        assert!(fx.cache.get(&result.key).await.is_some());
    }
}
