use super::with_deadline;
use crate::{ChangeEvent, ChangePublisher, ConfigKey, ConfigStore, LocalCache, Result};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct DeleteConfigOperation {
    store: Arc<dyn ConfigStore>,
    cache: Arc<LocalCache>,
    publisher: ChangePublisher,
    instance_id: String,
    store_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct DeleteConfigOperationRequest {
    pub namespace: String,
    pub path: String,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct DeleteConfigOperationResult {
    pub key: ConfigKey,
    pub queued: bool,
}

impl DeleteConfigOperation {
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

    /// Delete from the store, then mark the key deleted in the cache and
    /// queue a tombstone. Nothing is evicted or published unless the store
    /// delete succeeded.
    pub async fn run(
        &self,
        request: DeleteConfigOperationRequest,
    ) -> Result<DeleteConfigOperationResult> {
        let DeleteConfigOperationRequest {
            namespace,
            path,
            timeout,
        } = request;

        let key = ConfigKey::new(namespace, path)?;

        let deadline = timeout.unwrap_or(self.store_timeout);
        with_deadline(deadline, "store delete", self.store.delete(&key)).await?;

        let tombstone = ChangeEvent::tombstone(key.clone(), self.instance_id.as_str());
        self.cache.mark_deleted(&key, tombstone.origin_timestamp).await;

        let queued = self.publisher.enqueue(tombstone);

        Ok(DeleteConfigOperationResult { key, queued })
    }
}
