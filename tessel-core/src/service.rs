//! Config Core: the read / write / delete / apply entry points of one
//! service instance, wired over a store, a notifier, and a local cache.

use crate::operations::{
    ApplyChangeOperation, ApplyChangeOperationOutcome, DeleteConfigOperation,
    DeleteConfigOperationRequest, DeleteConfigOperationResult, ListConfigOperation,
    ListConfigOperationRequest, ReadConfigOperation, ReadConfigOperationOutcome,
    ReadConfigOperationRequest, UpdateConfigOperation, UpdateConfigOperationRequest,
    UpdateConfigOperationResult,
};
use crate::{
    ChangeEvent, ChangeListener, ChangeNotifier, ChangePublisher, ConfigStore, LocalCache,
    Result, ServiceOptions,
};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct ConfigService {
    options: ServiceOptions,
    store: Arc<dyn ConfigStore>,
    notifier: Arc<dyn ChangeNotifier>,
    cache: Arc<LocalCache>,
    read: ReadConfigOperation,
    update: UpdateConfigOperation,
    delete: DeleteConfigOperation,
    list: ListConfigOperation,
    apply: ApplyChangeOperation,
}

impl ConfigService {
    /// Build the service and start its publisher and cache sweeper tasks.
    /// Must be called inside a tokio runtime.
    pub fn new(
        store: Arc<dyn ConfigStore>,
        notifier: Arc<dyn ChangeNotifier>,
        options: &ServiceOptions,
    ) -> Self {
        let cache = Arc::new(LocalCache::new(options.cache_duration));
        cache.spawn_sweeper(options.cache_cleanup_interval);

        let (publisher, _) = ChangePublisher::spawn(
            notifier.clone(),
            options.publish_queue_capacity,
            options.publish_timeout,
        );

        tracing::info!(
            "config service {} using {} store and {} notifier (cache ttl {:?})",
            options.instance_id,
            store.backend_name(),
            notifier.backend_name(),
            options.cache_duration
        );

        Self {
            read: ReadConfigOperation::new(store.clone(), cache.clone(), options.store_timeout),
            update: UpdateConfigOperation::new(
                store.clone(),
                cache.clone(),
                publisher.clone(),
                options.instance_id.as_str(),
                options.store_timeout,
            ),
            delete: DeleteConfigOperation::new(
                store.clone(),
                cache.clone(),
                publisher,
                options.instance_id.as_str(),
                options.store_timeout,
            ),
            list: ListConfigOperation::new(store.clone(), options.store_timeout),
            apply: ApplyChangeOperation::new(cache.clone()),
            options: options.clone(),
            store,
            notifier,
            cache,
        }
    }

    pub fn options(&self) -> &ServiceOptions {
        &self.options
    }

    pub fn instance_id(&self) -> &str {
        &self.options.instance_id
    }

    pub fn store(&self) -> &Arc<dyn ConfigStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<LocalCache> {
        &self.cache
    }

    pub async fn read(
        &self,
        request: ReadConfigOperationRequest,
    ) -> Result<ReadConfigOperationOutcome> {
        self.read.run(request).await
    }

    pub async fn update(
        &self,
        request: UpdateConfigOperationRequest,
    ) -> Result<UpdateConfigOperationResult> {
        self.update.run(request).await
    }

    pub async fn delete(
        &self,
        request: DeleteConfigOperationRequest,
    ) -> Result<DeleteConfigOperationResult> {
        self.delete.run(request).await
    }

    pub async fn list(&self, request: ListConfigOperationRequest) -> Result<Vec<String>> {
        self.list.run(request).await
    }

    /// Inbound change event handler.
    pub async fn apply_change(&self, event: ChangeEvent) -> ApplyChangeOperationOutcome {
        self.apply.run(event).await
    }

    /// Subscribe to the notifier and apply events until `shutdown` flips to true.
    pub fn spawn_change_listener(&self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        ChangeListener::new(
            self.notifier.clone(),
            self.apply.clone(),
            self.cache.clone(),
            self.options.resubscribe_backoff,
        )
        .spawn(shutdown)
    }
}
