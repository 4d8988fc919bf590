use crate::{CacheUpdate, Change, ChangeEvent, LocalCache};
use std::sync::Arc;

/// Applies inbound change events to the local cache. Never writes the store.
#[derive(Clone)]
pub struct ApplyChangeOperation {
    cache: Arc<LocalCache>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyChangeOperationOutcome {
    Applied,
    /// Event was not newer than the cached value or the last tombstone.
    Stale,
    Evicted,
}

impl ApplyChangeOperation {
    pub fn new(cache: Arc<LocalCache>) -> Self {
        Self { cache }
    }

    pub async fn run(&self, event: ChangeEvent) -> ApplyChangeOperationOutcome {
        let ChangeEvent {
            key,
            change,
            origin_timestamp,
            origin,
        } = event;

        match change {
            Change::Tombstone => {
                self.cache.mark_deleted(&key, origin_timestamp).await;
                tracing::debug!("applied tombstone for {} ts={} from {}", key, origin_timestamp, origin);
                ApplyChangeOperationOutcome::Evicted
            }
            Change::Put(value) if value.timestamp() != origin_timestamp => {
                tracing::warn!(
                    "discarding event for {} from {}: origin ts={} but value ts={}",
                    key,
                    origin,
                    origin_timestamp,
                    value.timestamp()
                );
                ApplyChangeOperationOutcome::Stale
            }
            Change::Put(value) => match self.cache.apply_if_newer(&key, value).await {
                CacheUpdate::Applied => {
                    tracing::debug!("applied change for {} ts={} from {}", key, origin_timestamp, origin);
                    ApplyChangeOperationOutcome::Applied
                }
                CacheUpdate::Ignored | CacheUpdate::Evicted => {
                    tracing::debug!("discarded stale change for {} ts={} from {}", key, origin_timestamp, origin);
                    ApplyChangeOperationOutcome::Stale
                }
            },
        }
    }
}
