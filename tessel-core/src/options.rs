use std::time::Duration;

/// Immutable settings for one service instance, built once at startup.
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// Identifies this instance in published events.
    pub instance_id: String,
    pub cache_duration: Duration,
    pub cache_cleanup_interval: Duration,
    /// Default deadline for a single backing store call.
    pub store_timeout: Duration,
    /// Deadline for a single publish call.
    pub publish_timeout: Duration,
    pub publish_queue_capacity: usize,
    /// Delay before the change listener resubscribes after losing its stream.
    pub resubscribe_backoff: Duration,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            instance_id: ulid::Ulid::new().to_string(),
            cache_duration: Duration::from_secs(5 * 60),
            cache_cleanup_interval: Duration::from_secs(2 * 60),
            store_timeout: Duration::from_secs(3),
            publish_timeout: Duration::from_secs(3),
            publish_queue_capacity: 1024,
            resubscribe_backoff: Duration::from_secs(1),
        }
    }
}
