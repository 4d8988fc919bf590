use crate::{ChangeEvent, ChangeNotifier};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

/// Background publisher for change events.
///
/// Callers enqueue without waiting; a single task drains the queue in order,
/// so events from one instance leave in the order they were produced.
/// Failures here are logged and never reach the writer.
#[derive(Clone)]
pub struct ChangePublisher {
    sender: mpsc::Sender<ChangeEvent>,
}

impl ChangePublisher {
    /// Start the publisher task. It exits once every `ChangePublisher` clone
    /// is dropped and the queue is drained.
    pub fn spawn(
        notifier: Arc<dyn ChangeNotifier>,
        capacity: usize,
        publish_timeout: Duration,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(publish_loop(notifier, receiver, publish_timeout));
        (Self { sender }, handle)
    }

    /// Queue an event for publishing. Returns false if it was dropped.
    pub fn enqueue(&self, event: ChangeEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                tracing::warn!(
                    "publish queue full; dropping change event for {} ts={}",
                    event.key,
                    event.origin_timestamp
                );
                false
            }
            Err(TrySendError::Closed(event)) => {
                tracing::warn!(
                    "publisher stopped; dropping change event for {} ts={}",
                    event.key,
                    event.origin_timestamp
                );
                false
            }
        }
    }
}

async fn publish_loop(
    notifier: Arc<dyn ChangeNotifier>,
    mut receiver: mpsc::Receiver<ChangeEvent>,
    publish_timeout: Duration,
) {
    while let Some(event) = receiver.recv().await {
        match tokio::time::timeout(publish_timeout, notifier.publish(&event)).await {
            Ok(Ok(())) => {
                tracing::debug!(
                    "published change event for {} tombstone={} ts={}",
                    event.key,
                    event.is_tombstone(),
                    event.origin_timestamp
                );
            }
            Ok(Err(error)) => {
                tracing::warn!(
                    "failed to publish change event for {} via {}: {}",
                    event.key,
                    notifier.backend_name(),
                    error
                );
            }
            Err(_) => {
                tracing::warn!(
                    "publishing change event for {} timed out after {:?}",
                    event.key,
                    publish_timeout
                );
            }
        }
    }

    tracing::debug!("change publisher stopped");
}
