use super::{ChangeNotifier, ChangeStream};
use crate::{ChangeEvent, Result, TesselError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

const CHANNEL_CAPACITY: usize = 1024;

/// In-process broadcast channel. Instances sharing one `BroadcastNotifier`
/// behave like service instances on one pub/sub topic.
pub struct BroadcastNotifier {
    topic: String,
    sender: broadcast::Sender<Vec<u8>>,
    published: AtomicUsize,
    unavailable: AtomicBool,
}

impl BroadcastNotifier {
    pub fn new(topic: impl Into<String>) -> Self {
        Self::with_capacity(topic, CHANNEL_CAPACITY)
    }

    pub fn with_capacity(topic: impl Into<String>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            topic: topic.into(),
            sender,
            published: AtomicUsize::new(0),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Number of events accepted by `publish`.
    pub fn published_count(&self) -> usize {
        self.published.load(Ordering::SeqCst)
    }

    /// Make `publish` fail as if the broker were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChangeNotifier for BroadcastNotifier {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn publish(&self, event: &ChangeEvent) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(TesselError::Notify(format!(
                "topic {} is unavailable",
                self.topic
            )));
        }

        let payload = event.encode()?;
        // no subscribers is not a failure
        let _ = self.sender.send(payload);
        self.published.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn subscribe(&self) -> Result<ChangeStream> {
        let receiver = self.sender.subscribe();
        let stream = futures_util::stream::unfold(receiver, |mut receiver| async move {
            match receiver.recv().await {
                Ok(payload) => Some((ChangeEvent::decode(&payload), receiver)),
                Err(RecvError::Lagged(skipped)) => Some((
                    Err(TesselError::Notify(format!(
                        "subscriber lagged, {} events skipped",
                        skipped
                    ))),
                    receiver,
                )),
                Err(RecvError::Closed) => None,
            }
        });

        Ok(Box::pin(stream))
    }
}
