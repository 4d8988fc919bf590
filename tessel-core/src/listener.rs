use crate::operations::ApplyChangeOperation;
use crate::{ChangeNotifier, LocalCache, TesselError};
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Feeds events from the notification channel into the local cache.
///
/// Whenever delivery may have had a gap (lagging, a lost or failed
/// subscription) the cache is cleared, so reads fall back to the store
/// instead of serving values whose updates were missed.
pub struct ChangeListener {
    notifier: Arc<dyn ChangeNotifier>,
    apply: ApplyChangeOperation,
    cache: Arc<LocalCache>,
    resubscribe_backoff: Duration,
}

impl ChangeListener {
    pub fn new(
        notifier: Arc<dyn ChangeNotifier>,
        apply: ApplyChangeOperation,
        cache: Arc<LocalCache>,
        resubscribe_backoff: Duration,
    ) -> Self {
        Self {
            notifier,
            apply,
            cache,
            resubscribe_backoff,
        }
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut first_subscription = true;

        while !*shutdown.borrow() {
            let mut stream = match self.notifier.subscribe().await {
                Ok(stream) => stream,
                Err(error) => {
                    tracing::warn!(
                        "failed to subscribe via {} notifier: {}",
                        self.notifier.backend_name(),
                        error
                    );
                    self.cache.clear();
                    if self.wait_or_shutdown(&mut shutdown).await {
                        break;
                    }
                    continue;
                }
            };

            if !first_subscription {
                // events published while unsubscribed are gone
                self.cache.clear();
                tracing::info!("resubscribed to change events; local cache cleared");
            }
            first_subscription = false;

            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            tracing::debug!("change listener shutting down");
                            return;
                        }
                    }
                    next = stream.next() => match next {
                        Some(Ok(event)) => {
                            self.apply.run(event).await;
                        }
                        Some(Err(TesselError::Notify(reason))) => {
                            tracing::warn!("change events lost ({}); clearing local cache", reason);
                            self.cache.clear();
                        }
                        Some(Err(error)) => {
                            tracing::warn!("skipping undecodable change event: {}", error);
                        }
                        None => {
                            tracing::warn!("change event stream ended; resubscribing");
                            break;
                        }
                    }
                }
            }

            if self.wait_or_shutdown(&mut shutdown).await {
                break;
            }
        }
    }

    /// Sleep for the backoff. Returns true if shutdown was requested meanwhile.
    async fn wait_or_shutdown(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(self.resubscribe_backoff) => *shutdown.borrow(),
            changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
        }
    }
}
