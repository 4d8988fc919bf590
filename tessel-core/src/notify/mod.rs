//! Change notification adapters.
//!
//! Delivery is at-least-once and may be duplicated or reordered; every
//! subscriber, the publisher included, receives each event.

pub mod memory;
pub mod redis;

use crate::{ChangeEvent, Result, TesselError};
use async_trait::async_trait;
use futures_util::Stream;
use std::pin::Pin;
use std::sync::Arc;

pub use memory::BroadcastNotifier;
pub use redis::RedisNotifier;

/// Default topic change events are broadcast on.
pub const DEFAULT_TOPIC: &str = "tessel.config.watch";

/// Inbound events. An `Err(TesselError::Notify(_))` item means events may
/// have been lost; other errors concern a single undecodable message.
pub type ChangeStream = Pin<Box<dyn Stream<Item = Result<ChangeEvent>> + Send>>;

#[async_trait]
pub trait ChangeNotifier: Send + Sync {
    fn backend_name(&self) -> &'static str;

    async fn publish(&self, event: &ChangeEvent) -> Result<()>;

    async fn subscribe(&self) -> Result<ChangeStream>;
}

pub async fn build_notifier(
    backend: &str,
    topic: &str,
    redis_url: Option<&str>,
) -> Result<Arc<dyn ChangeNotifier>> {
    let topic = match topic.trim() {
        "" => DEFAULT_TOPIC,
        topic => topic,
    };

    match backend.trim().to_ascii_lowercase().as_str() {
        "redis" => {
            let url = redis_url.unwrap_or_default().trim();
            if url.is_empty() {
                return Err(TesselError::Config(
                    "redis url is required for redis notify backend".to_string(),
                ));
            }
            Ok(Arc::new(RedisNotifier::new(url, topic).await?))
        }
        "memory" => Ok(Arc::new(BroadcastNotifier::new(topic))),
        "" => Err(TesselError::Config(
            "notify backend cannot be empty".to_string(),
        )),
        other => Err(TesselError::Config(format!(
            "unsupported notify backend: {}",
            other
        ))),
    }
}
