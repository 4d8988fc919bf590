use super::{ChangeNotifier, ChangeStream};
use crate::{ChangeEvent, Result, TesselError};
use async_trait::async_trait;
use futures_util::StreamExt;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

/// Redis pub/sub channel carrying JSON-encoded change events.
pub struct RedisNotifier {
    client: redis::Client,
    conn: ConnectionManager,
    topic: String,
}

impl RedisNotifier {
    pub async fn new(url: &str, topic: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|error| {
            TesselError::Config(format!("invalid redis url '{}': {}", url, error))
        })?;
        let conn = ConnectionManager::new(client.clone()).await?;

        tracing::info!("connected redis notifier at {} topic={}", url, topic);

        Ok(Self {
            client,
            conn,
            topic: topic.to_string(),
        })
    }
}

#[async_trait]
impl ChangeNotifier for RedisNotifier {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn publish(&self, event: &ChangeEvent) -> Result<()> {
        let payload = event.encode()?;
        let mut conn = self.conn.clone();
        conn.publish::<_, _, ()>(&self.topic, payload)
            .await
            .map_err(|error| {
                TesselError::Notify(format!("publish to {} failed: {}", self.topic, error))
            })?;
        Ok(())
    }

    async fn subscribe(&self) -> Result<ChangeStream> {
        let mut pubsub = self.client.get_async_pubsub().await.map_err(|error| {
            TesselError::Notify(format!("pubsub connection failed: {}", error))
        })?;
        pubsub.subscribe(&self.topic).await.map_err(|error| {
            TesselError::Notify(format!("subscribe to {} failed: {}", self.topic, error))
        })?;

        let stream = pubsub
            .into_on_message()
            .map(|message| ChangeEvent::decode(message.get_payload_bytes()));

        Ok(Box::pin(stream))
    }
}
