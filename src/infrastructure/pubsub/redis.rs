//! Redis pub/sub backbone.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tracing::{info, instrument, warn};

use super::{Backbone, BackboneConnector, FanoutError, FanoutEvent, Publisher};
use crate::config::RedisSettings;

/// Publishing half, backed by an auto-reconnecting connection manager.
pub struct RedisPublisher {
    conn: ConnectionManager,
    topic: String,
}

#[async_trait]
impl Publisher for RedisPublisher {
    async fn publish(&self, event: &FanoutEvent) -> Result<(), FanoutError> {
        let body = serde_json::to_string(event)?;
        let mut conn = self.conn.clone();
        let receivers: i64 = conn.publish(&self.topic, body).await?;
        tracing::trace!(channel = %event.channel, receivers, "Published fan-out event");
        Ok(())
    }
}

/// Connector for the Redis backbone configured by `REDIS_HOST`.
pub struct RedisBackbone {
    settings: RedisSettings,
}

impl RedisBackbone {
    pub fn new(settings: RedisSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl BackboneConnector for RedisBackbone {
    async fn connect(&self) -> Result<Backbone, FanoutError> {
        connect(&self.settings).await
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

/// Open the publish and subscribe connections concurrently and wait for
/// both, then subscribe to the fan-out topic.
///
/// # Errors
///
/// Fails if either connection or the subscription cannot be established.
#[instrument(skip(settings), fields(url = %settings.url, topic = %settings.topic))]
pub async fn connect(settings: &RedisSettings) -> Result<Backbone, FanoutError> {
    info!("Connecting to pub/sub backbone...");
    let client = Client::open(settings.url.as_str())?;

    let (publisher, mut subscriber) = tokio::try_join!(
        ConnectionManager::new(client.clone()),
        client.get_async_pubsub(),
    )?;
    subscriber.subscribe(settings.topic.as_str()).await?;
    info!("Pub/sub backbone connected");

    let events = subscriber
        .into_on_message()
        .filter_map(|msg| async move {
            let payload: String = match msg.get_payload() {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(error = %e, "Dropping non-text backbone message");
                    return None;
                }
            };
            match serde_json::from_str::<FanoutEvent>(&payload) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(error = %e, "Dropping undecodable backbone message");
                    None
                }
            }
        })
        .boxed();

    Ok(Backbone {
        publisher: Arc::new(RedisPublisher {
            conn: publisher,
            topic: settings.topic.clone(),
        }),
        events,
    })
}
