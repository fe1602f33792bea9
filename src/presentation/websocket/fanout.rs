//! Fan-out Adapter
//!
//! Bridges the connection registry to the pub/sub backbone. A publish is
//! sent to the backbone and then delivered to local subscribers; every
//! instance re-delivers backbone events to its own subscribers and skips
//! events carrying its own origin tag, so the publisher never sees a
//! duplicate.
//!
//! When the backbone event stream ends the adapter reports itself
//! disconnected, refuses publishes and re-establishes the backbone with
//! backoff.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::registry::ConnectionRegistry;
use crate::domain::ChannelName;
use crate::infrastructure::database::Backoff;
use crate::infrastructure::metrics;
use crate::infrastructure::pubsub::{
    Backbone, BackboneConnector, EventStream, FanoutError, FanoutEvent, Publisher,
};

pub struct FanoutAdapter {
    origin: String,
    connector: Arc<dyn BackboneConnector>,
    backoff: Backoff,
    /// `None` while the backbone is being re-established
    publisher: RwLock<Option<Arc<dyn Publisher>>>,
    registry: Arc<ConnectionRegistry>,
    reconnects: AtomicU64,
}

impl FanoutAdapter {
    /// Wire an established backbone to the registry and start consuming
    /// backbone events. Returns the adapter and its receive task.
    pub fn attach(
        connector: Arc<dyn BackboneConnector>,
        backbone: Backbone,
        backoff: Backoff,
        registry: Arc<ConnectionRegistry>,
    ) -> (Arc<Self>, JoinHandle<()>) {
        let adapter = Arc::new(Self {
            origin: format!("{}-{}", std::process::id(), Uuid::new_v4()),
            connector,
            backoff,
            publisher: RwLock::new(Some(backbone.publisher)),
            registry,
            reconnects: AtomicU64::new(0),
        });
        metrics::set_backbone_connected(true);
        let task = tokio::spawn(Arc::clone(&adapter).run(backbone.events));
        tracing::info!(origin = %adapter.origin, backbone = adapter.connector.name(), "Fan-out adapter attached");
        (adapter, task)
    }

    /// Tag identifying this process on the backbone.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn backbone_name(&self) -> &'static str {
        self.connector.name()
    }

    pub fn is_connected(&self) -> bool {
        self.publisher.read().is_some()
    }

    /// Times the backbone was re-established after its stream ended.
    pub fn reconnect_count(&self) -> u64 {
        self.reconnects.load(Ordering::SeqCst)
    }

    /// Relay to every other instance, then deliver locally.
    /// Returns the number of local connections reached.
    ///
    /// Nothing is delivered when the backbone publish fails.
    pub async fn publish(
        &self,
        channel: &ChannelName,
        payload: serde_json::Value,
    ) -> Result<usize, FanoutError> {
        let publisher = self
            .publisher
            .read()
            .clone()
            .ok_or_else(|| FanoutError::Unavailable("reconnecting".into()))?;

        let event = FanoutEvent {
            channel: channel.to_string(),
            payload,
            origin: self.origin.clone(),
        };
        publisher.publish(&event).await?;
        metrics::record_fanout_event("published");

        let local = self.registry.deliver(channel, &event.payload);
        tracing::debug!(channel = %channel, local, "Fan-out event published");
        Ok(local)
    }

    /// Handle one event observed on the backbone.
    /// Returns the number of local connections reached.
    pub fn on_message(&self, event: FanoutEvent) -> usize {
        if event.origin == self.origin {
            metrics::record_fanout_event("ignored");
            return 0;
        }
        metrics::record_fanout_event("received");

        let channel = match ChannelName::parse(event.channel) {
            Ok(channel) => channel,
            Err(e) => {
                tracing::warn!(origin = %event.origin, error = %e, "Dropping event for invalid channel");
                return 0;
            }
        };

        self.registry.deliver(&channel, &event.payload)
    }

    async fn run(self: Arc<Self>, mut events: EventStream) {
        loop {
            while let Some(event) = events.next().await {
                let delivered = self.on_message(event);
                tracing::trace!(delivered, "Backbone event handled");
            }

            self.publisher.write().take();
            metrics::set_backbone_connected(false);
            tracing::error!(origin = %self.origin, "Backbone event stream ended, reconnecting");

            let backbone = self.reconnect().await;
            *self.publisher.write() = Some(backbone.publisher);
            metrics::set_backbone_connected(true);
            events = backbone.events;
        }
    }

    async fn reconnect(&self) -> Backbone {
        let mut failures: u32 = 0;
        loop {
            match self.connector.connect().await {
                Ok(backbone) => {
                    self.reconnects.fetch_add(1, Ordering::SeqCst);
                    tracing::info!(backbone = self.connector.name(), failures, "Backbone reconnected");
                    return backbone;
                }
                Err(e) => {
                    let delay = self.backoff.jittered(failures);
                    tracing::error!(
                        backbone = self.connector.name(),
                        error = %e,
                        attempt = failures + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Backbone reconnect failed"
                    );
                    failures = failures.saturating_add(1);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
