//! Pub/Sub Backbone
//!
//! Transport that replicates fan-out events between gateway processes.
//!
//! ```text
//! +-----------+   publish    +----------+   message    +-----------+
//! | gateway A | -----------> | backbone | -----------> | gateway B |
//! +-----------+              +----------+              +-----------+
//!       ^                          |
//!       +--------------------------+  (own events are ignored by origin)
//! ```
//!
//! A backbone is split in two halves: a `Publisher` and an event stream.
//! The Redis implementation backs them with two independent connections,
//! since a connection in subscriber mode cannot issue `PUBLISH`.
//!
//! A `BackboneConnector` establishes both halves. It is called once at
//! startup and again whenever the event stream ends.

pub mod memory;
pub mod redis;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

pub use memory::MemoryBus;
pub use self::redis::RedisBackbone;

/// One event relayed through the backbone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanoutEvent {
    /// Logical channel, e.g. `room:42`
    pub channel: String,
    /// Opaque event body
    pub payload: serde_json::Value,
    /// Tag of the publishing process
    pub origin: String,
}

#[derive(Debug, thiserror::Error)]
pub enum FanoutError {
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Event encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Pub/sub backbone unavailable: {0}")]
    Unavailable(String),
}

/// Publishing half of a backbone.
#[async_trait]
pub trait Publisher: Send + Sync + 'static {
    async fn publish(&self, event: &FanoutEvent) -> Result<(), FanoutError>;
}

/// Stream of events observed on the backbone, own events included.
pub type EventStream = BoxStream<'static, FanoutEvent>;

/// A fully established backbone: both halves are connected.
pub struct Backbone {
    pub publisher: Arc<dyn Publisher>,
    pub events: EventStream,
}

/// Establishes a `Backbone`.
#[async_trait]
pub trait BackboneConnector: Send + Sync + 'static {
    async fn connect(&self) -> Result<Backbone, FanoutError>;

    /// Backbone name for logs and health reports.
    fn name(&self) -> &'static str;
}
