//! In-process backbone.
//!
//! Every `attach` behaves like a separate gateway process connecting to the
//! same bus: it sees all events published by any attached publisher,
//! including its own. Used when embedding several gateways in one process
//! and in tests.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::broadcast::{self, error::RecvError};

use super::{Backbone, BackboneConnector, FanoutError, FanoutEvent, Publisher};

#[derive(Clone)]
pub struct MemoryBus {
    tx: broadcast::Sender<FanoutEvent>,
}

impl MemoryBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Attach a new participant.
    pub fn attach(&self) -> Backbone {
        let rx = self.tx.subscribe();
        let events = futures::stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(event) => return Some((event, rx)),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Memory bus subscriber lagged");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        })
        .boxed();

        Backbone {
            publisher: Arc::new(MemoryPublisher {
                tx: self.tx.clone(),
            }),
            events,
        }
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl BackboneConnector for MemoryBus {
    async fn connect(&self) -> Result<Backbone, FanoutError> {
        Ok(self.attach())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

struct MemoryPublisher {
    tx: broadcast::Sender<FanoutEvent>,
}

#[async_trait]
impl Publisher for MemoryPublisher {
    async fn publish(&self, event: &FanoutEvent) -> Result<(), FanoutError> {
        // No receivers is not an error: pub/sub is fire-and-forget.
        let _ = self.tx.send(event.clone());
        Ok(())
    }
}
