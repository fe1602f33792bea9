//! Database Module
//!
//! Connection lifecycle for the durable store. The store itself is opaque
//! to the gateway: it is connected once at startup and reconnected
//! transparently whenever the backend reports a disconnect.

mod postgres;
mod supervisor;

use async_trait::async_trait;
use tokio::sync::broadcast;

pub use postgres::{create_pool, PgStore};
pub use supervisor::{Backoff, StoreConnector};

/// Connection state changes reported by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    Connected,
    Disconnected,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database connection failed: {0}")]
    Connect(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// A durable store the connector can (re)connect.
#[async_trait]
pub trait StoreBackend: Send + Sync + 'static {
    /// Establish (or re-establish) the connection.
    async fn connect(&self) -> Result<(), StoreError>;

    /// Stream of connection state changes.
    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;

    /// Backend name for logs.
    fn name(&self) -> &'static str;
}
