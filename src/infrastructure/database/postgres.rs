//! PostgreSQL store backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::{StoreBackend, StoreError, StoreEvent};
use crate::config::DatabaseSettings;

/// Create a PostgreSQL connection pool
pub async fn create_pool(settings: &DatabaseSettings) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout))
        .connect(&settings.url)
        .await
}

/// Pool holder that detects lost connectivity with a periodic ping.
pub struct PgStore {
    settings: DatabaseSettings,
    pool: RwLock<Option<PgPool>>,
    events: broadcast::Sender<StoreEvent>,
}

impl PgStore {
    pub fn new(settings: DatabaseSettings) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            settings,
            pool: RwLock::new(None),
            events,
        }
    }

    /// Current pool, if connected.
    pub fn pool(&self) -> Option<PgPool> {
        self.pool.read().clone()
    }

    /// Ping the store every `health_check_interval` seconds. The first failed
    /// ping after a successful connect drops the pool and emits a single
    /// `Disconnected`; nothing more is emitted until the next connect.
    pub fn spawn_health_monitor(self: &Arc<Self>) -> JoinHandle<()> {
        let store = Arc::clone(self);
        let period = store.settings.health_check_period();

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await; // Skip first immediate tick

            loop {
                ticker.tick().await;
                let Some(pool) = store.pool() else {
                    continue;
                };

                if let Err(e) = sqlx::query("SELECT 1").execute(&pool).await {
                    let dropped = store.pool.write().take();
                    if let Some(dropped) = dropped {
                        tracing::warn!(error = %e, "Database ping failed, connection lost");
                        dropped.close().await;
                        let _ = store.events.send(StoreEvent::Disconnected);
                    }
                }
            }
        })
    }
}

#[async_trait]
impl StoreBackend for PgStore {
    async fn connect(&self) -> Result<(), StoreError> {
        let pool = create_pool(&self.settings).await?;
        *self.pool.write() = Some(pool);
        let _ = self.events.send(StoreEvent::Connected);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}
