//! Store connection supervision.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use super::{StoreBackend, StoreError, StoreEvent};
use crate::config::{DatabaseSettings, RedisSettings};
use crate::infrastructure::metrics;

/// Capped exponential backoff between failed reconnect attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max }
    }

    /// Delay before retry number `attempt` (0-based), without jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(16)).unwrap_or(u32::MAX);
        self.initial.saturating_mul(factor).min(self.max)
    }

    /// `delay` plus up to 10% random jitter, still capped at `max`.
    pub fn jittered(&self, attempt: u32) -> Duration {
        let base = self.delay(attempt);
        let spread = (base.as_millis() as u64) / 10;
        let extra = if spread == 0 {
            0
        } else {
            rand::rng().random_range(0..=spread)
        };
        (base + Duration::from_millis(extra)).min(self.max)
    }
}

impl From<&DatabaseSettings> for Backoff {
    fn from(settings: &DatabaseSettings) -> Self {
        Self::new(
            Duration::from_millis(settings.reconnect_initial_ms),
            Duration::from_millis(settings.reconnect_max_ms),
        )
    }
}

impl From<&RedisSettings> for Backoff {
    fn from(settings: &RedisSettings) -> Self {
        Self::new(
            Duration::from_millis(settings.reconnect_initial_ms),
            Duration::from_millis(settings.reconnect_max_ms),
        )
    }
}

/// Owns the process-wide store connection lifecycle.
///
/// `connect` performs the initial connection; `supervise` then reacts to
/// every `Disconnected` event with one connect attempt, retrying with
/// backoff only while attempts fail.
pub struct StoreConnector {
    backend: Arc<dyn StoreBackend>,
    backoff: Backoff,
    events: Mutex<Option<broadcast::Receiver<StoreEvent>>>,
    connected: AtomicBool,
    attempts: AtomicU64,
    reconnects: AtomicU64,
}

impl StoreConnector {
    pub fn new(backend: Arc<dyn StoreBackend>, backoff: Backoff) -> Self {
        // Subscribe before the first connect so no disconnect is missed.
        let events = backend.subscribe();
        Self {
            backend,
            backoff,
            events: Mutex::new(Some(events)),
            connected: AtomicBool::new(false),
            attempts: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
        }
    }

    /// Initial connection. The caller treats failure as fatal.
    pub async fn connect(&self) -> Result<(), StoreError> {
        match self.attempt().await {
            Ok(()) => {
                tracing::info!(backend = self.backend.name(), "Successfully connected to database");
                Ok(())
            }
            Err(e) => {
                tracing::error!(backend = self.backend.name(), error = %e, "Error connecting to database");
                Err(e)
            }
        }
    }

    /// Spawn the reconnect loop. Runs until the backend's event stream closes.
    pub fn supervise(self: Arc<Self>) -> JoinHandle<()> {
        let events = self.events.lock().take();

        tokio::spawn(async move {
            let Some(mut events) = events else {
                tracing::warn!("Store supervisor already running");
                return;
            };

            loop {
                match events.recv().await {
                    Ok(StoreEvent::Disconnected) => {
                        self.connected.store(false, Ordering::SeqCst);
                        tracing::warn!(backend = self.backend.name(), "Database disconnected, reconnecting");
                        self.reconnect().await;
                    }
                    Ok(StoreEvent::Connected) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Store event receiver lagged");
                        if !self.is_connected() {
                            self.reconnect().await;
                        }
                    }
                    Err(RecvError::Closed) => {
                        tracing::info!("Store event stream closed, supervisor stopping");
                        break;
                    }
                }
            }
        })
    }

    async fn reconnect(&self) {
        let mut failures: u32 = 0;
        loop {
            match self.attempt().await {
                Ok(()) => {
                    self.reconnects.fetch_add(1, Ordering::SeqCst);
                    metrics::record_store_reconnect();
                    tracing::info!(backend = self.backend.name(), failures, "Database reconnected");
                    return;
                }
                Err(e) => {
                    let delay = self.backoff.jittered(failures);
                    tracing::error!(
                        backend = self.backend.name(),
                        error = %e,
                        attempt = failures + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Database reconnect failed"
                    );
                    failures = failures.saturating_add(1);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn attempt(&self) -> Result<(), StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let result = self.backend.connect().await;
        self.connected.store(result.is_ok(), Ordering::SeqCst);
        result
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Total connect attempts, initial one included.
    pub fn attempt_count(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Successful reconnects after disconnects.
    pub fn reconnect_count(&self) -> u64 {
        self.reconnects.load(Ordering::SeqCst)
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }
}
