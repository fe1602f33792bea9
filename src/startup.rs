//! Application Startup
//!
//! Startup sequence: configuration (already loaded by the caller), durable
//! store and pub/sub backbone connected concurrently, route registration,
//! then listen. Any failure before the listener binds aborts startup.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{http::HeaderValue, Router};
use tokio::{net::TcpListener, signal, task::JoinHandle};

use crate::config::Settings;
use crate::domain::{AuthenticatedOnly, ChannelPolicy};
use crate::infrastructure::database::{
    Backoff, PgStore, StoreBackend, StoreConnector, StoreError,
};
use crate::infrastructure::pubsub::{BackboneConnector, FanoutError, RedisBackbone};
use crate::presentation::http::handlers::health;
use crate::presentation::http::{create_router, RouteModule};
use crate::presentation::middleware::SessionKeys;
use crate::presentation::websocket::{ConnectionRegistry, FanoutAdapter, SocketEventRouter};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Pub/sub backbone connection failed: {0}")]
    Backbone(#[from] FanoutError),

    #[error("Invalid server address: {0}")]
    Address(#[from] std::net::AddrParseError),

    #[error("Invalid client origin: {0}")]
    Origin(#[from] axum::http::header::InvalidHeaderValue),

    #[error("Failed to bind listener: {0}")]
    Bind(#[from] std::io::Error),
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub sessions: SessionKeys,
    pub sockets: SocketEventRouter,
    pub store: Arc<StoreConnector>,
    /// The single origin allowed by CORS and the socket upgrade
    pub origin: HeaderValue,
}

impl AppState {
    pub fn assemble(
        settings: Settings,
        store: Arc<StoreConnector>,
        sockets: SocketEventRouter,
    ) -> Result<Self, StartupError> {
        let origin = HeaderValue::from_str(&settings.server.client_url)?;
        Ok(Self {
            sessions: SessionKeys::from_settings(&settings),
            settings: Arc::new(settings),
            sockets,
            store,
            origin,
        })
    }
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
    state: AppState,
    tasks: Vec<JoinHandle<()>>,
}

impl Application {
    /// Connect the PostgreSQL store and the Redis backbone, then build the
    /// server around them.
    pub async fn build(
        settings: Settings,
        modules: Vec<Box<dyn RouteModule>>,
    ) -> Result<Self, StartupError> {
        let pg = Arc::new(PgStore::new(settings.database.clone()));
        let backbone = Arc::new(RedisBackbone::new(settings.redis.clone()));

        let mut app =
            Self::build_with(settings, pg.clone(), backbone, Arc::new(AuthenticatedOnly), modules)
                .await?;
        app.tasks.push(pg.spawn_health_monitor());
        Ok(app)
    }

    /// Connect `store` and `backbone` concurrently and build the server
    /// once both are up. Nothing binds if either fails.
    pub async fn build_with(
        settings: Settings,
        store: Arc<dyn StoreBackend>,
        backbone: Arc<dyn BackboneConnector>,
        policy: Arc<dyn ChannelPolicy>,
        modules: Vec<Box<dyn RouteModule>>,
    ) -> Result<Self, StartupError> {
        let store = Arc::new(StoreConnector::new(store, Backoff::from(&settings.database)));

        let (connected, established) = tokio::join!(store.connect(), backbone.connect());
        connected?;
        let established = established.inspect_err(|e| {
            tracing::error!(backbone = backbone.name(), error = %e, "Error connecting to pub/sub backbone")
        })?;

        health::init_server_start();

        let supervisor = Arc::clone(&store).supervise();
        let registry = Arc::new(ConnectionRegistry::new());
        let (fanout, relay) = FanoutAdapter::attach(
            backbone,
            established,
            Backoff::from(&settings.redis),
            registry,
        );

        let addr: SocketAddr = settings.server.socket_addr()?;
        let state = AppState::assemble(settings, store, SocketEventRouter::new(fanout, policy))?;
        let router = create_router(state.clone(), &modules);

        let listener = TcpListener::bind(addr).await?;
        tracing::info!(
            pid = std::process::id(),
            addr = %listener.local_addr()?,
            environment = %state.settings.environment,
            "Listening"
        );

        Ok(Self {
            listener,
            router,
            state,
            tasks: vec![supervisor, relay],
        })
    }

    /// Serve until Ctrl-C or SIGTERM, then stop background tasks.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Serve until `shutdown` resolves.
    pub async fn run_until<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let result = axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await;

        for task in &self.tasks {
            task.abort();
        }
        tracing::info!("Server stopped");
        result
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// The fully layered router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}
