//! Health Check Handlers
//!
//! Provides health check endpoints for Kubernetes-style liveness and readiness probes.
//!
//! # Endpoints
//! - `GET /health` - Basic health check
//! - `GET /health/live` - Liveness probe (is the process running?)
//! - `GET /health/ready` - Readiness probe (are the durable store and the
//!   pub/sub backbone reachable?)

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::time::Instant;

use crate::infrastructure::database::StoreConnector;
use crate::presentation::http::routes::RouteModule;
use crate::presentation::websocket::FanoutAdapter;
use crate::startup::AppState;

/// Server start time for uptime calculation
static SERVER_START: Lazy<Instant> = Lazy::new(Instant::now);
static SERVER_START_TIME: Lazy<DateTime<Utc>> = Lazy::new(Utc::now);

/// Initialize the server start time (call during startup)
pub fn init_server_start() {
    Lazy::force(&SERVER_START);
    Lazy::force(&SERVER_START_TIME);
}

/// Built-in route module serving the probes.
pub struct HealthRoutes;

impl RouteModule for HealthRoutes {
    fn name(&self) -> &'static str {
        "health"
    }

    fn routes(&self) -> Router<AppState> {
        Router::new()
            .route("/health", get(health_check))
            .route("/health/live", get(liveness))
            .route("/health/ready", get(readiness))
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: HealthStatus,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub started_at: String,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub store: StoreHealth,
    pub backbone: BackboneHealth,
    pub gateway: GatewayHealth,
}

#[derive(Debug, Serialize)]
pub struct StoreHealth {
    pub status: HealthStatus,
    pub backend: &'static str,
    pub reconnects: u64,
}

#[derive(Debug, Serialize)]
pub struct BackboneHealth {
    pub status: HealthStatus,
    pub backend: &'static str,
    pub reconnects: u64,
}

#[derive(Debug, Serialize)]
pub struct GatewayHealth {
    pub active_connections: usize,
    pub channels: usize,
    /// Tag this process publishes under on the backbone
    pub origin: String,
}

/// Overall health status
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Liveness probe - the process is up
pub async fn liveness() -> Json<LivenessResponse> {
    Json(LivenessResponse { status: "alive" })
}

/// Readiness probe - 503 while the store or the backbone is being reconnected
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let store = check_store(&state.store);
    let backbone = check_backbone(state.sockets.fanout());
    let registry = state.sockets.registry();

    let status = if store.status == HealthStatus::Healthy && backbone.status == HealthStatus::Healthy {
        HealthStatus::Healthy
    } else {
        HealthStatus::Unhealthy
    };

    let response = ReadinessResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: SERVER_START.elapsed().as_secs(),
        started_at: SERVER_START_TIME.to_rfc3339(),
        checks: HealthChecks {
            store,
            backbone,
            gateway: GatewayHealth {
                active_connections: registry.connection_count(),
                channels: registry.channel_count(),
                origin: state.sockets.fanout().origin().to_string(),
            },
        },
    };

    let status_code = match response.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(response))
}

fn status_of(connected: bool) -> HealthStatus {
    if connected {
        HealthStatus::Healthy
    } else {
        HealthStatus::Unhealthy
    }
}

fn check_backbone(fanout: &FanoutAdapter) -> BackboneHealth {
    BackboneHealth {
        status: status_of(fanout.is_connected()),
        backend: fanout.backbone_name(),
        reconnects: fanout.reconnect_count(),
    }
}

fn check_store(store: &StoreConnector) -> StoreHealth {
    StoreHealth {
        status: status_of(store.is_connected()),
        backend: store.backend_name(),
        reconnects: store.reconnect_count(),
    }
}
