//! Route Configuration
//!
//! Assembles the gateway router: built-in endpoints, pluggable route
//! modules, the not-found fallback and the standard middleware chain.

use axum::{
    extract::{DefaultBodyLimit, OriginalUri},
    middleware,
    response::IntoResponse,
    routing::get,
    Router,
};
use tower_http::{catch_panic::CatchPanicLayer, compression::CompressionLayer};

use super::handlers::health::HealthRoutes;
use crate::infrastructure::metrics;
use crate::presentation::middleware::{
    create_cors_layer, create_security_headers_layer, create_trace_layer,
    parameter_pollution_guard, session_middleware, track_http_metrics,
};
use crate::presentation::websocket::ws_handler;
use crate::shared::error::{handle_panic, AppError};
use crate::startup::AppState;

/// Cap for JSON and url-encoded request bodies.
pub const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

/// A self-contained set of routes mounted into the gateway.
pub trait RouteModule: Send + Sync {
    /// Name for startup logs.
    fn name(&self) -> &'static str;

    fn routes(&self) -> Router<AppState>;
}

/// Create the main router.
///
/// Unknown paths and known paths called with an unrouted method both
/// answer `NotFound`.
pub fn create_router(state: AppState, modules: &[Box<dyn RouteModule>]) -> Router {
    let mut router = Router::new()
        .route("/gateway", get(ws_handler))
        .route("/metrics", get(metrics_handler))
        .merge(HealthRoutes.routes());

    for module in modules {
        tracing::info!(module = module.name(), "Mounting route module");
        router = router.merge(module.routes());
    }

    // Later layers wrap earlier ones; panics are caught innermost.
    router
        .fallback(not_found)
        .method_not_allowed_fallback(not_found)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(middleware::from_fn(parameter_pollution_guard))
        .layer(middleware::from_fn_with_state(
            state.sessions.clone(),
            session_middleware,
        ))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn(track_http_metrics))
        .layer(CompressionLayer::new())
        .layer(create_security_headers_layer(state.sessions.is_secure()))
        .layer(create_cors_layer(&state.origin))
        .layer(create_trace_layer())
        .with_state(state)
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    let metrics = metrics::gather_metrics();
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics,
    )
}

async fn not_found(OriginalUri(uri): OriginalUri) -> AppError {
    AppError::not_found(format!("{} not found", uri.path()))
}
