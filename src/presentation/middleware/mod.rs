//! Middleware
//!
//! Tower middleware for request processing.

pub mod cors;
pub mod logging;
pub mod metrics;
pub mod params;
pub mod security;
pub mod session;

pub use cors::create_cors_layer;
pub use logging::create_trace_layer;
pub use metrics::track_http_metrics;
pub use params::{parameter_pollution_guard, PollutedParams};
pub use security::{create_security_headers_layer, SecurityHeadersConfig, SecurityHeadersLayer};
pub use session::{session_middleware, CurrentSession, SessionKeys, Verified, SESSION_COOKIE};
