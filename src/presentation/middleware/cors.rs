//! CORS Middleware Configuration

use std::time::Duration;

use axum::http::{HeaderValue, Method};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};

/// Methods the gateway answers cross-origin.
pub const ALLOWED_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::OPTIONS,
];

/// CORS restricted to the single configured client origin, with
/// credentials so the session cookie travels.
pub fn create_cors_layer(origin: &HeaderValue) -> CorsLayer {
    CorsLayer::new()
        // Only a matching Origin is echoed back
        .allow_origin(AllowOrigin::list([origin.clone()]))
        .allow_methods(ALLOWED_METHODS.to_vec())
        // Wildcards are not allowed together with credentials
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}
