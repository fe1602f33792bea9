//! HTTP
//!
//! Route table, built-in handlers and request extractors.

pub mod extractors;
pub mod handlers;
pub mod routes;

pub use extractors::{FormBody, JsonBody};
pub use routes::{create_router, RouteModule, MAX_BODY_BYTES};
