//! Infrastructure Layer
//!
//! Contains implementations for external services including:
//! - Durable store connection and supervision (PostgreSQL)
//! - Pub/sub backbone for cross-process fan-out (Redis, in-memory)
//! - Prometheus metrics

pub mod database;
pub mod metrics;
pub mod pubsub;
