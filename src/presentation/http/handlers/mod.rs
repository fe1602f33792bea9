//! HTTP Handlers
//!
//! Built-in handlers. Chat features are mounted as route modules.

pub mod health;
