//! # Chat Gateway Library
//!
//! Bootstrap and transport layer of a real-time chat backend:
//! - Validated process configuration
//! - Durable store connection with automatic reconnection
//! - HTTP server with session cookies and security middleware
//! - WebSocket gateway with cross-process fan-out over a pub/sub backbone
//!
//! ## Module Structure
//!
//! ```text
//! chat_gateway/
//! +-- config/         Configuration loading and validation
//! +-- domain/         Session, channel names, channel policy
//! +-- infrastructure/ Store connector, pub/sub backbone, metrics
//! +-- presentation/   HTTP routes, middleware and WebSocket gateway
//! +-- shared/         Error taxonomy
//! ```

// Configuration module
pub mod config;

// Domain layer
pub mod domain;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP and WebSocket handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
