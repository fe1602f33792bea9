//! # Domain Layer
//!
//! Transport-level concepts the gateway reasons about. The chat domain
//! itself (messages, rooms, users) lives in pluggable route modules.
//!
//! ## Structure
//!
//! - **entities**: Session carried in the client cookie
//! - **value_objects**: Validated channel names
//! - **services**: Channel subscription policy

pub mod entities;
pub mod services;
pub mod value_objects;

// Re-export commonly used types
pub use entities::*;
pub use services::*;
pub use value_objects::*;
