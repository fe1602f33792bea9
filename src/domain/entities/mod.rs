//! # Domain Entities
//!
//! - **Session**: Cookie-borne session identity, verified without server-side storage

mod session;

pub use session::*;
