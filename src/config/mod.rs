//! # Configuration Module
//!
//! Settings are read once at startup, validated, and then passed around as
//! an immutable value. Sources, lowest priority first:
//! - built-in defaults
//! - `.env` file (via dotenvy)
//! - process environment variables
//!
//! Required variables: `SECRET_KEY_ONE`, `SECRET_KEY_TWO`, `RUN_ENV`,
//! `CLIENT_URL`, `REDIS_HOST`. `DATABASE_URL` falls back to a local default.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use chat_gateway::config::Settings;
//!
//! let settings = Settings::load()?;
//! println!("Server will listen on {}", settings.server_addr());
//! ```

mod settings;

pub use settings::*;
