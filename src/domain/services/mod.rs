//! # Domain Services
//!
//! - **ChannelPolicy**: Decides which connections may join which channels

mod channel_policy;

pub use channel_policy::*;
