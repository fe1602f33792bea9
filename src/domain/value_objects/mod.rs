//! # Domain Value Objects
//!
//! - **ChannelName**: Validated logical channel name used for fan-out routing

mod channel_name;

pub use channel_name::*;
