//! WebSocket Message Types
//!
//! JSON frames tagged by `op`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::ChannelName;
use crate::shared::error::ErrorResponse;

/// Incoming client frame
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe { channel: String },
    Unsubscribe { channel: String },
    Publish {
        channel: String,
        #[serde(default)]
        payload: serde_json::Value,
    },
}

/// Outgoing server frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once the connection is registered
    Hello {
        connection_id: Uuid,
        authenticated: bool,
    },
    Subscribed {
        channel: ChannelName,
    },
    Unsubscribed {
        channel: ChannelName,
    },
    /// A channel event, local or relayed from another instance
    Event {
        channel: ChannelName,
        payload: serde_json::Value,
    },
    Error(ErrorResponse),
}
