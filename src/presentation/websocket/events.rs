//! Socket Event Router
//!
//! Turns client frames into registry and fan-out operations. Every failure
//! is reported through [`AppError::report`] and answered with an `error`
//! frame; the connection stays open.

use std::sync::Arc;

use super::fanout::FanoutAdapter;
use super::messages::{ClientMessage, ServerMessage};
use super::registry::{ConnectionId, ConnectionRegistry};
use crate::domain::{ChannelName, ChannelPolicy};
use crate::shared::error::AppError;

#[derive(Clone)]
pub struct SocketEventRouter {
    fanout: Arc<FanoutAdapter>,
    policy: Arc<dyn ChannelPolicy>,
}

impl SocketEventRouter {
    pub fn new(fanout: Arc<FanoutAdapter>, policy: Arc<dyn ChannelPolicy>) -> Self {
        Self { fanout, policy }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        self.fanout.registry()
    }

    pub fn fanout(&self) -> &Arc<FanoutAdapter> {
        &self.fanout
    }

    /// Handle one text frame. Returns the reply for the sender, if any.
    pub async fn dispatch(&self, id: ConnectionId, text: &str) -> Option<ServerMessage> {
        match self.handle(id, text).await {
            Ok(reply) => reply,
            Err(e) => Some(ServerMessage::Error(e.report())),
        }
    }

    async fn handle(&self, id: ConnectionId, text: &str) -> Result<Option<ServerMessage>, AppError> {
        let frame: ClientMessage = serde_json::from_str(text)
            .map_err(|e| AppError::bad_request(format!("Invalid frame: {e}")))?;

        match frame {
            ClientMessage::Subscribe { channel } => {
                let channel = ChannelName::parse(channel)?;
                let connection = self.registry().get(id)?;
                self.policy.authorize(connection.session.as_ref(), &channel)?;
                self.registry().subscribe(id, &channel)?;
                Ok(Some(ServerMessage::Subscribed { channel }))
            }
            ClientMessage::Unsubscribe { channel } => {
                let channel = ChannelName::parse(channel)?;
                self.registry().unsubscribe(id, &channel)?;
                Ok(Some(ServerMessage::Unsubscribed { channel }))
            }
            ClientMessage::Publish { channel, payload } => {
                let channel = ChannelName::parse(channel)?;
                if !self.registry().is_subscribed(id, &channel) {
                    return Err(AppError::forbidden(format!(
                        "Subscribe to {channel} before publishing"
                    )));
                }
                self.fanout
                    .publish(&channel, payload)
                    .await
                    .map_err(|e| AppError::Unexpected(e.into()))?;
                Ok(None)
            }
        }
    }
}
