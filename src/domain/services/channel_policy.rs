//! Channel subscription policy.
//!
//! Subscriptions are denied unless a policy grants them.

use crate::domain::entities::Session;
use crate::domain::value_objects::ChannelName;
use crate::shared::error::AppError;

/// Decides whether a connection may join a channel.
pub trait ChannelPolicy: Send + Sync + 'static {
    fn authorize(&self, session: Option<&Session>, channel: &ChannelName) -> Result<(), AppError>;
}

/// Grants any valid channel to authenticated sessions; anonymous and
/// session-less connections are refused.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthenticatedOnly;

impl ChannelPolicy for AuthenticatedOnly {
    fn authorize(&self, session: Option<&Session>, channel: &ChannelName) -> Result<(), AppError> {
        match session {
            Some(s) if s.is_authenticated() => Ok(()),
            _ => Err(AppError::unauthorized(format!(
                "Authentication required to join {channel}"
            ))),
        }
    }
}
