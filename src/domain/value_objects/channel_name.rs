//! Logical channel names used for fan-out routing (e.g. `room:42`).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Maximum channel name length in bytes.
pub const MAX_CHANNEL_NAME_LEN: usize = 128;

/// Validated channel name: 1-128 characters of `[A-Za-z0-9:_.-]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelName(String);

impl ChannelName {
    pub fn parse(name: impl Into<String>) -> Result<Self, AppError> {
        let name = name.into();
        if name.is_empty() {
            return Err(AppError::bad_request("Channel name must not be empty"));
        }
        if name.len() > MAX_CHANNEL_NAME_LEN {
            return Err(AppError::bad_request(format!(
                "Channel name exceeds {} characters",
                MAX_CHANNEL_NAME_LEN
            )));
        }
        if let Some(c) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, ':' | '_' | '.' | '-')))
        {
            return Err(AppError::bad_request(format!(
                "Channel name contains invalid character {c:?}"
            )));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ChannelName {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ChannelName> for String {
    fn from(name: ChannelName) -> Self {
        name.0
    }
}

impl AsRef<str> for ChannelName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
