//! Session entity.
//!
//! A session lives entirely inside an encrypted client cookie; the server
//! keeps no session table. It is created at the edge of a handshake and
//! only ever replaced by reissuance.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifetime of a session from issuance, in days.
pub const SESSION_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    /// Authenticated principal. `None` while the client is anonymous.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub issued_at: DateTime<Utc>,
}

impl Session {
    /// Fresh anonymous session.
    pub fn anonymous() -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: None,
            issued_at: Utc::now(),
        }
    }

    /// Fresh session bound to a user.
    pub fn authenticated(user_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: Some(user_id.into()),
            issued_at: Utc::now(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.issued_at + Duration::days(SESSION_TTL_DAYS)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }
}
