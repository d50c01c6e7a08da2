use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lifetime of persisted credentials when "remember me" is checked.
pub const REMEMBER_ME_DAYS: i64 = 30;

/// How long persisted credentials survive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpiryPolicy {
    /// No expiry attribute: gone when the client session ends.
    Session,
    /// Durable for the given number of days.
    Days(i64),
}

impl ExpiryPolicy {
    pub fn from_remember_me(remember_me: bool) -> Self {
        if remember_me {
            ExpiryPolicy::Days(REMEMBER_ME_DAYS)
        } else {
            ExpiryPolicy::Session
        }
    }

    pub fn remember_me(&self) -> bool {
        matches!(self, ExpiryPolicy::Days(_))
    }

    /// Absolute expiry for a value written at `now`; `None` for session-only.
    pub fn expires_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            ExpiryPolicy::Session => None,
            ExpiryPolicy::Days(days) => Some(now + Duration::days(*days)),
        }
    }
}

/// Whether a value with the given expiry is still live at `now`.
///
/// Session-only values (`None`) never expire by time.
pub fn is_live(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match expires_at {
        None => true,
        Some(at) => now < at,
    }
}
