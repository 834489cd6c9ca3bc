use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// An authenticated session issued by the backend's auth provider.
///
/// Produced by sign-in, sign-up, refresh and recovery; persisted by the
/// session store and restored at start-up. Tokens are opaque to Portico.
#[derive(Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct AuthSession {
    /// Auth provider subject id (the `sub` claim, equal to `users.id`).
    pub subject_id: String,
    #[serde(default)]
    pub email: Option<String>,
    pub access_token: String,
    pub refresh_token: String,
    /// Access token expiry, when the provider reports one.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthSession {
    /// Check if the access token is expired or expires within `buffer_secs`.
    ///
    /// Sessions without a known expiry are never considered near expiry.
    #[must_use]
    pub fn is_near_expiry(&self, buffer_secs: i64) -> bool {
        self.expires_at.is_some_and(|expires_at| {
            expires_at <= Utc::now() + chrono::TimeDelta::seconds(buffer_secs)
        })
    }

    /// Whether `other` carries the same subject and the same token pair.
    #[must_use]
    pub fn same_tokens(&self, other: &Self) -> bool {
        self.subject_id == other.subject_id
            && self.access_token == other.access_token
            && self.refresh_token == other.refresh_token
    }
}

// Tokens stay out of logs.
impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("subject_id", &self.subject_id)
            .field("email", &self.email)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
