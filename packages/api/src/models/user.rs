//! # User model
//!
//! Two representations of an application user:
//!
//! ## [`User`] (server only)
//!
//! The full record held by the user store:
//!
//! - `id`: primary key (`UUID v4`).
//! - `email`, `name`, `avatar_url`: profile fields populated at registration or
//!   from the identity provider.
//! - `provider` / `provider_id`: how the account was created (`"google"`,
//!   `"github"`, or `"local"` for email+password accounts where `provider_id`
//!   equals the email).
//! - `identities`: further `(provider, provider_id)` pairs linked to the account
//!   by a social login started while already signed in.
//! - `password_hash`: Argon2 hash, present only for `"local"` accounts.
//! - `created_at` / `updated_at`: audit timestamps.
//!
//! ## [`UserInfo`]
//!
//! The client-safe projection sent over the wire. It never carries the password
//! hash and renders the id as a string.

use serde::{Deserialize, Serialize};

#[cfg(feature = "server")]
use chrono::{DateTime, Utc};
#[cfg(feature = "server")]
use uuid::Uuid;

/// A `(provider, provider_id)` pair identifying an external account.
#[cfg(feature = "server")]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub provider: String,
    pub provider_id: String,
}

/// Full user record.
#[cfg(feature = "server")]
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub provider: String,
    pub provider_id: String,
    pub identities: Vec<Identity>,
    pub password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(feature = "server")]
impl User {
    /// Convert to UserInfo for client consumption.
    pub fn to_info(&self) -> UserInfo {
        UserInfo {
            id: self.id.to_string(),
            email: self.email.clone(),
            name: self.name.clone(),
            avatar_url: self.avatar_url.clone(),
            provider: self.provider.clone(),
        }
    }

    /// Whether this account answers to the given external identity.
    pub fn has_identity(&self, provider: &str, provider_id: &str) -> bool {
        (self.provider == provider && self.provider_id == provider_id)
            || self
                .identities
                .iter()
                .any(|i| i.provider == provider && i.provider_id == provider_id)
    }
}

/// User information safe to send to the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub provider: String,
}

impl UserInfo {
    /// Get display name, falling back to email if name is not set.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_info_wire_format() {
        let info = UserInfo {
            id: "42".into(),
            email: "ana@example.com".into(),
            name: None,
            avatar_url: Some("https://example.com/a.png".into()),
            provider: "local".into(),
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["avatarUrl"], "https://example.com/a.png");
        assert_eq!(info.display_name(), "ana@example.com");
    }
}
