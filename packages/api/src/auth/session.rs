//! # OAuth handshake state
//!
//! Between the authorization redirect and the provider's callback the server
//! keeps the PKCE verifier, the expected `state` and, when the user started the
//! flow while already signed in, the id of the account to link. That state
//! lives in the server-side session (tower-sessions) under
//! [`SESSION_HANDSHAKE_KEY`].
//!
//! [`take_handshake`] removes the entry as it reads it. The callback calls it
//! before any validation, so a verifier never outlives one callback whether the
//! flow succeeds or fails.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use uuid::Uuid;

use crate::error::ApiError;

/// Key for storing the pending handshake in the session.
pub const SESSION_HANDSHAKE_KEY: &str = "oauth_handshake";

/// Minutes an authorization attempt may take before its callback is refused.
pub const HANDSHAKE_TTL_MINUTES: i64 = 10;

#[derive(Clone, Serialize, Deserialize)]
pub struct OAuthHandshake {
    pub provider: String,
    pub code_verifier: String,
    pub oauth_state: String,
    /// Account to link the provider identity to, if the flow started signed in.
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl OAuthHandshake {
    pub fn new(
        provider: impl Into<String>,
        code_verifier: String,
        oauth_state: String,
        user_id: Option<Uuid>,
    ) -> Self {
        Self {
            provider: provider.into(),
            code_verifier,
            oauth_state,
            user_id,
            created_at: Utc::now(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() - self.created_at > Duration::minutes(HANDSHAKE_TTL_MINUTES)
    }
}

impl std::fmt::Debug for OAuthHandshake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthHandshake")
            .field("provider", &self.provider)
            .field("user_id", &self.user_id)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Store a handshake, replacing any attempt still pending in this session.
pub async fn begin_handshake(session: &Session, handshake: &OAuthHandshake) -> Result<(), ApiError> {
    session.insert(SESSION_HANDSHAKE_KEY, handshake).await?;
    Ok(())
}

/// Remove and return the pending handshake.
pub async fn take_handshake(session: &Session) -> Result<Option<OAuthHandshake>, ApiError> {
    Ok(session.remove(SESSION_HANDSHAKE_KEY).await?)
}
