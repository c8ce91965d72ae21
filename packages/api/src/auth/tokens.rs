//! # Token issuance
//!
//! The rest of the auth subsystem treats access and refresh tokens as opaque
//! strings and asks a [`TokenService`] to mint, verify, refresh and revoke them.
//!
//! [`MemoryTokenService`] is the in-process issuer used by the server binary and
//! the tests. Tokens are 32 random bytes, hex-encoded, tagged with their
//! [`TokenKind`] and expiry:
//!
//! - access tokens live [`ACCESS_TOKEN_MAX_AGE`] (15 minutes);
//! - refresh tokens live [`REFRESH_TOKEN_MAX_AGE`] (7 days);
//! - [`TokenService::verify_access`] never accepts a refresh token;
//! - [`TokenService::refresh`] never accepts an access token.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::cookies::{ACCESS_TOKEN_MAX_AGE, REFRESH_TOKEN_MAX_AGE};
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Tokens minted at login, registration or OAuth exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenPair { .. }")
    }
}

#[async_trait]
pub trait TokenService: Send + Sync {
    /// Mint a fresh access/refresh pair for a user.
    async fn issue(&self, user_id: Uuid) -> Result<TokenPair, ApiError>;

    /// Mint a new access token from a valid refresh token.
    async fn refresh(&self, refresh_token: &str) -> Result<String, ApiError>;

    /// Resolve the user behind a valid, unexpired access token.
    async fn verify_access(&self, access_token: &str) -> Result<Uuid, ApiError>;

    /// Forget a token of either kind. Unknown tokens are ignored.
    async fn revoke(&self, token: &str);
}

#[derive(Debug, Clone)]
struct TokenRecord {
    user_id: Uuid,
    kind: TokenKind,
    expires_at: DateTime<Utc>,
}

impl TokenRecord {
    fn is_live(&self, kind: TokenKind, now: DateTime<Utc>) -> bool {
        self.kind == kind && self.expires_at > now
    }
}

/// In-memory [`TokenService`].
#[derive(Clone, Default)]
pub struct MemoryTokenService {
    tokens: Arc<RwLock<HashMap<String, TokenRecord>>>,
}

impl MemoryTokenService {
    pub fn new() -> Self {
        Self::default()
    }

    fn mint() -> String {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    fn expiry(kind: TokenKind) -> DateTime<Utc> {
        let ttl = match kind {
            TokenKind::Access => ACCESS_TOKEN_MAX_AGE,
            TokenKind::Refresh => REFRESH_TOKEN_MAX_AGE,
        };
        Utc::now() + chrono::Duration::seconds(ttl.whole_seconds())
    }

    async fn insert(&self, user_id: Uuid, kind: TokenKind) -> String {
        let token = Self::mint();
        let record = TokenRecord {
            user_id,
            kind,
            expires_at: Self::expiry(kind),
        };
        self.tokens.write().await.insert(token.clone(), record);
        token
    }

    /// Drop every expired token.
    pub async fn purge_expired(&self) {
        let now = Utc::now();
        self.tokens.write().await.retain(|_, r| r.expires_at > now);
    }

    #[cfg(test)]
    async fn expire(&self, token: &str) {
        if let Some(record) = self.tokens.write().await.get_mut(token) {
            record.expires_at = Utc::now() - chrono::Duration::seconds(1);
        }
    }
}

#[async_trait]
impl TokenService for MemoryTokenService {
    async fn issue(&self, user_id: Uuid) -> Result<TokenPair, ApiError> {
        Ok(TokenPair {
            access_token: self.insert(user_id, TokenKind::Access).await,
            refresh_token: self.insert(user_id, TokenKind::Refresh).await,
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<String, ApiError> {
        let user_id = {
            let tokens = self.tokens.read().await;
            match tokens.get(refresh_token) {
                Some(record) if record.is_live(TokenKind::Refresh, Utc::now()) => record.user_id,
                _ => return Err(ApiError::InvalidRefreshToken),
            }
        };
        Ok(self.insert(user_id, TokenKind::Access).await)
    }

    async fn verify_access(&self, access_token: &str) -> Result<Uuid, ApiError> {
        let tokens = self.tokens.read().await;
        match tokens.get(access_token) {
            Some(record) if record.is_live(TokenKind::Access, Utc::now()) => Ok(record.user_id),
            _ => Err(ApiError::InvalidAccessToken),
        }
    }

    async fn revoke(&self, token: &str) {
        self.tokens.write().await.remove(token);
    }
}
