//! # User store
//!
//! Every handler reaches user records through the [`UserStore`] trait. The
//! server binary and the tests use [`MemoryUserStore`]; a document-database
//! backend implements the same trait.
//!
//! ## Operations
//!
//! | Method | Used by |
//! |--------|---------|
//! | [`create_local`](UserStore::create_local) | `/api/auth/register`, fails with `EmailTaken` for a second local account on the same email |
//! | [`find_local`](UserStore::find_local) | `/api/auth/login` |
//! | [`get`](UserStore::get) | the `AuthenticatedUser` extractor |
//! | [`upsert_oauth`](UserStore::upsert_oauth) | the OAuth callback, keyed on `(provider, provider_id)` so returning users get their profile refreshed |
//! | [`link_identity`](UserStore::link_identity) | the OAuth callback when the flow started signed in |
//!
//! Emails are compared trimmed and lowercased.

mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::auth::ProviderProfile;
use crate::error::ApiError;
use crate::models::User;

pub use memory::MemoryUserStore;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_local(
        &self,
        email: &str,
        name: &str,
        password_hash: String,
    ) -> Result<User, ApiError>;

    async fn find_local(&self, email: &str) -> Option<User>;

    async fn get(&self, id: Uuid) -> Option<User>;

    async fn upsert_oauth(&self, profile: &ProviderProfile) -> Result<User, ApiError>;

    async fn link_identity(&self, user_id: Uuid, profile: &ProviderProfile)
        -> Result<User, ApiError>;
}

/// Canonical form of an email address for lookups.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
