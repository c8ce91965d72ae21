use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{normalize_email, UserStore};
use crate::auth::ProviderProfile;
use crate::error::ApiError;
use crate::models::{Identity, User};

const LOCAL_PROVIDER: &str = "local";

/// In-memory UserStore for development and tests.
#[derive(Clone, Debug, Default)]
pub struct MemoryUserStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create_local(
        &self,
        email: &str,
        name: &str,
        password_hash: String,
    ) -> Result<User, ApiError> {
        let email = normalize_email(email);
        let mut users = self.users.write().await;

        if users.values().any(|u| u.has_identity(LOCAL_PROVIDER, &email)) {
            return Err(ApiError::EmailTaken);
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: email.clone(),
            name: Some(name.to_string()),
            avatar_url: None,
            provider: LOCAL_PROVIDER.to_string(),
            provider_id: email,
            identities: Vec::new(),
            password_hash: Some(password_hash),
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_local(&self, email: &str) -> Option<User> {
        let email = normalize_email(email);
        self.users
            .read()
            .await
            .values()
            .find(|u| u.provider == LOCAL_PROVIDER && u.provider_id == email)
            .cloned()
    }

    async fn get(&self, id: Uuid) -> Option<User> {
        self.users.read().await.get(&id).cloned()
    }

    async fn upsert_oauth(&self, profile: &ProviderProfile) -> Result<User, ApiError> {
        let mut users = self.users.write().await;
        let now = Utc::now();

        if let Some(user) = users
            .values_mut()
            .find(|u| u.has_identity(&profile.provider, &profile.provider_id))
        {
            // Linked identities never rewrite the email of the account they joined.
            if user.provider == profile.provider {
                user.email = normalize_email(&profile.email);
            }
            if profile.name.is_some() {
                user.name = profile.name.clone();
            }
            if profile.avatar_url.is_some() {
                user.avatar_url = profile.avatar_url.clone();
            }
            user.updated_at = now;
            return Ok(user.clone());
        }

        let user = User {
            id: Uuid::new_v4(),
            email: normalize_email(&profile.email),
            name: profile.name.clone(),
            avatar_url: profile.avatar_url.clone(),
            provider: profile.provider.clone(),
            provider_id: profile.provider_id.clone(),
            identities: Vec::new(),
            password_hash: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn link_identity(
        &self,
        user_id: Uuid,
        profile: &ProviderProfile,
    ) -> Result<User, ApiError> {
        let mut users = self.users.write().await;

        let owner = users
            .values()
            .find(|u| u.has_identity(&profile.provider, &profile.provider_id))
            .map(|u| u.id);
        if owner.is_some_and(|id| id != user_id) {
            return Err(ApiError::Validation(
                "Esta conta do provedor já está vinculada a outro usuário".to_string(),
            ));
        }

        let user = users.get_mut(&user_id).ok_or(ApiError::UserNotFound)?;
        if owner.is_none() {
            user.identities.push(Identity {
                provider: profile.provider.clone(),
                provider_id: profile.provider_id.clone(),
            });
        }
        if user.avatar_url.is_none() {
            user.avatar_url = profile.avatar_url.clone();
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(provider: &str, id: &str, email: &str) -> ProviderProfile {
        ProviderProfile {
            provider: provider.to_string(),
            provider_id: id.to_string(),
            email: email.to_string(),
            name: Some("Ana".to_string()),
            avatar_url: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_find_local_user() {
        let store = MemoryUserStore::new();
        let user = store
            .create_local(" Ana@Example.com ", "Ana", "hash".into())
            .await
            .unwrap();

        assert_eq!(user.email, "ana@example.com");
        assert_eq!(user.provider, "local");
        let found = store.find_local("ANA@example.com").await.unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(store.get(user.id).await.unwrap().email, user.email);
    }

    #[tokio::test]
    async fn test_duplicate_local_email_is_rejected() {
        let store = MemoryUserStore::new();
        store.create_local("ana@example.com", "Ana", "h".into()).await.unwrap();

        let err = store
            .create_local("ANA@example.com", "Other", "h".into())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::EmailTaken));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_upsert_oauth_updates_returning_user() {
        let store = MemoryUserStore::new();
        let first = store
            .upsert_oauth(&profile("google", "g-1", "ana@example.com"))
            .await
            .unwrap();
        let second = store
            .upsert_oauth(&profile("google", "g-1", "ana.new@example.com"))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.email, "ana.new@example.com");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_link_identity() {
        let store = MemoryUserStore::new();
        let local = store.create_local("ana@example.com", "Ana", "h".into()).await.unwrap();

        let linked = store
            .link_identity(local.id, &profile("github", "42", "ana@example.com"))
            .await
            .unwrap();
        assert!(linked.has_identity("github", "42"));

        // Later social logins resolve to the same account
        let again = store
            .upsert_oauth(&profile("github", "42", "ana@example.com"))
            .await
            .unwrap();
        assert_eq!(again.id, local.id);

        // Someone else cannot claim the identity
        let other = store.create_local("bia@example.com", "Bia", "h".into()).await.unwrap();
        assert!(store
            .link_identity(other.id, &profile("github", "42", "bia@example.com"))
            .await
            .is_err());
    }
}
