//! Authentication state for the application.

use std::sync::Arc;

use api::models::{AuthResponse, LoginRequest, MeResponse, MessageResponse, RegisterRequest};
use api::UserInfo;
use parking_lot::RwLock;

use crate::error::ClientError;
use crate::http::{ApiClient, Navigator};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum AuthState {
    /// Session not resolved yet.
    #[default]
    Unknown,
    Authenticated(UserInfo),
    Anonymous,
}

/// Partial update of the signed-in user's profile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

/// Holds the signed-in user and drives login, registration and logout.
pub struct AuthSession {
    client: ApiClient,
    navigator: Arc<dyn Navigator>,
    state: RwLock<AuthState>,
}

impl AuthSession {
    pub fn new(client: ApiClient, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            client,
            navigator,
            state: RwLock::new(AuthState::Unknown),
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Current state. A session whose token was dropped by a failed refresh
    /// reads as [`AuthState::Anonymous`].
    pub fn state(&self) -> AuthState {
        match &*self.state.read() {
            AuthState::Authenticated(_) if !self.client.tokens().is_set() => AuthState::Anonymous,
            state => state.clone(),
        }
    }

    /// Resolve the session from the stored token.
    pub async fn init(&self) -> AuthState {
        if !self.client.tokens().is_set() {
            *self.state.write() = AuthState::Anonymous;
            return AuthState::Anonymous;
        }

        let state = match self.client.get_json::<MeResponse>("/api/auth/me").await {
            Ok(me) => AuthState::Authenticated(me.user),
            Err(e) => {
                tracing::debug!(error = %e, "stored session is not usable");
                self.client.end_session();
                AuthState::Anonymous
            }
        };
        *self.state.write() = state.clone();
        state
    }

    pub async fn login(&self, credentials: &LoginRequest) -> Result<UserInfo, ClientError> {
        let response: AuthResponse = self.client.post_public("/api/auth/login", credentials).await?;
        Ok(self.sign_in(response))
    }

    pub async fn register(&self, data: &RegisterRequest) -> Result<UserInfo, ClientError> {
        let response: AuthResponse = self.client.post_public("/api/auth/register", data).await?;
        Ok(self.sign_in(response))
    }

    fn sign_in(&self, response: AuthResponse) -> UserInfo {
        self.client.tokens().set(response.access_token);
        *self.state.write() = AuthState::Authenticated(response.user.clone());
        self.navigator.navigate(&self.client.config().home_path);
        response.user
    }

    /// Sign out locally even when the server cannot be reached.
    pub async fn logout(&self) {
        let result = self
            .client
            .post_public::<_, MessageResponse>("/api/auth/logout", &serde_json::json!({}))
            .await;
        if let Err(e) = result {
            tracing::warn!(error = %e, "logout request failed");
        }

        self.client.end_session();
        *self.state.write() = AuthState::Anonymous;
        self.navigator.navigate(&self.client.config().login_path);
    }

    /// Merge `patch` into the signed-in user. No-op when nobody is signed in.
    pub fn update_user_data(&self, patch: UserPatch) {
        let mut state = self.state.write();
        if let AuthState::Authenticated(user) = &mut *state {
            if let Some(name) = patch.name {
                user.name = Some(name);
            }
            if let Some(email) = patch.email {
                user.email = email;
            }
            if let Some(avatar_url) = patch.avatar_url {
                user.avatar_url = Some(avatar_url);
            }
        }
    }

    /// Forget the resolved state.
    pub fn teardown(&self) {
        *self.state.write() = AuthState::Unknown;
    }

    pub fn user(&self) -> Option<UserInfo> {
        match self.state() {
            AuthState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.state() == AuthState::Unknown
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state(), AuthState::Authenticated(_))
    }
}
