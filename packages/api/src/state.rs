//! Shared state handed to every handler.

use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::{
    CookieManager, IdentityProvider, OAuthConfig, OAuthProvider, ProviderKind, TokenService,
};
use crate::db::UserStore;
use crate::error::ApiError;
use crate::settings::{Environment, Settings};

#[derive(Clone)]
pub struct AppState {
    pub environment: Environment,
    pub cookies: CookieManager,
    pub tokens: Arc<dyn TokenService>,
    pub users: Arc<dyn UserStore>,
    pub providers: Arc<HashMap<String, Arc<dyn IdentityProvider>>>,
    pub login_path: String,
    pub home_path: String,
}

impl AppState {
    pub fn new(
        settings: &Settings,
        tokens: Arc<dyn TokenService>,
        users: Arc<dyn UserStore>,
    ) -> Self {
        let environment = settings.app.environment;
        Self {
            environment,
            cookies: CookieManager::new(environment),
            tokens,
            users,
            providers: Arc::new(HashMap::new()),
            login_path: settings.app.login_path.clone(),
            home_path: settings.app.home_path.clone(),
        }
    }

    /// Register every OAuth provider that has a block in `settings`.
    pub fn with_configured_providers(mut self, settings: &Settings) -> Result<Self, ApiError> {
        let configured = [
            (ProviderKind::Google, settings.oauth.google.as_ref()),
            (ProviderKind::Github, settings.oauth.github.as_ref()),
        ];
        for (kind, block) in configured {
            if let Some(block) = block {
                let config = OAuthConfig::from_settings(kind, block)?;
                self = self.with_provider(Arc::new(OAuthProvider::new(kind, config)?));
                tracing::info!(provider = kind.name(), "OAuth provider enabled");
            }
        }
        Ok(self)
    }

    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        Arc::make_mut(&mut self.providers).insert(provider.name().to_string(), provider);
        self
    }

    pub fn provider(&self, name: &str) -> Result<Arc<dyn IdentityProvider>, ApiError> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| ApiError::UnknownProvider(name.to_string()))
    }
}
