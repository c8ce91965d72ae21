//! OAuth configuration built from the provider settings blocks.

use oauth2::{AuthUrl, ClientId, ClientSecret, RedirectUrl, Scope, TokenUrl};
use url::Url;

use super::provider::ProviderKind;
use crate::error::ApiError;
use crate::settings;

/// OAuth provider configuration with every URL parsed.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: ClientId,
    pub client_secret: ClientSecret,
    pub auth_url: AuthUrl,
    pub token_url: TokenUrl,
    pub redirect_url: RedirectUrl,
    pub userinfo_url: Url,
    pub scopes: Vec<Scope>,
}

impl OAuthConfig {
    /// Resolve a settings block, filling endpoints and scopes from the provider defaults.
    pub fn from_settings(kind: ProviderKind, provider: &settings::Provider) -> Result<Self, ApiError> {
        let invalid = |field: &str, e: url::ParseError| {
            ApiError::internal(format!("invalid {} for {}: {}", field, kind.name(), e))
        };

        let auth_url = provider.auth_url.as_deref().unwrap_or(kind.auth_url());
        let token_url = provider.token_url.as_deref().unwrap_or(kind.token_url());
        let userinfo_url = provider.userinfo_url.as_deref().unwrap_or(kind.userinfo_url());
        let scopes = if provider.scopes.is_empty() {
            kind.default_scopes().iter().map(|s| s.to_string()).collect()
        } else {
            provider.scopes.clone()
        };

        Ok(Self {
            client_id: ClientId::new(provider.client_id.clone()),
            client_secret: ClientSecret::new(provider.client_secret.clone()),
            auth_url: AuthUrl::new(auth_url.to_string()).map_err(|e| invalid("auth_url", e))?,
            token_url: TokenUrl::new(token_url.to_string()).map_err(|e| invalid("token_url", e))?,
            redirect_url: RedirectUrl::new(provider.redirect_url.clone())
                .map_err(|e| invalid("redirect_url", e))?,
            userinfo_url: Url::parse(userinfo_url).map_err(|e| invalid("userinfo_url", e))?,
            scopes: scopes.into_iter().map(Scope::new).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block() -> settings::Provider {
        settings::Provider {
            client_id: "id".into(),
            client_secret: "secret".into(),
            redirect_url: "http://localhost:8080/api/auth/oauth/google/callback".into(),
            auth_url: None,
            token_url: None,
            userinfo_url: None,
            scopes: Vec::new(),
        }
    }

    #[test]
    fn test_defaults_fill_missing_endpoints() {
        let config = OAuthConfig::from_settings(ProviderKind::Google, &block()).unwrap();
        assert_eq!(
            config.auth_url.as_str(),
            "https://accounts.google.com/o/oauth2/v2/auth"
        );
        assert_eq!(config.scopes.len(), 3);
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let mut block = block();
        block.token_url = Some("not a url".into());
        assert!(OAuthConfig::from_settings(ProviderKind::Github, &block).is_err());
    }
}
