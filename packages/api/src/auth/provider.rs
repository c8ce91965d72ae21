//! # OAuth 2.0 identity providers
//!
//! Social login against Google and GitHub with the Authorization Code flow and
//! PKCE. The PKCE values and the `state` parameter come from
//! [`pkce`](super::pkce) and are stored by the route handlers in the session
//! handshake; this module only talks to the provider.
//!
//! ## Types
//!
//! - [`IdentityProvider`]: the seam the routes depend on: build the
//!   authorization URL for a challenge/state pair, exchange a code + verifier
//!   for the user's [`ProviderProfile`].
//! - [`ProviderKind`]: the supported providers and their well-known endpoints.
//! - [`OAuthProvider`]: the `oauth2`-backed implementation.
//!
//! ## Exchange
//!
//! 1. The code and the stored verifier go to the token endpoint through
//!    `oauth2` (redirects disabled on the HTTP client).
//! 2. The profile is fetched with the provider access token. For GitHub, when
//!    the profile has no public email, `/user/emails` is consulted and the
//!    primary verified address is used.
//!
//! The provider access token is used once and dropped; the application issues
//! its own session tokens.

use async_trait::async_trait;
use oauth2::basic::BasicClient;
use oauth2::{
    AuthorizationCode, CsrfToken, EndpointNotSet, EndpointSet, PkceCodeVerifier, TokenResponse,
};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::config::OAuthConfig;
use super::pkce::CHALLENGE_METHOD;
use crate::error::ApiError;

const USER_AGENT: &str = "finance-auth";
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// What the application keeps from a provider account.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderProfile {
    pub provider: String,
    pub provider_id: String,
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Provider name as used in routes (`google`, `github`).
    fn name(&self) -> &str;

    /// Authorization endpoint URL carrying the challenge and state.
    fn authorization_url(&self, code_challenge: &str, state: &str) -> String;

    /// Trade an authorization code and its verifier for the user's profile.
    async fn exchange(&self, code: &str, code_verifier: &str) -> Result<ProviderProfile, ApiError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Google,
    Github,
}

impl ProviderKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "google" => Some(Self::Google),
            "github" => Some(Self::Github),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Github => "github",
        }
    }

    pub fn auth_url(self) -> &'static str {
        match self {
            Self::Google => "https://accounts.google.com/o/oauth2/v2/auth",
            Self::Github => "https://github.com/login/oauth/authorize",
        }
    }

    pub fn token_url(self) -> &'static str {
        match self {
            Self::Google => "https://oauth2.googleapis.com/token",
            Self::Github => "https://github.com/login/oauth/access_token",
        }
    }

    pub fn userinfo_url(self) -> &'static str {
        match self {
            Self::Google => "https://openidconnect.googleapis.com/v1/userinfo",
            Self::Github => "https://api.github.com/user",
        }
    }

    pub fn default_scopes(self) -> &'static [&'static str] {
        match self {
            Self::Google => &["openid", "email", "profile"],
            Self::Github => &["read:user", "user:email"],
        }
    }
}

/// OAuth client type with auth URL and token URL set.
type ConfiguredClient = oauth2::Client<
    oauth2::basic::BasicErrorResponse,
    oauth2::basic::BasicTokenResponse,
    oauth2::basic::BasicTokenIntrospectionResponse,
    oauth2::StandardRevocableToken,
    oauth2::basic::BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

/// Google user info from the OpenID Connect userinfo endpoint.
#[derive(Debug, Deserialize)]
struct GoogleUser {
    sub: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

/// GitHub user info from API.
#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: i64,
    login: String,
    email: Option<String>,
    name: Option<String>,
    avatar_url: Option<String>,
}

/// GitHub email info from API.
#[derive(Debug, Deserialize)]
struct GitHubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

/// `oauth2`-backed identity provider.
pub struct OAuthProvider {
    kind: ProviderKind,
    config: OAuthConfig,
    http: Client,
}

impl OAuthProvider {
    pub fn new(kind: ProviderKind, config: OAuthConfig) -> Result<Self, ApiError> {
        let http = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(HTTP_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ApiError::internal(e.to_string()))?;
        Ok(Self { kind, config, http })
    }

    fn create_client(&self) -> ConfiguredClient {
        BasicClient::new(self.config.client_id.clone())
            .set_client_secret(self.config.client_secret.clone())
            .set_auth_uri(self.config.auth_url.clone())
            .set_token_uri(self.config.token_url.clone())
            .set_redirect_uri(self.config.redirect_url.clone())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<T, ApiError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| ApiError::OAuth(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ApiError::OAuth(format!(
                "{} profile request returned {}",
                self.kind.name(),
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| ApiError::OAuth(e.to_string()))
    }

    async fn google_profile(&self, access_token: &str) -> Result<ProviderProfile, ApiError> {
        let user: GoogleUser = self
            .get_json(self.config.userinfo_url.as_str(), access_token)
            .await?;
        let email = user
            .email
            .ok_or_else(|| ApiError::OAuth("Google account has no email".to_string()))?;

        Ok(ProviderProfile {
            provider: self.kind.name().to_string(),
            provider_id: user.sub,
            email,
            name: user.name,
            avatar_url: user.picture,
        })
    }

    async fn github_profile(&self, access_token: &str) -> Result<ProviderProfile, ApiError> {
        let user_url = self.config.userinfo_url.as_str();
        let user: GitHubUser = self.get_json(user_url, access_token).await?;

        // Get primary email if not in user info
        let email = match user.email {
            Some(email) => email,
            None => {
                let emails_url = format!("{}/emails", user_url.trim_end_matches('/'));
                let emails: Vec<GitHubEmail> = self.get_json(&emails_url, access_token).await?;
                emails
                    .into_iter()
                    .find(|e| e.primary && e.verified)
                    .map(|e| e.email)
                    .ok_or_else(|| ApiError::OAuth("No verified primary email found".to_string()))?
            }
        };

        Ok(ProviderProfile {
            provider: self.kind.name().to_string(),
            provider_id: user.id.to_string(),
            email,
            name: user.name.or(Some(user.login)),
            avatar_url: user.avatar_url,
        })
    }
}

#[async_trait]
impl IdentityProvider for OAuthProvider {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn authorization_url(&self, code_challenge: &str, state: &str) -> String {
        let client = self.create_client();
        let (url, _) = client
            .authorize_url(|| CsrfToken::new(state.to_string()))
            .add_scopes(self.config.scopes.iter().cloned())
            .add_extra_param("code_challenge", code_challenge)
            .add_extra_param("code_challenge_method", CHALLENGE_METHOD)
            .url();
        url.to_string()
    }

    async fn exchange(&self, code: &str, code_verifier: &str) -> Result<ProviderProfile, ApiError> {
        let token = self
            .create_client()
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(code_verifier.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| ApiError::OAuth(format!("Token exchange failed: {}", e)))?;

        let access_token = token.access_token().secret();
        match self.kind {
            ProviderKind::Google => self.google_profile(access_token).await,
            ProviderKind::Github => self.github_profile(access_token).await,
        }
    }
}
