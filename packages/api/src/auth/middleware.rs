//! # Session extraction and the auth gate
//!
//! - [`extract_token_from_cookies`]: layer that reads the `accessToken` and
//!   `refreshToken` cookies once per request into a typed [`RequestContext`]
//!   stored in the request extensions. No validation.
//! - [`require_auth`]: gate for protected routes. Without an access-token
//!   cookie the request ends with `401 MISSING_ACCESS_TOKEN` and the inner
//!   handler never runs. Presence only: verification is the token issuer's job.
//! - [`AuthenticatedUser`]: handler extractor that verifies the access token
//!   with the [`TokenService`](super::TokenService) and loads the user.
//!
//! Apply `require_auth` with `route_layer` below the extraction layer:
//!
//! ```ignore
//! Router::new()
//!     .route("/api/auth/me", get(me))
//!     .route_layer(middleware::from_fn(require_auth))
//!     .layer(middleware::from_fn(extract_token_from_cookies))
//! ```

use std::convert::Infallible;

use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::cookie::CookieJar;

use super::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::error::ApiError;
use crate::models::User;
use crate::state::AppState;

/// Raw session tokens presented with one request.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl RequestContext {
    pub fn from_jar(jar: &CookieJar) -> Self {
        let read = |name: &str| {
            jar.get(name)
                .map(|c| c.value().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            access_token: read(ACCESS_TOKEN_COOKIE),
            refresh_token: read(REFRESH_TOKEN_COOKIE),
        }
    }

    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self::from_jar(&CookieJar::from_headers(headers))
    }

    /// The context attached by [`extract_token_from_cookies`], or one read from the headers.
    pub fn from_parts(parts: &Parts) -> Self {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_else(|| Self::from_headers(&parts.headers))
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("access_token", &self.access_token.as_ref().map(|_| "[redacted]"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(RequestContext::from_parts(parts))
    }
}

/// Attach the [`RequestContext`] built from the cookie jar.
pub async fn extract_token_from_cookies(jar: CookieJar, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(RequestContext::from_jar(&jar));
    next.run(request).await
}

/// Reject requests that carry no access-token cookie.
pub async fn require_auth(request: Request, next: Next) -> Result<Response, ApiError> {
    let present = match request.extensions().get::<RequestContext>() {
        Some(context) => context.access_token.is_some(),
        None => RequestContext::from_headers(request.headers())
            .access_token
            .is_some(),
    };

    if !present {
        tracing::debug!(path = %request.uri().path(), "rejected request without access token");
        return Err(ApiError::MissingAccessToken);
    }
    Ok(next.run(request).await)
}

/// The signed-in user behind a verified access token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let context = RequestContext::from_parts(parts);
        let token = context.access_token.ok_or(ApiError::MissingAccessToken)?;
        let user_id = state.tokens.verify_access(&token).await?;
        let user = state.users.get(user_id).await.ok_or(ApiError::UserNotFound)?;
        Ok(Self { user })
    }
}
