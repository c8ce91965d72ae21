//! # API client with transparent session renewal
//!
//! Every request sent through [`ApiClient::execute`] carries the current
//! access token as a bearer credential. When the API answers `401`, the
//! client renews the session once and replays the request:
//!
//! ```text
//! send ──► not 401 ──────────────────────────────► response
//!   │
//!   └──► 401 ──► token replaced meanwhile? ──yes──► replay with current token
//!                   │ no
//!                   └──► shared refresh ──ok──────► replay with new token
//!                                │
//!                                └──fail──► end session, go to login, RefreshFailed
//! ```
//!
//! A replay that is answered `401` again is returned as an error without a
//! second refresh. Concurrent `401`s wait on the same in-flight refresh
//! instead of each calling `/api/auth/refresh`. A `401` that arrives after
//! the session was ended fails with [`ClientError::SessionEnded`] and does
//! not start another refresh.
//!
//! The refresh token itself is an HttpOnly cookie the client never reads;
//! it travels in the client's cookie jar, which is expired locally whenever
//! the session ends.
//!
//! Login and registration go through [`ApiClient::execute_public`] so a
//! credential failure is reported as is.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use reqwest::cookie::Jar;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Method, Request, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use api::auth::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use api::models::RefreshResponse;
use url::Url;

use crate::config::ClientConfig;
use crate::error::ClientError;

/// Process-wide holder of the current access token.
#[derive(Clone, Default)]
pub struct TokenStore {
    token: Arc<RwLock<Option<String>>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<String> {
        self.token.read().clone()
    }

    pub fn set(&self, token: impl Into<String>) {
        *self.token.write() = Some(token.into());
    }

    pub fn clear(&self) {
        *self.token.write() = None;
    }

    pub fn is_set(&self) -> bool {
        self.token.read().is_some()
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("is_set", &self.is_set())
            .finish()
    }
}

/// Moves the application to another route.
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

impl<F> Navigator for F
where
    F: Fn(&str) + Send + Sync,
{
    fn navigate(&self, path: &str) {
        self(path)
    }
}

type RefreshFuture = Shared<BoxFuture<'static, Result<String, Arc<ClientError>>>>;

#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    cookies: Arc<Jar>,
    config: ClientConfig,
    tokens: TokenStore,
    navigator: Arc<dyn Navigator>,
    in_flight: Mutex<Option<RefreshFuture>>,
}

impl ApiClient {
    pub fn new(config: ClientConfig, navigator: Arc<dyn Navigator>) -> Result<Self, ClientError> {
        Self::with_tokens(config, navigator, TokenStore::new())
    }

    /// Build a client around an existing token store.
    pub fn with_tokens(
        config: ClientConfig,
        navigator: Arc<dyn Navigator>,
        tokens: TokenStore,
    ) -> Result<Self, ClientError> {
        let cookies = Arc::new(Jar::default());
        let http = reqwest::Client::builder()
            .cookie_provider(cookies.clone())
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            inner: Arc::new(Inner {
                http,
                cookies,
                config,
                tokens,
                navigator,
                in_flight: Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.inner.tokens
    }

    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.inner.navigator
    }

    /// Drop the access token and expire the session cookies held by the client.
    pub fn end_session(&self) {
        end_session(&self.inner.tokens, &self.inner.cookies, &self.inner.config.base_url);
    }

    /// Start a request to `path`, relative to the configured base URL.
    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        Ok(self.inner.http.request(method, self.inner.config.url(path)?))
    }

    /// Send `request` with the bearer token, renewing the session once on `401`.
    pub async fn execute(&self, request: Request) -> Result<Response, ClientError> {
        let used = self.inner.tokens.get();
        let replay = request.try_clone();

        let response = self.send(request, used.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        let Some(replay) = replay else {
            return Err(ClientError::NotReplayable);
        };

        let token = self.recover(used).await?;
        tracing::debug!(method = %replay.method(), url = %replay.url(), "replaying request");
        let response = self.send(replay, Some(&token)).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ClientError::from_response(response).await);
        }
        Ok(response)
    }

    /// Send `request` without the bearer token or the refresh step.
    pub async fn execute_public(&self, request: Request) -> Result<Response, ClientError> {
        Ok(self.inner.http.execute(request).await?)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let request = self.request(Method::GET, path)?.build()?;
        read_json(self.execute(request).await?).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.request(Method::POST, path)?.json(body).build()?;
        read_json(self.execute(request).await?).await
    }

    /// POST to an endpoint that must never trigger a session refresh.
    pub async fn post_public<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.request(Method::POST, path)?.json(body).build()?;
        read_json(self.execute_public(request).await?).await
    }

    async fn send(&self, mut request: Request, token: Option<&str>) -> Result<Response, ClientError> {
        if let Some(token) = token {
            let value = HeaderValue::try_from(format!("Bearer {}", token))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }
        Ok(self.inner.http.execute(request).await?)
    }

    /// A token to replay with after a `401` for a request sent with `used`.
    async fn recover(&self, used: Option<String>) -> Result<String, ClientError> {
        match (used.as_deref(), self.inner.tokens.get()) {
            (Some(used), Some(current)) if used != current => return Ok(current),
            (Some(_), None) => return Err(ClientError::SessionEnded),
            _ => {}
        }

        let refresh = self.shared_refresh();
        let result = refresh.clone().await;
        {
            let mut slot = self.inner.in_flight.lock();
            if slot.as_ref().is_some_and(|f| f.ptr_eq(&refresh)) {
                *slot = None;
            }
        }
        result.map_err(ClientError::RefreshFailed)
    }

    /// The in-flight refresh, starting one if none is running.
    fn shared_refresh(&self) -> RefreshFuture {
        let mut slot = self.inner.in_flight.lock();
        if let Some(refresh) = slot.as_ref() {
            return refresh.clone();
        }

        let http = self.inner.http.clone();
        let cookies = self.inner.cookies.clone();
        let base_url = self.inner.config.base_url.clone();
        let tokens = self.inner.tokens.clone();
        let navigator = self.inner.navigator.clone();
        let login_path = self.inner.config.login_path.clone();
        let url = self.inner.config.url(&self.inner.config.refresh_path);

        let refresh = async move {
            tracing::debug!("refreshing session");
            match refresh_access_token(&http, url).await {
                Ok(token) => {
                    tokens.set(token.clone());
                    Ok(token)
                }
                Err(e) => {
                    tracing::info!(error = %e, "session refresh failed, signing out");
                    end_session(&tokens, &cookies, &base_url);
                    navigator.navigate(&login_path);
                    Err(Arc::new(e))
                }
            }
        }
        .boxed()
        .shared();

        *slot = Some(refresh.clone());
        refresh
    }
}

fn end_session(tokens: &TokenStore, cookies: &Jar, base_url: &Url) {
    tokens.clear();
    for name in [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE] {
        cookies.add_cookie_str(&format!("{name}=; Max-Age=0; Path=/"), base_url);
    }
}

async fn refresh_access_token(
    http: &reqwest::Client,
    url: Result<url::Url, ClientError>,
) -> Result<String, ClientError> {
    let response = http.post(url?).send().await?;
    let body: RefreshResponse = read_json(response).await?;
    Ok(body.access_token)
}

/// Decode a success body, or turn the response into [`ClientError::Api`].
pub async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    if !response.status().is_success() {
        return Err(ClientError::from_response(response).await);
    }
    Ok(response.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_store_is_shared_between_clones() {
        let tokens = TokenStore::new();
        let other = tokens.clone();
        tokens.set("abc");
        assert_eq!(other.get().as_deref(), Some("abc"));
        other.clear();
        assert!(!tokens.is_set());
    }

    #[test]
    fn test_token_store_debug_hides_token() {
        let tokens = TokenStore::new();
        tokens.set("secret-token");
        assert!(!format!("{tokens:?}").contains("secret-token"));
    }

    #[test]
    fn test_end_session_expires_session_cookies() {
        use reqwest::cookie::CookieStore;

        let base_url = Url::parse("http://127.0.0.1:8080").unwrap();
        let cookies = Jar::default();
        cookies.add_cookie_str("accessToken=a1; HttpOnly; Path=/", &base_url);
        cookies.add_cookie_str("refreshToken=r1; HttpOnly; Path=/", &base_url);
        cookies.add_cookie_str("theme=dark; Path=/", &base_url);
        let tokens = TokenStore::new();
        tokens.set("a1");

        end_session(&tokens, &cookies, &base_url);

        let sent = cookies.cookies(&base_url).unwrap();
        assert_eq!(sent.to_str().unwrap(), "theme=dark");
        assert!(!tokens.is_set());
    }

    #[test]
    fn test_closure_navigator() {
        let visited = Arc::new(Mutex::new(Vec::new()));
        let sink = visited.clone();
        let navigator: Arc<dyn Navigator> = Arc::new(move |path: &str| sink.lock().push(path.to_string()));
        navigator.navigate("/login");
        assert_eq!(*visited.lock(), vec!["/login".to_string()]);
    }
}
