mod common;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use api::auth::pkce::{generate_code_challenge, validate_code_verifier};
use api::auth::{IdentityProvider, ProviderProfile};
use api::db::UserStore;
use api::ApiError;
use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use axum::Router;
use common::{cookie_value, json, location, register, send};

const GOOD_CODE: &str = "code-from-idp";

/// Identity provider that only accepts the verifier matching the challenge it was shown.
#[derive(Default)]
struct FakeProvider {
    challenge: Mutex<Option<String>>,
    exchanges: Mutex<usize>,
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    fn authorization_url(&self, code_challenge: &str, state: &str) -> String {
        *self.challenge.lock().unwrap() = Some(code_challenge.to_string());
        format!(
            "https://idp.test/authorize?code_challenge={code_challenge}&code_challenge_method=S256&state={state}"
        )
    }

    async fn exchange(&self, code: &str, code_verifier: &str) -> Result<ProviderProfile, ApiError> {
        *self.exchanges.lock().unwrap() += 1;
        let expected = self.challenge.lock().unwrap().clone();
        if code != GOOD_CODE
            || !validate_code_verifier(code_verifier)
            || expected.as_deref() != Some(generate_code_challenge(code_verifier).as_str())
        {
            return Err(ApiError::OAuth("invalid_grant".to_string()));
        }
        Ok(ProviderProfile {
            provider: "fake".to_string(),
            provider_id: "fake-42".to_string(),
            email: "ana@example.com".to_string(),
            name: Some("Ana".to_string()),
            avatar_url: Some("https://idp.test/ana.png".to_string()),
        })
    }
}

struct OAuthApp {
    router: Router,
    provider: Arc<FakeProvider>,
    users: Arc<api::db::MemoryUserStore>,
}

fn oauth_app() -> OAuthApp {
    let (state, _, users) = common::state();
    let provider = Arc::new(FakeProvider::default());
    let router = api::router(state.with_provider(provider.clone()));
    OAuthApp {
        router,
        provider,
        users,
    }
}

/// Start a flow; returns the session cookie and the `state` sent to the provider.
async fn start(app: &OAuthApp, cookies: &[(&str, &str)]) -> (String, String) {
    let response = send(&app.router, Method::GET, "/api/auth/oauth/fake", cookies, None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let url = url::Url::parse(&location(&response)).unwrap();
    let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
    assert_eq!(params["code_challenge_method"], "S256");
    assert_eq!(params["state"].len(), 64);

    let sid = cookie_value(&response, "finance.sid").expect("session cookie");
    (sid, params["state"].clone())
}

async fn callback(app: &OAuthApp, sid: &str, query: &str) -> axum::http::Response<axum::body::Body> {
    send(
        &app.router,
        Method::GET,
        &format!("/api/auth/oauth/fake/callback?{query}"),
        &[("finance.sid", sid)],
        None,
    )
    .await
}

#[tokio::test]
async fn test_full_flow_signs_user_in() {
    let app = oauth_app();
    let (sid, state) = start(&app, &[]).await;

    let response = callback(&app, &sid, &format!("code={GOOD_CODE}&state={state}")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/dashboard");

    let access = cookie_value(&response, "accessToken").expect("access cookie");
    assert!(cookie_value(&response, "refreshToken").is_some());
    assert_eq!(app.users.len().await, 1);

    let me = send(&app.router, Method::GET, "/api/auth/me", &[("accessToken", access.as_str())], None).await;
    let (status, body) = json(me).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["provider"], "fake");
    assert_eq!(body["user"]["avatarUrl"], "https://idp.test/ana.png");
}

#[tokio::test]
async fn test_callback_cannot_be_replayed() {
    let app = oauth_app();
    let (sid, state) = start(&app, &[]).await;
    let query = format!("code={GOOD_CODE}&state={state}");

    let first = callback(&app, &sid, &query).await;
    assert_eq!(location(&first), "/dashboard");

    let second = callback(&app, &sid, &query).await;
    assert_eq!(location(&second), "/login?error=missing_handshake");
    assert!(cookie_value(&second, "accessToken").is_none());
}

#[tokio::test]
async fn test_state_mismatch_rejected_before_exchange() {
    let app = oauth_app();
    let (sid, state) = start(&app, &[]).await;
    let forged: String = state.chars().rev().collect();

    let response = callback(&app, &sid, &format!("code={GOOD_CODE}&state={forged}")).await;
    assert_eq!(location(&response), "/login?error=invalid_state");
    assert_eq!(*app.provider.exchanges.lock().unwrap(), 0);

    // The handshake is gone after a failure too.
    let retry = callback(&app, &sid, &format!("code={GOOD_CODE}&state={state}")).await;
    assert_eq!(location(&retry), "/login?error=missing_handshake");
}

#[tokio::test]
async fn test_callback_without_session() {
    let app = oauth_app();
    let response = send(
        &app.router,
        Method::GET,
        "/api/auth/oauth/fake/callback?code=x&state=y",
        &[],
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?error=missing_handshake");
}

#[tokio::test]
async fn test_provider_denial_and_bad_code() {
    let app = oauth_app();

    let (sid, _) = start(&app, &[]).await;
    let denied = callback(&app, &sid, "error=access_denied").await;
    assert_eq!(location(&denied), "/login?error=access_denied");

    let (sid, state) = start(&app, &[]).await;
    let bad_code = callback(&app, &sid, &format!("code=stolen&state={state}")).await;
    assert_eq!(location(&bad_code), "/login?error=oauth_error");
    assert_eq!(app.users.len().await, 0);
}

#[tokio::test]
async fn test_unknown_provider() {
    let app = oauth_app();
    let response = send(&app.router, Method::GET, "/api/auth/oauth/myspace", &[], None).await;
    let (status, body) = json(response).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "UNKNOWN_PROVIDER");
}

#[tokio::test]
async fn test_signed_in_flow_links_identity() {
    let app = oauth_app();
    let account = register(&app.router, "ana@example.com").await;

    let (sid, state) = start(&app, &[("accessToken", account.access_token.as_str())]).await;
    let response = callback(&app, &sid, &format!("code={GOOD_CODE}&state={state}")).await;
    assert_eq!(location(&response), "/dashboard");

    assert_eq!(app.users.len().await, 1);
    let user_id = account.user_id.parse().unwrap();
    let user = app.users.get(user_id).await.unwrap();
    assert_eq!(user.provider, "local");
    assert!(user.has_identity("fake", "fake-42"));
    assert_eq!(user.avatar_url.as_deref(), Some("https://idp.test/ana.png"));
}
