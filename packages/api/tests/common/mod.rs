#![allow(dead_code)]

use std::sync::Arc;

use api::auth::MemoryTokenService;
use api::db::MemoryUserStore;
use api::settings::Settings;
use api::AppState;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, Response, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

pub struct TestApp {
    pub router: Router,
    pub tokens: Arc<MemoryTokenService>,
    pub users: Arc<MemoryUserStore>,
}

pub fn state() -> (AppState, Arc<MemoryTokenService>, Arc<MemoryUserStore>) {
    let tokens = Arc::new(MemoryTokenService::new());
    let users = Arc::new(MemoryUserStore::new());
    let state = AppState::new(&Settings::default(), tokens.clone(), users.clone());
    (state, tokens, users)
}

pub fn app() -> TestApp {
    let (state, tokens, users) = state();
    TestApp {
        router: api::router(state),
        tokens,
        users,
    }
}

pub async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    cookies: &[(&str, &str)],
    body: Option<Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if !cookies.is_empty() {
        let cookie = cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        builder = builder.header(header::COOKIE, cookie);
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    router.clone().oneshot(request).await.unwrap()
}

pub async fn json(response: Response<Body>) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

/// Every `Set-Cookie` header for `name`, raw.
pub fn set_cookies(response: &Response<Body>, name: &str) -> Vec<String> {
    let prefix = format!("{name}=");
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter(|v| v.starts_with(&prefix))
        .map(str::to_string)
        .collect()
}

/// Value of the last `Set-Cookie` for `name`.
pub fn cookie_value(response: &Response<Body>, name: &str) -> Option<String> {
    set_cookies(response, name).last().map(|raw| {
        raw[name.len() + 1..]
            .split(';')
            .next()
            .unwrap_or_default()
            .to_string()
    })
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("location header")
        .to_str()
        .unwrap()
        .to_string()
}

/// Tokens and user id of a freshly registered account.
pub struct Registered {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: String,
}

pub async fn register(router: &Router, email: &str) -> Registered {
    let response = send(
        router,
        Method::POST,
        "/api/auth/register",
        &[],
        Some(serde_json::json!({
            "email": email,
            "password": "correct horse",
            "name": "Ana Souza"
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let access_token = cookie_value(&response, "accessToken").unwrap();
    let refresh_token = cookie_value(&response, "refreshToken").unwrap();
    let (_, body) = json(response).await;

    Registered {
        user_id: body["user"]["id"].as_str().unwrap().to_string(),
        access_token,
        refresh_token,
    }
}
