//! # `/api/auth` router
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | POST | `/api/auth/register` | [`register`] |
//! | POST | `/api/auth/login` | [`login`] |
//! | POST | `/api/auth/refresh` | [`refresh`] |
//! | POST | `/api/auth/logout` | [`logout`] |
//! | GET | `/api/auth/me` | [`me`], behind [`require_auth`] |
//! | GET | `/api/auth/oauth/{provider}` | [`oauth_start`] |
//! | GET | `/api/auth/oauth/{provider}/callback` | [`oauth_callback`] |
//!
//! Session tokens travel in the `accessToken` / `refreshToken` cookies set by
//! the [`CookieManager`](crate::auth::CookieManager). The OAuth handshake lives
//! in a short-lived server-side session (`finance.sid`, `SameSite=Lax` so the
//! provider's redirect back carries it).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tower_sessions::cookie::SameSite;
use tower_sessions::{Expiry, MemoryStore, Session, SessionManagerLayer};

use crate::auth::pkce::{generate_state, validate_code_verifier, validate_state, PkcePair};
use crate::auth::session::{begin_handshake, take_handshake, HANDSHAKE_TTL_MINUTES};
use crate::auth::{
    extract_token_from_cookies, hash_password, require_auth, verify_password, AuthenticatedUser,
    OAuthHandshake, RequestContext,
};
use crate::error::ApiError;
use crate::models::{
    AuthResponse, LoginRequest, MeResponse, MessageResponse, RefreshResponse, RegisterRequest, User,
};
use crate::state::AppState;

/// Name of the server-side session cookie holding the OAuth handshake.
pub const SESSION_COOKIE: &str = "finance.sid";

const MIN_PASSWORD_LEN: usize = 8;

pub fn router(state: AppState) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_name(SESSION_COOKIE)
        .with_secure(state.environment.is_production())
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            HANDSHAKE_TTL_MINUTES,
        )));

    let protected = Router::new()
        .route("/api/auth/me", get(me))
        .route_layer(middleware::from_fn(require_auth));

    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/oauth/{provider}", get(oauth_start))
        .route("/api/auth/oauth/{provider}/callback", get(oauth_callback))
        .merge(protected)
        .layer(middleware::from_fn(extract_token_from_cookies))
        .layer(session_layer)
        .with_state(state)
}

/// Issue a token pair for `user` and put both cookies on `jar`.
async fn open_session(
    state: &AppState,
    jar: CookieJar,
    user: &User,
) -> Result<(CookieJar, String), ApiError> {
    let tokens = state.tokens.issue(user.id).await?;
    let jar = state
        .cookies
        .set_session(jar, &tokens.access_token, &tokens.refresh_token)?;
    Ok((jar, tokens.access_token))
}

pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, CookieJar, Json<AuthResponse>), ApiError> {
    let email = request.email.trim();
    let name = request.name.trim();

    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::Validation("E-mail inválido".to_string()));
    }
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "A senha deve ter pelo menos {} caracteres",
            MIN_PASSWORD_LEN
        )));
    }
    if name.is_empty() {
        return Err(ApiError::Validation("Nome é obrigatório".to_string()));
    }

    let password_hash = hash_password(&request.password)?;
    let user = state.users.create_local(email, name, password_hash).await?;
    let (jar, access_token) = open_session(&state, jar, &user).await?;

    tracing::info!(user_id = %user.id, "registered local account");
    Ok((
        StatusCode::CREATED,
        jar,
        Json(AuthResponse {
            user: user.to_info(),
            access_token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), ApiError> {
    let user = state
        .users
        .find_local(&request.email)
        .await
        .ok_or(ApiError::InvalidCredentials)?;
    let hash = user
        .password_hash
        .as_deref()
        .ok_or(ApiError::InvalidCredentials)?;

    if !verify_password(&request.password, hash)? {
        tracing::info!(user_id = %user.id, "password login rejected");
        return Err(ApiError::InvalidCredentials);
    }

    let (jar, access_token) = open_session(&state, jar, &user).await?;
    tracing::info!(user_id = %user.id, "password login");
    Ok((
        jar,
        Json(AuthResponse {
            user: user.to_info(),
            access_token,
        }),
    ))
}

/// Mint a new access token from the refresh cookie.
///
/// A rejected refresh token also clears both cookies so the browser stops
/// presenting a dead session.
pub async fn refresh(
    State(state): State<AppState>,
    context: RequestContext,
    jar: CookieJar,
) -> Result<(CookieJar, Json<RefreshResponse>), Response> {
    let Some(refresh_token) = context.refresh_token else {
        return Err(ApiError::MissingRefreshToken.into_response());
    };

    let access_token = match state.tokens.refresh(&refresh_token).await {
        Ok(token) => token,
        Err(e) => {
            tracing::info!(code = e.code(), "refresh rejected");
            return Err((state.cookies.clear_auth_cookies(jar), e).into_response());
        }
    };

    let jar = state
        .cookies
        .set_access_token(jar, &access_token)
        .map_err(|e| ApiError::from(e).into_response())?;
    Ok((jar, Json(RefreshResponse { access_token })))
}

pub async fn logout(
    State(state): State<AppState>,
    context: RequestContext,
    session: Session,
    jar: CookieJar,
) -> Result<(CookieJar, Json<MessageResponse>), ApiError> {
    for token in [&context.access_token, &context.refresh_token]
        .into_iter()
        .flatten()
    {
        state.tokens.revoke(token).await;
    }
    session.flush().await?;

    Ok((
        state.cookies.clear_auth_cookies(jar),
        Json(MessageResponse {
            message: "Sessão encerrada".to_string(),
        }),
    ))
}

pub async fn me(AuthenticatedUser { user }: AuthenticatedUser) -> Json<MeResponse> {
    Json(MeResponse {
        user: user.to_info(),
    })
}

/// Start the authorization code flow: store the PKCE verifier and state in
/// the session and redirect to the provider.
///
/// A caller that is already signed in gets the provider identity linked to
/// their account on callback.
pub async fn oauth_start(
    State(state): State<AppState>,
    Path(provider_name): Path<String>,
    context: RequestContext,
    session: Session,
) -> Result<Redirect, ApiError> {
    let provider = state.provider(&provider_name)?;

    let user_id = match context.access_token {
        Some(token) => state.tokens.verify_access(&token).await.ok(),
        None => None,
    };

    let pkce = PkcePair::new();
    let oauth_state = generate_state();
    let url = provider.authorization_url(&pkce.challenge, &oauth_state);
    begin_handshake(
        &session,
        &OAuthHandshake::new(provider.name(), pkce.verifier, oauth_state, user_id),
    )
    .await?;

    tracing::debug!(provider = provider.name(), linking = user_id.is_some(), "OAuth flow started");
    Ok(Redirect::to(&url))
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

pub async fn oauth_callback(
    State(state): State<AppState>,
    Path(provider_name): Path<String>,
    Query(params): Query<CallbackParams>,
    session: Session,
    jar: CookieJar,
) -> Response {
    match complete_oauth(&state, &provider_name, params, &session, jar).await {
        Ok(jar) => (jar, Redirect::to(&state.home_path)).into_response(),
        Err(code) => {
            Redirect::to(&format!("{}?error={}", state.login_path, code)).into_response()
        }
    }
}

/// Validate the callback against the stored handshake and sign the user in.
///
/// The error is the code shown to the login page.
async fn complete_oauth(
    state: &AppState,
    provider_name: &str,
    params: CallbackParams,
    session: &Session,
    jar: CookieJar,
) -> Result<CookieJar, &'static str> {
    // Consumed before any check so a failed callback cannot be retried.
    let handshake = match take_handshake(session).await {
        Ok(Some(handshake)) => handshake,
        Ok(None) => {
            tracing::warn!(provider = provider_name, "OAuth callback without a pending handshake");
            return Err("missing_handshake");
        }
        Err(e) => {
            tracing::error!("Failed to read OAuth handshake: {}", e);
            return Err("session_error");
        }
    };

    if let Some(error) = params.error {
        tracing::warn!(provider = provider_name, error = %error, "provider denied authorization");
        return Err("access_denied");
    }
    if handshake.provider != provider_name {
        tracing::warn!(
            expected = %handshake.provider,
            received = provider_name,
            "OAuth callback for a different provider"
        );
        return Err("provider_mismatch");
    }
    if handshake.is_expired() {
        tracing::warn!(provider = provider_name, "OAuth handshake expired");
        return Err("handshake_expired");
    }
    let Some(received_state) = params.state else {
        tracing::error!(provider = provider_name, "OAuth callback missing state");
        return Err("missing_state");
    };
    if !validate_state(&received_state, &handshake.oauth_state) {
        tracing::warn!(provider = provider_name, "OAuth state mismatch");
        return Err("invalid_state");
    }
    let Some(code) = params.code else {
        tracing::error!(provider = provider_name, "OAuth callback missing code");
        return Err("missing_code");
    };
    if !validate_code_verifier(&handshake.code_verifier) {
        tracing::error!(provider = provider_name, "stored code verifier is malformed");
        return Err("invalid_verifier");
    }

    let provider = state.provider(provider_name).map_err(|_| "unknown_provider")?;
    let profile = provider
        .exchange(&code, &handshake.code_verifier)
        .await
        .map_err(|e| {
            tracing::error!(provider = provider_name, "OAuth exchange error: {}", e);
            "oauth_error"
        })?;

    let user = match handshake.user_id {
        Some(user_id) => state.users.link_identity(user_id, &profile).await,
        None => state.users.upsert_oauth(&profile).await,
    }
    .map_err(|e| {
        tracing::error!(provider = provider_name, "Failed to resolve OAuth account: {}", e);
        "account_error"
    })?;

    let (jar, _) = open_session(state, jar, &user).await.map_err(|e| {
        tracing::error!("Failed to open session: {}", e);
        "session_error"
    })?;

    tracing::info!(user_id = %user.id, provider = provider_name, "OAuth login");
    Ok(jar)
}
