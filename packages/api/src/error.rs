//! # API errors
//!
//! [`ApiError`] is the single error type returned by handlers and middleware.
//! Its [`IntoResponse`] impl renders the structured body every client of this
//! API understands:
//!
//! ```json
//! { "error": "Token de acesso não encontrado", "code": "MISSING_ACCESS_TOKEN" }
//! ```
//!
//! The `code` is stable and machine-readable; the `error` message is for humans.
//! Internal failures are logged with their detail and surface only as a generic
//! `INTERNAL_ERROR`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::auth::cookies::CookieError;
use crate::models::ErrorBody;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Token de acesso não encontrado")]
    MissingAccessToken,
    #[error("Token de acesso inválido ou expirado")]
    InvalidAccessToken,
    #[error("Refresh token não encontrado")]
    MissingRefreshToken,
    #[error("Refresh token inválido ou expirado")]
    InvalidRefreshToken,
    #[error("E-mail ou senha inválidos")]
    InvalidCredentials,
    #[error("Já existe uma conta com este e-mail")]
    EmailTaken,
    #[error("{0}")]
    Validation(String),
    #[error("Provedor de login desconhecido: {0}")]
    UnknownProvider(String),
    #[error("Usuário não encontrado")]
    UserNotFound,
    #[error("Falha na autenticação com o provedor: {0}")]
    OAuth(String),
    #[error(transparent)]
    Cookie(#[from] CookieError),
    #[error("session store error: {0}")]
    Session(#[from] tower_sessions::session::Error),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Stable machine-readable code sent in the response body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingAccessToken => "MISSING_ACCESS_TOKEN",
            Self::InvalidAccessToken => "INVALID_ACCESS_TOKEN",
            Self::MissingRefreshToken => "MISSING_REFRESH_TOKEN",
            Self::InvalidRefreshToken => "INVALID_REFRESH_TOKEN",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::EmailTaken => "EMAIL_TAKEN",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::UnknownProvider(_) => "UNKNOWN_PROVIDER",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::OAuth(_) => "OAUTH_ERROR",
            Self::Cookie(_) | Self::Session(_) | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingAccessToken
            | Self::InvalidAccessToken
            | Self::MissingRefreshToken
            | Self::InvalidRefreshToken
            | Self::InvalidCredentials
            | Self::UserNotFound => StatusCode::UNAUTHORIZED,
            Self::EmailTaken => StatusCode::CONFLICT,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::UnknownProvider(_) => StatusCode::NOT_FOUND,
            Self::OAuth(_) => StatusCode::BAD_GATEWAY,
            Self::Cookie(_) | Self::Session(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn body(&self) -> ErrorBody {
        let error = match self.status() {
            StatusCode::INTERNAL_SERVER_ERROR => "Erro interno do servidor".to_string(),
            _ => self.to_string(),
        };
        ErrorBody {
            error,
            code: self.code().to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(self.body())).into_response()
    }
}
