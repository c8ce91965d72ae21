use std::sync::Arc;

use api::models::ErrorBody;
use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response from the API, with its structured body when present.
    #[error("{message} ({status}, {code})")]
    Api {
        status: StatusCode,
        code: String,
        message: String,
    },

    /// The session could not be renewed; the local session has been torn down.
    #[error("session refresh failed: {0}")]
    RefreshFailed(Arc<ClientError>),

    /// A `401` arrived after the session it was sent under had already ended.
    #[error("session ended")]
    SessionEnded,

    #[error("request body cannot be replayed")]
    NotReplayable,

    #[error("invalid authorization header: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ClientError {
    /// Build an [`ClientError::Api`] from a non-success response.
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status();
        match response.json::<ErrorBody>().await {
            Ok(body) => Self::Api {
                status,
                code: body.code,
                message: body.error,
            },
            Err(_) => Self::Api {
                status,
                code: "HTTP_ERROR".to_string(),
                message: status
                    .canonical_reason()
                    .unwrap_or("unexpected response")
                    .to_string(),
            },
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http(e) => e.status(),
            Self::Api { status, .. } => Some(*status),
            Self::RefreshFailed(inner) => inner.status(),
            _ => None,
        }
    }

    /// The API error code, looking through a failed refresh.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code),
            Self::RefreshFailed(inner) => inner.code(),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }
}
