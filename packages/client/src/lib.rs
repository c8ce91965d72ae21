//! # Client for the finance auth API
//!
//! - [`ApiClient`] sends requests with the current access token and renews
//!   the session through `/api/auth/refresh` when the API answers `401`.
//! - [`AuthSession`] holds the signed-in user and performs login,
//!   registration and logout.
//!
//! ```ignore
//! let navigator: Arc<dyn Navigator> = Arc::new(|path: &str| router.push(path));
//! let client = ApiClient::new(ClientConfig::new("http://localhost:8080")?, navigator.clone())?;
//! let session = AuthSession::new(client, navigator);
//! session.init().await;
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod http;

pub use auth::{AuthSession, AuthState, UserPatch};
pub use config::ClientConfig;
pub use error::ClientError;
pub use http::{ApiClient, Navigator, TokenStore};
