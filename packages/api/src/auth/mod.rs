//! Authentication: PKCE values, session cookies, token issuance, the request
//! gate and OAuth identity providers.

pub mod pkce;

#[cfg(feature = "server")]
mod config;
#[cfg(feature = "server")]
pub mod cookies;
#[cfg(feature = "server")]
pub mod middleware;
#[cfg(feature = "server")]
mod password;
#[cfg(feature = "server")]
pub mod provider;
#[cfg(feature = "server")]
pub mod session;
#[cfg(feature = "server")]
pub mod tokens;

/// Name of the HttpOnly cookie carrying the access token.
pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
/// Name of the HttpOnly cookie carrying the refresh token.
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

#[cfg(feature = "server")]
pub use config::OAuthConfig;
#[cfg(feature = "server")]
pub use cookies::{CookieAttributes, CookieError, CookieManager, CookieOptions};
#[cfg(feature = "server")]
pub use middleware::{extract_token_from_cookies, require_auth, AuthenticatedUser, RequestContext};
#[cfg(feature = "server")]
pub use password::{hash_password, verify_password};
#[cfg(feature = "server")]
pub use provider::{IdentityProvider, OAuthProvider, ProviderKind, ProviderProfile};
#[cfg(feature = "server")]
pub use session::{OAuthHandshake, SESSION_HANDSHAKE_KEY};
#[cfg(feature = "server")]
pub use tokens::{MemoryTokenService, TokenKind, TokenPair, TokenService};
