//! Data models for the application.

mod auth;
mod user;

pub use auth::{
    AuthResponse, ErrorBody, LoginRequest, MeResponse, MessageResponse, RefreshResponse,
    RegisterRequest,
};
#[cfg(feature = "server")]
pub use user::{Identity, User};
pub use user::UserInfo;
