//! # API crate: authentication and session renewal for the finance app
//!
//! Shared between the server binary and the HTTP client. Without features the
//! crate only carries the wire types and the PKCE helpers; the `server`
//! feature adds everything that runs behind axum.
//!
//! ## Modules
//!
//! | Module | Feature gate | Purpose |
//! |--------|-------------|---------|
//! | [`auth`] | partly `server` | PKCE, session cookies, the request gate, OAuth handshake, tokens, passwords, identity providers |
//! | [`db`] | `server` | `UserStore` trait and its in-memory implementation |
//! | [`error`] | `server` | `ApiError` and its structured JSON response |
//! | [`models`] | none | `User` and the client-safe `UserInfo`, request/response bodies |
//! | [`routes`] | `server` | the `/api/auth` router |
//! | [`settings`] | `server` | layered configuration (`config.toml`, `FINANCE__*` env) |
//! | [`state`] | `server` | `AppState` shared by handlers |

pub mod auth;
#[cfg(feature = "server")]
pub mod db;
#[cfg(feature = "server")]
pub mod error;
pub mod models;
#[cfg(feature = "server")]
pub mod routes;
#[cfg(feature = "server")]
pub mod settings;
#[cfg(feature = "server")]
pub mod state;

#[cfg(feature = "server")]
pub use error::ApiError;
pub use models::UserInfo;
#[cfg(feature = "server")]
pub use routes::router;
#[cfg(feature = "server")]
pub use state::AppState;
