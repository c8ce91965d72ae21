//! # Password hashing and verification (Argon2id)
//!
//! Used by the email + password path of `/api/auth/register` and
//! `/api/auth/login`:
//!
//! - [`hash_password`]: random salt from [`OsRng`], default Argon2id
//!   parameters, PHC-format result (`$argon2id$v=19$m=19456,t=2,p=1$...`) kept in
//!   [`User::password_hash`](crate::models::User::password_hash).
//!
//! - [`verify_password`]: `Ok(true)` on match, `Ok(false)` on mismatch, `Err` if
//!   the stored hash is malformed.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::ApiError;

/// Hash a password using Argon2id. Returns a PHC-format string.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Verify a password against a PHC-format hash string.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, ApiError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| ApiError::internal(format!("Invalid password hash: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
