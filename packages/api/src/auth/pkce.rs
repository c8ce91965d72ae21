//! # PKCE and CSRF state utilities
//!
//! Values for the OAuth 2.0 Authorization Code flow with Proof Key for Code
//! Exchange (RFC 7636) and the anti-CSRF `state` parameter.
//!
//! | Function | Output |
//! |----------|--------|
//! | [`generate_code_verifier`] | 32 random bytes, base64url without padding (always 43 chars) |
//! | [`generate_code_challenge`] | `base64url(sha256(verifier))` without padding |
//! | [`validate_code_verifier`] | `true` iff the verifier is 43..=128 chars long |
//! | [`generate_state`] | 32 random bytes, hex-encoded (64 chars) |
//! | [`validate_state`] | constant-time equality, `false` on any length mismatch |
//!
//! Every function here is pure apart from reading the OS random source. None of
//! them panics on malformed input and none of them reports the expected value.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Minimum verifier length allowed by RFC 7636.
pub const MIN_VERIFIER_LEN: usize = 43;
/// Maximum verifier length allowed by RFC 7636.
pub const MAX_VERIFIER_LEN: usize = 128;
/// Challenge method sent alongside every challenge.
pub const CHALLENGE_METHOD: &str = "S256";

const RANDOM_BYTES: usize = 32;

fn random_bytes() -> [u8; RANDOM_BYTES] {
    let mut bytes = [0u8; RANDOM_BYTES];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Generate a fresh code verifier.
pub fn generate_code_verifier() -> String {
    URL_SAFE_NO_PAD.encode(random_bytes())
}

/// Derive the S256 code challenge for a verifier.
pub fn generate_code_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Check that a verifier has a length the authorization server accepts.
pub fn validate_code_verifier(verifier: &str) -> bool {
    (MIN_VERIFIER_LEN..=MAX_VERIFIER_LEN).contains(&verifier.len())
}

/// Generate a fresh anti-CSRF state value.
pub fn generate_state() -> String {
    hex::encode(random_bytes())
}

/// Compare a received state against the stored one in constant time.
pub fn validate_state(received: &str, expected: &str) -> bool {
    let (received, expected) = (received.as_bytes(), expected.as_bytes());
    if received.len() != expected.len() || expected.is_empty() {
        return false;
    }
    received.ct_eq(expected).into()
}

/// Verifier and challenge for one authorization attempt.
#[derive(Clone)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

impl PkcePair {
    pub fn new() -> Self {
        let verifier = generate_code_verifier();
        let challenge = generate_code_challenge(&verifier);
        Self {
            verifier,
            challenge,
        }
    }
}

impl Default for PkcePair {
    fn default() -> Self {
        Self::new()
    }
}

// The verifier is a secret until the token exchange.
impl std::fmt::Debug for PkcePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkcePair")
            .field("verifier", &"[redacted]")
            .field("challenge", &self.challenge)
            .finish()
    }
}
