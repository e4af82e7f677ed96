//! Payment bearer tokens for paquet transfers.
//!
//! Two credential variants share one shared-secret HMAC-SHA256 scheme:
//!
//! - the *short token* `<exp-base36>.<sig10>`, a compact query-string
//!   credential whose signature is the first ten MAC bytes over
//!   `<transfer-id>.<exp-base36>`;
//! - the *claims token* `header.payload.signature`, three URL-safe-base64
//!   segments carrying a JSON claims object (HS256-shaped, no asymmetric
//!   crypto, no key rotation).
//!
//! Verification is stateless: the expiry validated against the clock is the
//! one embedded under the MAC, so a holder of the secret can mint any
//! lifetime but a captured token can never be extended. Tokens are bearer
//! credentials and are not revocable before expiry.

pub mod claims;
pub mod short;

mod encoding;

pub use claims::{sign_claims, verify_claims, Claims};
pub use short::{sign_short, verify_short};

use thiserror::Error;

/// Credential verification failure.
///
/// Returned as a plain value so the access gate can fold every variant into
/// a binary allow/deny decision without special-casing error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("malformed short payment token")]
    InvalidPp,
    #[error("malformed claims token")]
    InvalidToken,
    #[error("token signature mismatch")]
    BadSig,
    #[error("token past its expiry")]
    Expired,
}

impl TokenError {
    /// Stable machine-readable code for structured error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            TokenError::InvalidPp => "invalid_pp",
            TokenError::InvalidToken => "invalid_token",
            TokenError::BadSig => "bad_sig",
            TokenError::Expired => "expired",
        }
    }
}
