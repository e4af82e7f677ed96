//! The JSON-claims payment token (`header.payload.signature`).

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::encoding::{b64u, b64u_decode, hmac_sha256};
use crate::TokenError;

const HEADER_JSON: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Claims carried by the JSON token. `id` names the transfer the payment
/// covers; `amount` and `sub` are informational.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

impl Claims {
    pub fn for_transfer(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            amount: None,
            sub: None,
            exp: None,
        }
    }
}

/// Sign a claims token, binding `exp_secs` into the payload.
pub fn sign_claims(claims: &Claims, exp_secs: u64, secret: &[u8]) -> String {
    let mut bound = claims.clone();
    bound.exp = Some(exp_secs);
    let payload =
        serde_json::to_string(&bound).expect("claims struct serializes to plain json");
    let data = format!("{}.{}", b64u(HEADER_JSON.as_bytes()), b64u(payload.as_bytes()));
    let sig = b64u(&hmac_sha256(secret, data.as_bytes()));
    format!("{data}.{sig}")
}

/// Verify a claims token and return its payload.
///
/// The signature over `header.payload` is checked before the payload is
/// parsed; a token without an `exp` claim never expires.
pub fn verify_claims(token: &str, secret: &[u8], now_secs: u64) -> Result<Claims, TokenError> {
    let mut segments = token.split('.');
    let (Some(header), Some(payload), Some(sig), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(TokenError::InvalidToken);
    };

    let data = format!("{header}.{payload}");
    let expected = b64u(&hmac_sha256(secret, data.as_bytes()));
    if !bool::from(expected.as_bytes().ct_eq(sig.as_bytes())) {
        return Err(TokenError::BadSig);
    }

    let payload_bytes = b64u_decode(payload).ok_or(TokenError::InvalidToken)?;
    let claims: Claims =
        serde_json::from_slice(&payload_bytes).map_err(|_| TokenError::InvalidToken)?;

    if let Some(exp) = claims.exp {
        if now_secs > exp {
            return Err(TokenError::Expired);
        }
    }

    Ok(claims)
}
