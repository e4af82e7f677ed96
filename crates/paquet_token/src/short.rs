//! The compact `<exp-base36>.<sig10>` payment token.

use subtle::ConstantTimeEq;

use crate::encoding::{b64u, from_base36, hmac_sha256, to_base36};
use crate::TokenError;

/// Sign a short payment token for `transfer_id` expiring at `exp_secs`
/// (Unix seconds).
///
/// Deterministic: identical inputs always yield the identical token, which
/// makes re-issuance idempotent. The expiry is bound under the MAC, so this
/// is not a replay weakness.
pub fn sign_short(transfer_id: &str, exp_secs: u64, secret: &[u8]) -> String {
    let exp36 = to_base36(exp_secs);
    let mac = hmac_sha256(secret, format!("{transfer_id}.{exp36}").as_bytes());
    format!("{exp36}.{}", b64u(&mac[..10]))
}

/// Verify a short token against `transfer_id` and the supplied clock.
///
/// The signature is recomputed from the expiry *claimed inside the token*
/// and the whole token string is compared in constant time, so the MAC is
/// the only integrity guarantee. Returns the embedded expiry on success.
pub fn verify_short(
    transfer_id: &str,
    token: &str,
    secret: &[u8],
    now_secs: u64,
) -> Result<u64, TokenError> {
    let mut fields = token.split('.');
    let (Some(exp36), Some(sig), None) = (fields.next(), fields.next(), fields.next()) else {
        return Err(TokenError::InvalidPp);
    };
    if exp36.is_empty() || sig.is_empty() {
        return Err(TokenError::InvalidPp);
    }

    let exp = from_base36(exp36)
        .filter(|exp| *exp > 0)
        .ok_or(TokenError::InvalidPp)?;
    if now_secs > exp {
        return Err(TokenError::Expired);
    }

    let expected = sign_short(transfer_id, exp, secret);
    if bool::from(expected.as_bytes().ct_eq(token.as_bytes())) {
        Ok(exp)
    } else {
        Err(TokenError::BadSig)
    }
}
