use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub(crate) fn b64u(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

pub(crate) fn b64u_decode(segment: &str) -> Option<Vec<u8>> {
    URL_SAFE_NO_PAD.decode(segment).ok()
}

pub(crate) fn hmac_sha256(secret: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac =
        HmacSha256::new_from_slice(secret).expect("hmac accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Lowercase base36, matching the wire form of the short-token expiry field.
pub(crate) fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36_DIGITS[(n % 36) as usize] as char);
        n /= 36;
    }
    digits.iter().rev().collect()
}

pub(crate) fn from_base36(field: &str) -> Option<u64> {
    if field.is_empty() || field.starts_with('+') {
        return None;
    }
    u64::from_str_radix(field, 36).ok()
}

#[cfg(test)]
mod tests {
    use super::{from_base36, to_base36};

    #[test]
    fn base36_round_trips() {
        for n in [0u64, 1, 35, 36, 1_700_000_000, u64::MAX] {
            assert_eq!(from_base36(&to_base36(n)), Some(n));
        }
    }

    #[test]
    fn base36_rejects_garbage() {
        assert_eq!(from_base36(""), None);
        assert_eq!(from_base36("+1"), None);
        assert_eq!(from_base36("not base36!"), None);
    }
}
