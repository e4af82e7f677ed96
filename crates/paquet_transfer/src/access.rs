//! The download access gate.
//!
//! A pure decision over read-only inputs: transfer metadata, the caller's
//! credentials and the frozen payment policy. Credential verification
//! failures never escape as errors; every path folds into one of the three
//! decisions below.

use subtle::ConstantTimeEq;

use paquet_token::{verify_claims, verify_short};

use crate::meta::TransferMeta;

/// Credentials a download request may carry, already extracted from query
/// parameters and headers.
#[derive(Debug, Clone, Default)]
pub struct DownloadCredentials {
    pub pin: Option<String>,
    pub plan: Option<String>,
    pub short_token: Option<String>,
    pub claims_token: Option<String>,
}

/// Process-lifetime payment configuration.
#[derive(Debug, Clone)]
pub struct PaymentPolicy {
    pub secret: Vec<u8>,
    pub bypass_plans: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Granted,
    PinRequired,
    PaymentRequired,
}

/// Decide whether a download of `id` is authorized.
///
/// Evaluation order, short-circuiting on the first grant:
/// 1. a configured PIN must match (fail-closed, before any payment check);
/// 2. transfers without a paywall, and callers on a bypass plan, are in;
/// 3. a valid short token for this exact id is in;
/// 4. a valid claims token whose `id` claim equals this id is in;
/// 5. everything else is a payment denial.
pub fn authorize_download(
    id: &str,
    meta: &TransferMeta,
    credentials: &DownloadCredentials,
    policy: &PaymentPolicy,
    now_secs: u64,
) -> AccessDecision {
    if let Some(required_pin) = meta.pin.as_deref() {
        let supplied = credentials.pin.as_deref().unwrap_or("");
        if !bool::from(required_pin.as_bytes().ct_eq(supplied.as_bytes())) {
            return AccessDecision::PinRequired;
        }
    }

    if !meta.require_paid {
        return AccessDecision::Granted;
    }

    if credentials
        .plan
        .as_deref()
        .is_some_and(|plan| policy.bypass_plans.iter().any(|bypass| bypass == plan))
    {
        return AccessDecision::Granted;
    }

    if let Some(short_token) = credentials.short_token.as_deref() {
        if verify_short(id, short_token, &policy.secret, now_secs).is_ok() {
            return AccessDecision::Granted;
        }
    }

    if let Some(claims_token) = credentials.claims_token.as_deref() {
        if verify_claims(claims_token, &policy.secret, now_secs)
            .is_ok_and(|claims| claims.id == id)
        {
            return AccessDecision::Granted;
        }
    }

    AccessDecision::PaymentRequired
}
