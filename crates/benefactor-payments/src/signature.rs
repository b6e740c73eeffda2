//! Stripe Webhook Signatures
//!
//! Header format: `t=<unix seconds>,v1=<hex hmac>[,v1=…][,v0=…]`.
//! The signed payload is `"{t}.{raw body}"`, keyed with the endpoint's
//! `whsec_…` secret.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{PaymentError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed event before it is treated as a replay
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Verify a `Stripe-Signature` header against the current time
pub fn verify_signature(payload: &[u8], header: &str, secret: &str, tolerance_secs: i64) -> Result<()> {
    verify_signature_at(payload, header, secret, tolerance_secs, Utc::now().timestamp())
}

/// Verify a `Stripe-Signature` header as of `now`
pub fn verify_signature_at(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<()> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<Vec<u8>> = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => {
                timestamp = Some(value.parse().map_err(|_| {
                    PaymentError::WebhookSignature("malformed timestamp".into())
                })?);
            }
            "v1" => {
                // Unparseable entries can't match; skip them.
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| PaymentError::WebhookSignature("missing timestamp".into()))?;
    if signatures.is_empty() {
        return Err(PaymentError::WebhookSignature("no v1 signature".into()));
    }
    let drift = now.abs_diff(timestamp);
    if drift > tolerance_secs.unsigned_abs() {
        return Err(PaymentError::WebhookSignature(format!(
            "timestamp outside tolerance ({drift}s)"
        )));
    }

    let mac = signed_mac(payload, secret, timestamp)?;
    if signatures
        .iter()
        .any(|sig| mac.clone().verify_slice(sig).is_ok())
    {
        Ok(())
    } else {
        Err(PaymentError::WebhookSignature("no matching signature".into()))
    }
}

/// Produce a `Stripe-Signature` header for `payload`.
///
/// Used by tests and local tooling that replays events.
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> Result<String> {
    let mac = signed_mac(payload, secret, timestamp)?;
    Ok(format!(
        "t={timestamp},v1={}",
        hex::encode(mac.finalize().into_bytes())
    ))
}

fn signed_mac(payload: &[u8], secret: &str, timestamp: i64) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| PaymentError::Config(format!("webhook secret: {e}")))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test123secret456";
    const PAYLOAD: &[u8] = b"{\"type\":\"checkout.session.completed\"}";
    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_valid_signature() {
        let header = sign_payload(PAYLOAD, SECRET, NOW).unwrap();
        assert!(verify_signature_at(PAYLOAD, &header, SECRET, DEFAULT_TOLERANCE_SECS, NOW).is_ok());
    }

    #[test]
    fn test_wrong_secret() {
        let header = sign_payload(PAYLOAD, "wrong_secret", NOW).unwrap();
        let result = verify_signature_at(PAYLOAD, &header, SECRET, DEFAULT_TOLERANCE_SECS, NOW);
        assert!(matches!(result, Err(PaymentError::WebhookSignature(_))));
    }

    #[test]
    fn test_modified_payload() {
        let header = sign_payload(PAYLOAD, SECRET, NOW).unwrap();
        let tampered = b"{\"type\":\"checkout.session.completed\",\"hacked\":true}";
        assert!(verify_signature_at(tampered, &header, SECRET, DEFAULT_TOLERANCE_SECS, NOW).is_err());
    }

    #[test]
    fn test_old_timestamp_rejected() {
        let header = sign_payload(PAYLOAD, SECRET, NOW - 600).unwrap();
        assert!(verify_signature_at(PAYLOAD, &header, SECRET, DEFAULT_TOLERANCE_SECS, NOW).is_err());
    }

    #[test]
    fn test_extreme_timestamp_rejected() {
        for t in [i64::MIN, i64::MIN + 1, i64::MAX] {
            let header = format!("t={t},v1=00");
            let result = verify_signature_at(b"{}", &header, SECRET, DEFAULT_TOLERANCE_SECS, NOW);
            assert!(matches!(result, Err(PaymentError::WebhookSignature(_))));
        }
        let header = format!("t={},v1=00", i64::MIN);
        assert!(verify_signature_at(b"{}", &header, SECRET, DEFAULT_TOLERANCE_SECS, i64::MAX).is_err());
    }

    #[test]
    fn test_missing_parts() {
        let header = sign_payload(PAYLOAD, SECRET, NOW).unwrap();
        let v1_only = header.split(',').nth(1).unwrap();
        assert!(verify_signature_at(PAYLOAD, v1_only, SECRET, DEFAULT_TOLERANCE_SECS, NOW).is_err());
        assert!(verify_signature_at(PAYLOAD, &format!("t={NOW}"), SECRET, DEFAULT_TOLERANCE_SECS, NOW).is_err());
        assert!(verify_signature_at(PAYLOAD, "garbage", SECRET, DEFAULT_TOLERANCE_SECS, NOW).is_err());
    }

    #[test]
    fn test_any_v1_may_match() {
        let good = sign_payload(PAYLOAD, SECRET, NOW).unwrap();
        let good_sig = good.split_once("v1=").unwrap().1;
        let header = format!("t={NOW},v1=deadbeef,v1={good_sig},v0=ignored");
        assert!(verify_signature_at(PAYLOAD, &header, SECRET, DEFAULT_TOLERANCE_SECS, NOW).is_ok());
    }
}
