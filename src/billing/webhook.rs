use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use super::types::WebhookEvent;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq)]
pub enum WebhookError {
    #[error("missing signature header")]
    MissingSignature,

    #[error("malformed signature header")]
    MalformedHeader,

    #[error("timestamp outside the tolerance window")]
    TimestampOutsideTolerance,

    #[error("no matching v1 signature")]
    SignatureMismatch,

    #[error("invalid event payload: {0}")]
    InvalidPayload(String),
}

/// Checks a `t=<unix>,v1=<hex>[,v1=...]` header against `HMAC-SHA256(secret, "{t}.{payload}")`
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<(), WebhookError> {
    if header.trim().is_empty() {
        return Err(WebhookError::MissingSignature);
    }

    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<Vec<u8>> = vec![];
    for part in header.split(',') {
        let (key, value) = part.trim().split_once('=').ok_or(WebhookError::MalformedHeader)?;
        match key {
            "t" => timestamp = Some(value.parse().map_err(|_| WebhookError::MalformedHeader)?),
            "v1" => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(WebhookError::MalformedHeader)?;
    if signatures.is_empty() {
        return Err(WebhookError::SignatureMismatch);
    }
    if tolerance_secs > 0 && now.abs_diff(timestamp) > tolerance_secs.unsigned_abs() {
        return Err(WebhookError::TimestampOutsideTolerance);
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| WebhookError::MalformedHeader)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    for candidate in &signatures {
        // verify_slice compares in constant time
        if mac.clone().verify_slice(candidate).is_ok() {
            return Ok(());
        }
    }
    Err(WebhookError::SignatureMismatch)
}

pub fn parse_event(payload: &[u8]) -> Result<WebhookEvent, WebhookError> {
    serde_json::from_slice(payload).map_err(|e| WebhookError::InvalidPayload(e.to_string()))
}

/// Header value a sender would produce; used by tests and local tooling
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return format!("t={}", timestamp),
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const NOW: i64 = 1_700_000_000;

    #[test]
    fn accepts_valid_signature() {
        let payload = br#"{"type":"price.created","data":{"object":{}}}"#;
        let header = sign_payload(payload, SECRET, NOW);
        assert_eq!(verify_signature(payload, &header, SECRET, 300, NOW + 10), Ok(()));
    }

    #[test]
    fn accepts_any_matching_v1_among_several() {
        let payload = b"{}";
        let good = sign_payload(payload, SECRET, NOW);
        let v1 = good.split("v1=").nth(1).unwrap();
        let header = format!("t={},v1={},v1={}", NOW, "00".repeat(32), v1);
        assert_eq!(verify_signature(payload, &header, SECRET, 300, NOW), Ok(()));
    }

    #[test]
    fn rejects_tampered_payload_and_wrong_secret() {
        let header = sign_payload(b"{\"a\":1}", SECRET, NOW);
        assert_eq!(verify_signature(b"{\"a\":2}", &header, SECRET, 300, NOW), Err(WebhookError::SignatureMismatch));
        assert_eq!(verify_signature(b"{\"a\":1}", &header, "other", 300, NOW), Err(WebhookError::SignatureMismatch));
    }

    #[test]
    fn rejects_stale_timestamps() {
        let header = sign_payload(b"{}", SECRET, NOW - 1_000);
        assert_eq!(verify_signature(b"{}", &header, SECRET, 300, NOW), Err(WebhookError::TimestampOutsideTolerance));
    }

    #[test]
    fn rejects_malformed_headers() {
        assert_eq!(verify_signature(b"{}", "", SECRET, 300, NOW), Err(WebhookError::MissingSignature));
        assert_eq!(verify_signature(b"{}", "garbage", SECRET, 300, NOW), Err(WebhookError::MalformedHeader));
        assert_eq!(verify_signature(b"{}", "v1=abcd", SECRET, 300, NOW), Err(WebhookError::MalformedHeader));
    }

    #[test]
    fn signature_is_lowercase_hex_and_non_hex_v1_is_ignored() {
        let header = sign_payload(b"{}", SECRET, NOW);
        let v1 = header.split("v1=").nth(1).unwrap();
        assert_eq!(v1.len(), 64);
        assert!(v1.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));

        let header = format!("t={},v1=zz{}", NOW, &v1[2..]);
        assert_eq!(verify_signature(b"{}", &header, SECRET, 300, NOW), Err(WebhookError::SignatureMismatch));
    }

    #[test]
    fn extreme_timestamps_are_stale_not_a_crash() {
        let header = sign_payload(b"{}", SECRET, i64::MIN);
        assert_eq!(verify_signature(b"{}", &header, SECRET, 300, NOW), Err(WebhookError::TimestampOutsideTolerance));
    }

    #[test]
    fn parses_events() {
        let event = parse_event(br#"{"id":"evt_1","type":"customer.subscription.updated","api_version":"2025-03-31.basil","data":{"object":{"id":"sub_1"}}}"#).unwrap();
        assert_eq!(event.kind, "customer.subscription.updated");
        assert_eq!(event.object_id(), Some("sub_1"));
        assert!(parse_event(b"not json").is_err());
    }
}
