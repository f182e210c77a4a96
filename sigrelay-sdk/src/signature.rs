//! Webhook signature algorithm and verification.
//!
//! The document provider signs every webhook delivery with the tenant's
//! shared secret. The wire format for the header is:
//!
//! ```text
//! X-Signature: {signature}
//! ```
//!
//! where `{signature}` is `HMAC-SHA256(raw_body, secret)` encoded either as
//! lowercase/uppercase hex (optionally prefixed with `sha256=`) or as base64
//! (with or without padding).

/// Header name carrying the HMAC signature of the raw request body.
pub const SIGNATURE_HEADER: &str = "X-Signature";

/// Header name a sender may use to pin the event id explicitly.
pub const EVENT_ID_HEADER: &str = "X-Event-Id";

/// Errors produced by signature operations.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("missing signature")]
    Missing,
    #[error("invalid signature encoding")]
    InvalidEncoding,
    #[error("invalid signature")]
    SignatureMismatch,
}

impl From<ring::error::Unspecified> for SignatureError {
    fn from(_: ring::error::Unspecified) -> Self {
        Self::SignatureMismatch
    }
}

/// Sign a raw body: `HMAC-SHA256(body, key)`, base64 without padding.
pub fn sign_body(body: &[u8], key: &[u8]) -> String {
    let signature = ring::hmac::sign(&ring::hmac::Key::new(ring::hmac::HMAC_SHA256, key), body);
    fast32::base64::RFC4648_NOPAD.encode(signature.as_ref())
}

/// Decode a signature header value into raw signature bytes.
///
/// A 64-character value made only of hex digits is treated as hex; anything
/// else is decoded as base64.
pub fn parse_signature_header(value: &str) -> Result<Box<[u8]>, SignatureError> {
    let value = value.trim();
    let value = value.strip_prefix("sha256=").unwrap_or(value);
    if value.is_empty() {
        return Err(SignatureError::Missing);
    }

    if value.len() == 64 && value.bytes().all(|b| b.is_ascii_hexdigit()) {
        return hex::decode(value)
            .map(Vec::into_boxed_slice)
            .map_err(|_| SignatureError::InvalidEncoding);
    }

    fast32::base64::RFC4648_NOPAD
        .decode_str(value.trim_end_matches('='))
        .map(Vec::into_boxed_slice)
        .map_err(|_| SignatureError::InvalidEncoding)
}

/// Verify `HMAC-SHA256(body, key)` against an encoded header value.
pub fn verify_body(body: &[u8], header_value: &str, key: &[u8]) -> Result<(), SignatureError> {
    let signature = parse_signature_header(header_value)?;
    ring::hmac::verify(
        &ring::hmac::Key::new(ring::hmac::HMAC_SHA256, key),
        body,
        signature.as_ref(),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"tenant-secret";
    const BODY: &[u8] = br#"{"eventType":"document_signed"}"#;

    #[test]
    fn test_base64_signature_roundtrip() {
        let header = sign_body(BODY, SECRET);
        assert!(verify_body(BODY, &header, SECRET).is_ok());
    }

    #[test]
    fn test_hex_signature_with_prefix() {
        let raw = ring::hmac::sign(&ring::hmac::Key::new(ring::hmac::HMAC_SHA256, SECRET), BODY);
        let header = format!("sha256={}", hex::encode(raw.as_ref()));
        assert!(verify_body(BODY, &header, SECRET).is_ok());
    }

    #[test]
    fn test_uppercase_hex_signature() {
        let raw = ring::hmac::sign(&ring::hmac::Key::new(ring::hmac::HMAC_SHA256, SECRET), BODY);
        let header = hex::encode_upper(raw.as_ref());
        assert_eq!(parse_signature_header(&header).unwrap().as_ref(), raw.as_ref());
        assert!(verify_body(BODY, &header, SECRET).is_ok());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let header = sign_body(BODY, SECRET);
        let result = verify_body(br#"{"eventType":"document_voided"}"#, &header, SECRET);
        assert!(matches!(result, Err(SignatureError::SignatureMismatch)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let header = sign_body(BODY, b"other-secret");
        assert!(matches!(
            verify_body(BODY, &header, SECRET),
            Err(SignatureError::SignatureMismatch)
        ));
    }

    #[test]
    fn test_garbage_header() {
        assert!(matches!(
            parse_signature_header("!!not-base64!!"),
            Err(SignatureError::InvalidEncoding)
        ));
        assert!(matches!(
            parse_signature_header("   "),
            Err(SignatureError::Missing)
        ));
    }
}
