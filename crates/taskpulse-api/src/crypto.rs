//! Webhook signature verification.
//!
//! The tracking service signs each delivery with HMAC-SHA256 over the raw
//! body and sends it as `X-Hub-Signature-256: sha256=<hex>`.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the delivery signature.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

const SIGNATURE_PREFIX: &str = "sha256=";

/// Signature validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    /// Missing signature header.
    MissingSignature,
    /// Invalid signature format.
    InvalidFormat(String),
    /// Signature verification failed.
    VerificationFailed,
    /// Invalid secret key.
    InvalidSecret,
}

impl fmt::Display for SignatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSignature => write!(f, "signature header missing"),
            Self::InvalidFormat(format) => write!(f, "invalid signature format: {format}"),
            Self::VerificationFailed => write!(f, "signature mismatch"),
            Self::InvalidSecret => write!(f, "invalid secret key"),
        }
    }
}

impl std::error::Error for SignatureError {}

/// Verifies a `sha256=<hex>` signature over `payload`.
///
/// # Errors
///
/// Returns the reason the signature was rejected.
///
/// # Example
///
/// ```
/// use taskpulse_api::crypto::{generate_hmac_hex, verify_signature};
///
/// let payload = br#"{"action":"opened"}"#;
/// let signature = format!("sha256={}", generate_hmac_hex(payload, "secret").unwrap());
///
/// assert!(verify_signature(payload, Some(&signature), "secret").is_ok());
/// assert!(verify_signature(payload, None, "secret").is_err());
/// ```
pub fn verify_signature(
    payload: &[u8],
    signature: Option<&str>,
    secret: &str,
) -> Result<(), SignatureError> {
    let signature = signature.map(str::trim).filter(|s| !s.is_empty());
    let signature = signature.ok_or(SignatureError::MissingSignature)?;

    let provided = parse_signature_format(signature)?;
    let expected = generate_hmac_hex(payload, secret)?;

    if timing_safe_eq(&provided.to_ascii_lowercase(), &expected) {
        Ok(())
    } else {
        Err(SignatureError::VerificationFailed)
    }
}

/// Generates HMAC-SHA256 signature as lowercase hex.
///
/// # Errors
///
/// Returns `SignatureError::InvalidSecret` if the secret key is empty.
pub fn generate_hmac_hex(payload: &[u8], secret: &str) -> Result<String, SignatureError> {
    if secret.is_empty() {
        return Err(SignatureError::InvalidSecret);
    }

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::InvalidSecret)?;

    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn parse_signature_format(signature: &str) -> Result<&str, SignatureError> {
    let hex = signature.strip_prefix(SIGNATURE_PREFIX).ok_or_else(|| {
        SignatureError::InvalidFormat(format!("expected 'sha256=<hex>', got: {signature}"))
    })?;

    if hex.len() != 64 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(SignatureError::InvalidFormat("digest must be 64 hex characters".into()));
    }

    Ok(hex)
}

/// Constant-time string comparison.
fn timing_safe_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (a_byte, b_byte) in a.bytes().zip(b.bytes()) {
        result |= a_byte ^ b_byte;
    }

    result == 0
}
