//! HMAC-SHA256 signatures for inbound webhook deliveries.
//!
//! The provider sends `X-Hub-Signature-256: sha256=<hex>` computed over the raw
//! request body with the shared webhook secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Compute the hex-encoded HMAC-SHA256 of `body`.
pub fn sign_payload(secret: &str, body: &[u8]) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Header value the provider would send for `body`.
pub fn signature_header(secret: &str, body: &[u8]) -> String {
    format!("{SIGNATURE_PREFIX}{}", sign_payload(secret, body))
}

/// Check a `sha256=<hex>` header against `body` in constant time.
///
/// A missing header, wrong prefix or non-hex digest all fail verification.
pub fn verify_signature(secret: &str, body: &[u8], header: Option<&str>) -> bool {
    let Some(digest) = header.and_then(|h| h.trim().strip_prefix(SIGNATURE_PREFIX)) else {
        return false;
    };
    let Ok(expected) = hex::decode(digest) else {
        return false;
    };
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}
