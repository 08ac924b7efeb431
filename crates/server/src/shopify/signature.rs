//! HMAC-SHA256 signatures used by Shopify.
//!
//! - OAuth callbacks: hex digest over the sorted query string, sent as `hmac`
//! - Webhook deliveries: base64 digest over the raw body, sent as `X-Shopify-Hmac-Sha256`

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Query parameters excluded from the OAuth signature message.
const UNSIGNED_PARAMS: &[&str] = &["hmac", "signature"];

fn digest(secret: &str, message: &[u8]) -> Option<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(message);
    Some(mac.finalize().into_bytes().to_vec())
}

/// Build the OAuth signature message: `key=value` pairs sorted by key, joined by `&`.
#[must_use]
pub fn query_message(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .filter(|(k, _)| !UNSIGNED_PARAMS.contains(&k.as_str()))
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Hex HMAC of the sorted query parameters.
#[must_use]
pub fn sign_query(params: &BTreeMap<String, String>, secret: &str) -> String {
    digest(secret, query_message(params).as_bytes()).map_or_else(String::new, hex::encode)
}

/// Verify the `hmac` parameter of an OAuth callback.
#[must_use]
pub fn verify_query(params: &BTreeMap<String, String>, secret: &str) -> bool {
    let Some(provided) = params.get("hmac") else {
        return false;
    };
    let computed = sign_query(params, secret);
    !computed.is_empty() && constant_time_compare(&computed, provided)
}

/// Base64 HMAC of a webhook body.
#[must_use]
pub fn sign_body(body: &[u8], secret: &str) -> String {
    digest(secret, body).map_or_else(String::new, |d| STANDARD.encode(d))
}

/// Verify a webhook's `X-Shopify-Hmac-Sha256` header against its raw body.
#[must_use]
pub fn verify_body(body: &[u8], provided: &str, secret: &str) -> bool {
    let computed = sign_body(body, secret);
    !computed.is_empty() && constant_time_compare(&computed, provided.trim())
}

/// Constant-time string comparison to prevent timing attacks.
#[must_use]
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}
