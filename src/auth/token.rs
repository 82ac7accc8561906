//! Bearer token payload decoding.
//!
//! Access tokens issued by the identity service are JWT-shaped: three
//! base64url segments separated by dots. This module reads the expiry claim
//! out of the middle segment so the session manager can schedule refreshes.
//!
//! The signature is deliberately never verified here. The token comes from
//! the platform's own identity service over TLS and the claims are used only
//! for refresh scheduling; all real authorization happens server-side. A
//! token whose expiry cannot be decoded is treated as already expired.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use serde::Deserialize;

/// Claims this client cares about. Everything else in the payload is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Claims {
    /// Expiry, seconds since epoch.
    #[serde(default)]
    pub exp: Option<i64>,
    /// Issued-at, seconds since epoch.
    #[serde(default)]
    pub iat: Option<i64>,
}

/// Decode the claims segment of a token.
///
/// Returns empty claims on any malformed input: wrong segment count, invalid
/// base64, invalid JSON. Callers must treat a missing `exp` as expired.
pub fn decode_claims(token: &str) -> Claims {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => return Claims::default(),
    };

    // Issuers vary on padding; strip it and decode with the no-pad engine.
    let bytes = match URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')) {
        Ok(bytes) => bytes,
        Err(_) => return Claims::default(),
    };

    serde_json::from_slice(&bytes).unwrap_or_default()
}

/// Milliseconds until the token expires, negative if already expired.
///
/// `None` when the expiry claim cannot be decoded.
pub fn ms_until_expiry(token: &str) -> Option<i64> {
    let exp = decode_claims(token).exp?;
    Some(exp * 1000 - Utc::now().timestamp_millis())
}

/// Whether the token still has at least `min_validity_ms` of life left.
///
/// Undecodable expiry counts as stale.
pub fn is_fresh(token: &str, min_validity_ms: i64) -> bool {
    matches!(ms_until_expiry(token), Some(remaining) if remaining >= min_validity_ms)
}
