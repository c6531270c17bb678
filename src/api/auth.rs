//! API-key guard for operator endpoints.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::app_state::AppState;
use crate::error::GatewayError;

/// Header carrying the operator key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Extractor that rejects the request unless `x-api-key` matches the
/// configured key. Passes everything through when no key is configured,
/// which startup only permits with `ALLOW_INSECURE=true`.
#[derive(Debug, Clone, Copy)]
pub struct RequireApiKey;

impl FromRequestParts<AppState> for RequireApiKey {
    type Rejection = GatewayError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.api_key.as_deref() else {
            return Ok(Self);
        };
        let provided = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(GatewayError::Unauthorized)?;
        if !keys_match(expected, provided) {
            tracing::warn!(path = %parts.uri.path(), "rejected request with wrong api key");
            return Err(GatewayError::Unauthorized);
        }
        Ok(Self)
    }
}

/// Constant-time comparison through an HMAC of the candidate.
fn keys_match(expected: &str, provided: &str) -> bool {
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(expected.as_bytes()) else {
        return false;
    };
    mac.update(expected.as_bytes());
    let tag = mac.finalize().into_bytes();

    let Ok(mut candidate) = Hmac::<Sha256>::new_from_slice(expected.as_bytes()) else {
        return false;
    };
    candidate.update(provided.as_bytes());
    candidate.verify_slice(&tag).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_keys() {
        assert!(keys_match("s3cret", "s3cret"));
        assert!(!keys_match("s3cret", "s3cret "));
        assert!(!keys_match("s3cret", ""));
    }
}
