use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use serde_json::Value as JsonValue;
use time::OffsetDateTime;

use crate::error::Error;

/// Refresh proactively when less than this much lifetime remains.
pub const DEFAULT_EXPIRY_BUFFER: Duration = Duration::from_secs(50 * 60);

/// Claims read from a JWT payload without verifying its signature.
///
/// Only the server can verify the token. The client reads claims to
/// schedule refreshes, never to make authorization decisions.
#[derive(Debug, Clone)]
pub struct UnverifiedClaims {
    inner: JsonValue,
}

impl UnverifiedClaims {
    /// Gets a claim value by key.
    #[must_use]
    pub fn get_claim(&self, key: &str) -> Option<&JsonValue> {
        self.inner.get(key)
    }

    /// Gets the inner JSON value.
    #[must_use]
    pub fn as_json(&self) -> &JsonValue {
        &self.inner
    }

    /// The `exp` claim as a timestamp.
    #[must_use]
    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        let exp = self.inner.get("exp")?;
        let seconds = exp
            .as_i64()
            .or_else(|| exp.as_f64().map(|f| f.floor() as i64))?;
        OffsetDateTime::from_unix_timestamp(seconds).ok()
    }
}

/// Decodes the payload segment of a `header.payload.signature` token.
///
/// # Errors
///
/// Returns `Error::Token` if the token does not have three segments or the
/// payload is not base64-encoded JSON.
pub fn decode_unverified_claims(token_str: &str) -> Result<UnverifiedClaims, Error> {
    let parts: Vec<&str> = token_str.split('.').collect();
    if parts.len() != 3 {
        return Err(Error::Token("invalid token format".into()));
    }

    let payload_b64 = parts[1].trim_end_matches('=');
    if payload_b64.is_empty() {
        return Err(Error::Token("empty payload".into()));
    }

    // Some issuers emit the standard alphabet instead of base64url.
    let payload = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .or_else(|_| STANDARD_NO_PAD.decode(payload_b64))
        .map_err(|_| Error::Token("invalid payload encoding".into()))?;

    let inner: JsonValue = serde_json::from_slice(&payload)
        .map_err(|e| Error::Token(format!("invalid payload: {e}")))?;
    if !inner.is_object() {
        return Err(Error::Token("payload is not a JSON object".into()));
    }

    Ok(UnverifiedClaims { inner })
}

/// Reports whether `token` expires within `buffer` from now.
///
/// Advisory only: a `false` here does not guarantee the server will accept
/// the token. Malformed tokens and tokens without an `exp` claim report
/// `true`.
#[must_use]
pub fn is_token_expiring_soon(token_str: &str, buffer: Duration) -> bool {
    is_token_expiring_soon_at(token_str, buffer, OffsetDateTime::now_utc())
}

/// [`is_token_expiring_soon`] against an explicit clock reading.
#[must_use]
pub fn is_token_expiring_soon_at(token_str: &str, buffer: Duration, now: OffsetDateTime) -> bool {
    let Some(expires_at) = decode_unverified_claims(token_str)
        .ok()
        .and_then(|claims| claims.expires_at())
    else {
        tracing::debug!("Token has no readable exp claim; treating as expiring");
        return true;
    };

    let remaining = expires_at - now;
    remaining < time::Duration::try_from(buffer).unwrap_or(time::Duration::MAX)
}
