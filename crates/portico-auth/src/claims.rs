use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use portico_core::identity::AuthSession;

use crate::error::AuthError;

/// Unverified claims of a backend access token.
///
/// The signature is NOT checked; the backend validates tokens on every call.
/// These are read only to learn expiry and subject of tokens handed to the
/// portal out of band (impersonation, stored sessions without expiry).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub subject: String,
    pub email: Option<String>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawClaims {
    sub: Option<String>,
    email: Option<String>,
    exp: Option<i64>,
}

/// Decode the payload segment of a JWT.
///
/// # Errors
///
/// Returns `AuthError::Validation` if the token is not a three-part JWT, the
/// payload is not base64url JSON, or `sub`/`exp` are missing.
pub fn decode(jwt: &str) -> Result<TokenClaims, AuthError> {
    let parts: Vec<&str> = jwt.split('.').collect();
    if parts.len() != 3 {
        return Err(AuthError::Validation("invalid JWT format".into()));
    }
    let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|e| AuthError::Validation(format!("base64 decode failed: {e}")))?;
    let raw: RawClaims = serde_json::from_slice(&payload)
        .map_err(|e| AuthError::Validation(format!("JSON parse failed: {e}")))?;

    let exp = raw
        .exp
        .ok_or_else(|| AuthError::Validation("missing exp claim".into()))?;
    let expires_at = DateTime::from_timestamp(exp, 0)
        .ok_or_else(|| AuthError::Validation("invalid exp timestamp".into()))?;
    let subject = raw
        .sub
        .ok_or_else(|| AuthError::Validation("missing sub claim".into()))?;

    Ok(TokenClaims {
        subject,
        email: raw.email,
        expires_at,
    })
}

/// Fill in a missing expiry from the access token's `exp` claim.
#[must_use]
pub fn with_token_expiry(mut session: AuthSession) -> AuthSession {
    if session.expires_at.is_none() {
        session.expires_at = decode(&session.access_token)
            .ok()
            .map(|claims| claims.expires_at);
    }
    session
}

/// Build a session from a bare token pair, taking subject, email and expiry
/// from the access token.
///
/// # Errors
///
/// Same as [`decode`].
pub fn session_from_tokens(access_token: &str, refresh_token: &str) -> Result<AuthSession, AuthError> {
    let claims = decode(access_token)?;
    Ok(AuthSession {
        subject_id: claims.subject,
        email: claims.email,
        access_token: access_token.to_string(),
        refresh_token: refresh_token.to_string(),
        expires_at: Some(claims.expires_at),
    })
}

#[cfg(test)]
pub(crate) fn make_jwt(payload: &str) -> String {
    let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
    format!(
        "{}.{}.{}",
        engine.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
        engine.encode(payload),
        engine.encode("fake_sig")
    )
}
