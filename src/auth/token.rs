//! Bearer tokens
//!
//! Stateless HS256 JSON Web Tokens. The signature is an HMAC-SHA256 over
//! `base64(header).base64(claims)`, so no server-side session storage is needed.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Fixed JOSE header for every token we issue
const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Token payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: i64,
    pub username: String,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expires at (unix seconds)
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: i64, username: &str, ttl_days: i64) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id,
            username: username.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::days(ttl_days)).timestamp(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.exp <= Utc::now().timestamp()
    }
}

fn sign(signing_input: &str, secret: &str) -> Result<HmacSha256, AppError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid token secret: {e}")))?;
    mac.update(signing_input.as_bytes());
    Ok(mac)
}

/// Create a signed token
///
/// Token format: base64(header).base64(claims).base64(hmac_sha256)
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, AppError> {
    let payload = serde_json::to_string(claims).map_err(|e| AppError::Internal(e.into()))?;

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(HEADER.as_bytes()),
        URL_SAFE_NO_PAD.encode(payload.as_bytes())
    );
    let signature = sign(&signing_input, secret)?.finalize().into_bytes();

    Ok(format!(
        "{}.{}",
        signing_input,
        URL_SAFE_NO_PAD.encode(signature)
    ))
}

/// Verify and decode a token
///
/// # Errors
/// `Unauthorized` if the token is malformed, forged, not HS256 or expired
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    let mut parts = token.split('.');
    let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(AppError::Unauthorized);
    };

    let signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| AppError::Unauthorized)?;
    sign(&format!("{header_b64}.{payload_b64}"), secret)?
        .verify_slice(&signature)
        .map_err(|_| AppError::Unauthorized)?;

    let header: serde_json::Value = URL_SAFE_NO_PAD
        .decode(header_b64)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .ok_or(AppError::Unauthorized)?;
    if header.get("alg").and_then(|alg| alg.as_str()) != Some("HS256") {
        return Err(AppError::Unauthorized);
    }

    let claims: Claims = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .ok_or(AppError::Unauthorized)?;

    if claims.is_expired() {
        return Err(AppError::Unauthorized);
    }

    Ok(claims)
}
