//! Session management
//!
//! Uses HMAC-signed tokens stored in cookies.
//! No server-side session storage needed.

use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sha2::Sha256;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Session data
///
/// Stored in a signed cookie. Holds only the logged-in user's id;
/// a missing cookie means nobody is logged in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    /// When session was created
    pub created_at: DateTime<Utc>,
    /// When session expires
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Start a session for `user_id` lasting `max_age` seconds
    pub fn new(user_id: impl Into<String>, max_age: i64) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            created_at: now,
            expires_at: now + Duration::seconds(max_age),
        }
    }

    /// Check if session is expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// Sign any serializable value
///
/// Token format: base64(payload).base64(hmac_sha256(payload))
pub fn sign_payload<T: Serialize>(value: &T, secret: &str) -> Result<String, AppError> {
    let payload = serde_json::to_string(value).map_err(|e| AppError::Internal(e.into()))?;
    let payload_b64 = general_purpose::URL_SAFE_NO_PAD.encode(payload.as_bytes());

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Encryption(e.to_string()))?;
    mac.update(payload_b64.as_bytes());
    let signature = mac.finalize().into_bytes();
    let signature_b64 = general_purpose::URL_SAFE_NO_PAD.encode(signature);

    Ok(format!("{}.{}", payload_b64, signature_b64))
}

/// Verify a token produced by [`sign_payload`] and decode its value
///
/// # Errors
/// Returns error if signature is invalid or token is malformed
pub fn verify_payload<T: DeserializeOwned>(token: &str, secret: &str) -> Result<T, AppError> {
    let (payload_b64, signature_b64) = token.split_once('.').ok_or(AppError::Unauthorized)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Encryption(e.to_string()))?;
    mac.update(payload_b64.as_bytes());

    let expected_signature = general_purpose::URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| AppError::Unauthorized)?;

    mac.verify_slice(&expected_signature)
        .map_err(|_| AppError::InvalidSignature)?;

    let payload_bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| AppError::Unauthorized)?;

    serde_json::from_slice(&payload_bytes).map_err(|_| AppError::Unauthorized)
}

/// Create a signed session token
pub fn create_session_token(session: &Session, secret: &str) -> Result<String, AppError> {
    sign_payload(session, secret)
}

/// Verify and decode a session token
///
/// # Errors
/// Returns error if the token is forged, malformed or expired
pub fn verify_session_token(token: &str, secret: &str) -> Result<Session, AppError> {
    let session: Session = verify_payload(token, secret)?;

    if session.is_expired() {
        return Err(AppError::Unauthorized);
    }

    Ok(session)
}
