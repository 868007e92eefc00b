//! Signed, time-limited bearer tokens.
//!
//! Token format: `base64url(claims JSON) . hex(HMAC-SHA256(secret, payload))`.
//! Claims carry the subject username and a unix-seconds expiry.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error_handling::types::AuthError;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
}

/// Issues and verifies access tokens with one shared secret.
pub struct TokenSigner {
    secret: Vec<u8>,
    ttl: Duration,
}

impl TokenSigner {
    pub fn new(secret: &str, ttl_minutes: i64) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    pub fn issue(&self, username: &str) -> Result<String, AuthError> {
        let claims = Claims {
            sub: username.to_string(),
            exp: (Utc::now() + self.ttl).timestamp(),
        };
        let payload = serde_json::to_string(&claims).map_err(|_| AuthError::InvalidToken)?;
        let encoded = URL_SAFE_NO_PAD.encode(payload.as_bytes());
        Ok(format!("{}.{}", encoded, self.sign(&encoded)))
    }

    /// Verifies signature and expiry, returning the subject username.
    pub fn verify(&self, token: &str) -> Result<String, AuthError> {
        let (encoded, signature) = token.split_once('.').ok_or(AuthError::InvalidToken)?;

        let signature = hex::decode(signature).map_err(|_| AuthError::InvalidToken)?;
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| AuthError::InvalidToken)?;
        mac.update(encoded.as_bytes());
        mac.verify_slice(&signature).map_err(|_| AuthError::InvalidToken)?;

        let payload = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| AuthError::InvalidToken)?;
        let claims: Claims =
            serde_json::from_slice(&payload).map_err(|_| AuthError::InvalidToken)?;
        if claims.exp < Utc::now().timestamp() {
            return Err(AuthError::TokenExpired);
        }
        Ok(claims.sub)
    }

    fn sign(&self, encoded_payload: &str) -> String {
        // new_from_slice accepts any key length for HMAC.
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
        mac.update(encoded_payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}
