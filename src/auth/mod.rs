use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::config::SecurityConfig;
use crate::error::ApiError;
use crate::middleware::auth::extract_bearer;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(sub: impl Into<String>, expiry_hours: u64) -> Self {
        let now = Utc::now();
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            sub: sub.into(),
            exp,
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Invalid JWT secret")]
    InvalidSecret,
}

pub fn generate_jwt(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key).map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

/// The caller a credential was issued to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
}

/// Capability check run before every mutating operation.
///
/// `credential` is the raw `Authorization` header value, if any.
pub trait AccessGate: Send + Sync {
    fn check(&self, credential: Option<&str>) -> Result<Identity, ApiError>;
}

/// HS256 bearer-token gate
pub struct JwtGate {
    secret: String,
}

impl JwtGate {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }

    pub fn from_config(security: &SecurityConfig) -> Self {
        Self::new(security.jwt_secret.clone())
    }

    fn validate(&self, token: &str) -> Result<Claims, String> {
        if self.secret.is_empty() {
            return Err("JWT secret not configured".to_string());
        }

        let decoding_key = DecodingKey::from_secret(self.secret.as_bytes());
        let token_data = decode::<Claims>(token, &decoding_key, &Validation::default())
            .map_err(|e| format!("Invalid JWT token: {}", e))?;

        Ok(token_data.claims)
    }
}

impl AccessGate for JwtGate {
    fn check(&self, credential: Option<&str>) -> Result<Identity, ApiError> {
        let token = extract_bearer(credential).map_err(|msg| {
            warn!("Rejected request: {}", msg);
            ApiError::unauthorized(msg)
        })?;

        let claims = self.validate(token).map_err(|msg| {
            warn!("Rejected request: {}", msg);
            ApiError::unauthorized(msg)
        })?;

        Ok(Identity { username: claims.sub })
    }
}
