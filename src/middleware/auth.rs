use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use std::convert::Infallible;

/// Raw `Authorization` header value, handed to the access gate untouched.
///
/// Extraction never fails; a missing or malformed header is the gate's call.
#[derive(Debug, Clone, Default)]
pub struct Credential(pub Option<String>);

impl Credential {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Credential
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Credential(authorization_header(&parts.headers)))
    }
}

fn authorization_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Extract the JWT from an `Authorization` header value
pub fn extract_bearer(header: Option<&str>) -> Result<&str, &'static str> {
    let auth_str = header.ok_or("Missing Authorization header")?;

    if let Some(token) = auth_str.strip_prefix("Bearer ") {
        let token = token.trim();
        if token.is_empty() {
            return Err("Empty JWT token");
        }
        Ok(token)
    } else {
        Err("Authorization header must use Bearer token format")
    }
}
