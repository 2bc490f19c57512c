//! Bearer token authentication for axum
//!
//! Authentication is optional: a request without an `Authorization` header
//! is anonymous, a request with a valid bearer token yields an
//! [`AuthContext`], and a malformed or invalid token is an [`AuthError`].
//! The server's middleware stores the context in the request extensions.

use axum::http::{header, HeaderMap};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::jwt::{validate_token, Claims, JwtError};

/// Authenticated principal, added to request extensions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub tenant_code: Option<String>,
    pub is_tenant_admin: bool,
}

impl From<Claims> for AuthContext {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            tenant_id: claims.tenant_id,
            tenant_code: claims.tenant_code,
            is_tenant_admin: claims.is_tenant_admin,
        }
    }
}

/// Why a bearer token was refused
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid authorization header: {0}")]
    InvalidFormat(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

/// Bearer token of a request, if an `Authorization` header is present
///
/// # Errors
///
/// `AuthError::InvalidFormat` when the header is not a `Bearer` token.
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, AuthError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| AuthError::InvalidFormat("Authorization header is not ASCII".to_string()))?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(Some)
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))
}

/// Validates the bearer token of a request, if any
///
/// # Errors
///
/// `AuthError` when a token is present but malformed or invalid.
pub fn authenticate(headers: &HeaderMap, secret: &str) -> Result<Option<AuthContext>, AuthError> {
    let Some(token) = bearer_token(headers)? else {
        return Ok(None);
    };
    let claims = validate_token(token, secret).map_err(|e| match e {
        JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
        JwtError::InvalidIssuer => AuthError::InvalidToken("Invalid issuer".to_string()),
        other => AuthError::InvalidToken(other.to_string()),
    })?;
    Ok(Some(AuthContext::from(claims)))
}
