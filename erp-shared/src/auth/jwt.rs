//! JWT access tokens
//!
//! Tokens are signed with HS256 and carry the user's identity plus the
//! tenant the user is acting for:
//!
//! - `sub`: user id
//! - `iss`: always `erp`
//! - `iat` / `exp` / `nbf`: Unix timestamps
//! - `tenant_id`, `tenant_code`: tenant the token was issued for, if any
//! - `is_tenant_admin`: administrative rights within that tenant
//!
//! Secrets should be at least 32 bytes.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Issuer written into and required from every token
pub const ISSUER: &str = "erp";

/// Default lifetime of an access token
pub const DEFAULT_EXPIRATION_HOURS: i64 = 24;

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to create token: {0}")]
    CreateError(String),

    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    #[error("Token has expired")]
    Expired,

    #[error("Invalid issuer")]
    InvalidIssuer,
}

/// JWT claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - user id
    pub sub: Uuid,

    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<Uuid>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_code: Option<String>,

    #[serde(default)]
    pub is_tenant_admin: bool,
}

impl Claims {
    /// Claims for a user without tenant binding, valid for 24 hours
    pub fn new(user_id: Uuid) -> Self {
        Self::with_expiration(user_id, Duration::hours(DEFAULT_EXPIRATION_HOURS))
    }

    pub fn with_expiration(user_id: Uuid, expires_in: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            nbf: now.timestamp(),
            tenant_id: None,
            tenant_code: None,
            is_tenant_admin: false,
        }
    }

    /// Binds the claims to a tenant
    pub fn for_tenant(mut self, tenant_id: Uuid, tenant_code: &str) -> Self {
        self.tenant_id = Some(tenant_id);
        self.tenant_code = Some(tenant_code.to_string());
        self
    }

    pub fn as_tenant_admin(mut self) -> Self {
        self.is_tenant_admin = true;
        self
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// Signs claims with HS256
///
/// # Errors
///
/// Returns `JwtError::CreateError` if encoding fails.
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Validates a token and extracts its claims
///
/// Checks the signature, expiry, not-before time and issuer.
///
/// # Errors
///
/// `JwtError::Expired`, `JwtError::InvalidIssuer`, or
/// `JwtError::ValidationError` for any other defect.
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        jsonwebtoken::errors::ErrorKind::InvalidIssuer => JwtError::InvalidIssuer,
        _ => JwtError::ValidationError(format!("Token validation failed: {}", e)),
    })?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    #[test]
    fn test_claims_creation() {
        let user_id = Uuid::new_v4();
        let claims = Claims::new(user_id);

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, "erp");
        assert!(claims.tenant_id.is_none());
        assert!(!claims.is_tenant_admin);
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_create_and_validate_token() {
        let tenant_id = Uuid::new_v4();
        let claims = Claims::new(Uuid::new_v4())
            .for_tenant(tenant_id, "ACME")
            .as_tenant_admin();

        let token = create_token(&claims, SECRET).unwrap();
        let validated = validate_token(&token, SECRET).unwrap();

        assert_eq!(validated, claims);
        assert_eq!(validated.tenant_id, Some(tenant_id));
        assert_eq!(validated.tenant_code.as_deref(), Some("ACME"));
        assert!(validated.is_tenant_admin);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = create_token(&Claims::new(Uuid::new_v4()), SECRET).unwrap();
        assert!(matches!(
            validate_token(&token, "another-secret-key-at-least-32-bytes"),
            Err(JwtError::ValidationError(_))
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let claims = Claims::with_expiration(Uuid::new_v4(), Duration::hours(-2));
        let token = create_token(&claims, SECRET).unwrap();
        assert!(matches!(validate_token(&token, SECRET), Err(JwtError::Expired)));
    }

    #[test]
    fn test_foreign_issuer_rejected() {
        let mut claims = Claims::new(Uuid::new_v4());
        claims.iss = "someone-else".to_string();
        let token = create_token(&claims, SECRET).unwrap();
        assert!(matches!(validate_token(&token, SECRET), Err(JwtError::InvalidIssuer)));
    }

    #[test]
    fn test_malformed_token_rejected() {
        assert!(validate_token("not-a-token", SECRET).is_err());
    }
}
