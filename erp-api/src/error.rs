//! Error handling for the API server
//!
//! Every handler returns [`ApiResult`]. Library errors convert into
//! [`ApiError`] through `From`, so handlers propagate with `?` and the status
//! mapping lives in one place:
//!
//! | kind                                                   | status |
//! |--------------------------------------------------------|--------|
//! | validation, tenant identification                      | 400    |
//! | unauthenticated                                        | 401    |
//! | tenant inactive, mismatch, module or admin required    | 403    |
//! | not found                                              | 404    |
//! | invalid transition, duplicate, database info required  | 409    |
//! | anything else                                          | 500    |
//!
//! Bodies are `{ "error": <stable code>, "message": ... }`. Internal errors
//! carry their detail in a response extension; [`expose_error_details`]
//! copies it into the body outside production.

use axum::{
    body::Body,
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use erp_shared::auth::middleware::AuthError;
use erp_shared::data::DataError;
use erp_shared::models::DomainError;
use erp_shared::tenancy::TenantAccessError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
///
/// Each variant carries a stable machine-readable code and a message.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {1}")]
    BadRequest(&'static str, String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {1}")]
    Forbidden(&'static str, String),

    #[error("Not found: {1}")]
    NotFound(&'static str, String),

    #[error("Conflict: {1}")]
    Conflict(&'static str, String),

    #[error("Validation failed: {} errors", .0.len())]
    ValidationError(Vec<ValidationErrorDetail>),

    /// The message is internal detail and never shown in production
    #[error("Internal error: {1}")]
    InternalError(&'static str, String),
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub field: String,
    pub message: String,
}

/// Error response format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable error code (e.g. `tenant_not_found`)
    pub error: String,

    /// Human-readable message
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Internal detail of a 500 response, attached as a response extension
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(..) | ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(..) => StatusCode::FORBIDDEN,
            ApiError::NotFound(..) => StatusCode::NOT_FOUND,
            ApiError::Conflict(..) => StatusCode::CONFLICT,
            ApiError::InternalError(..) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(code, _)
            | ApiError::Forbidden(code, _)
            | ApiError::NotFound(code, _)
            | ApiError::Conflict(code, _)
            | ApiError::InternalError(code, _) => *code,
            ApiError::Unauthorized(_) => "unauthenticated",
            ApiError::ValidationError(_) => "validation_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code().to_string();

        let (body, detail) = match self {
            ApiError::ValidationError(errors) => (
                ErrorResponse {
                    error: code,
                    message: "Request validation failed".to_string(),
                    details: serde_json::to_value(errors).ok(),
                },
                None,
            ),
            ApiError::InternalError(_, detail) => {
                tracing::error!(error_code = %code, detail = %detail, "Internal error");
                (
                    ErrorResponse {
                        error: code,
                        message: "An internal error occurred".to_string(),
                        details: None,
                    },
                    Some(ErrorDetail(detail)),
                )
            }
            ApiError::BadRequest(_, message)
            | ApiError::Unauthorized(message)
            | ApiError::Forbidden(_, message)
            | ApiError::NotFound(_, message)
            | ApiError::Conflict(_, message) => (
                ErrorResponse {
                    error: code,
                    message,
                    details: None,
                },
                None,
            ),
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(detail) = detail {
            response.extensions_mut().insert(detail);
        }
        response
    }
}

/// Adds internal error detail to 500 bodies; installed outside production
pub async fn expose_error_details(req: Request, next: Next) -> Response {
    let response = next.run(req).await;
    let Some(ErrorDetail(detail)) = response.extensions().get::<ErrorDetail>().cloned() else {
        return response;
    };

    let (parts, body) = response.into_parts();
    let Ok(bytes) = axum::body::to_bytes(body, usize::MAX).await else {
        return Response::from_parts(parts, Body::empty());
    };
    let mut error: ErrorResponse = match serde_json::from_slice(&bytes) {
        Ok(error) => error,
        Err(_) => return Response::from_parts(parts, Body::from(bytes)),
    };
    error.details = Some(serde_json::Value::String(detail));

    let mut response = (parts.status, Json(error)).into_response();
    for (name, value) in parts.headers.iter() {
        if name != axum::http::header::CONTENT_LENGTH {
            response.headers_mut().insert(name.clone(), value.clone());
        }
    }
    response
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        let code = err.code();
        let message = err.to_string();
        match err {
            DomainError::Required { .. } | DomainError::Invalid { .. } => {
                ApiError::BadRequest(code, message)
            }
            DomainError::TenantNotFound(_) => ApiError::NotFound(code, message),
            DomainError::TenantInactive { .. }
            | DomainError::TenantMismatch { .. }
            | DomainError::ModuleNotSubscribed { .. }
            | DomainError::SubscriptionExpired { .. }
            | DomainError::TenantAdminRequired => ApiError::Forbidden(code, message),
            DomainError::DatabaseInfoRequired { .. }
            | DomainError::InvalidStatusTransition { .. }
            | DomainError::DuplicateTenantCode(_)
            | DomainError::AlreadySubscribed { .. }
            | DomainError::InvalidSubscriptionTransition { .. } => {
                ApiError::Conflict(code, message)
            }
        }
    }
}

impl From<DataError> for ApiError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::Domain(e) => e.into(),
            DataError::NotFound { .. } => ApiError::NotFound("not_found", err.to_string()),
            DataError::Conflict { .. } => ApiError::Conflict("conflict", err.to_string()),
            DataError::Specification(e) => ApiError::BadRequest("invalid_query", e.to_string()),
            DataError::TenantDatabaseUnavailable { .. } => {
                ApiError::InternalError("tenant_database_unavailable", err.to_string())
            }
            other => ApiError::InternalError("database_error", other.to_string()),
        }
    }
}

impl From<TenantAccessError> for ApiError {
    fn from(err: TenantAccessError) -> Self {
        match err {
            TenantAccessError::IdentificationRequired => {
                ApiError::BadRequest(err.code(), err.to_string())
            }
            TenantAccessError::Denied(e @ DomainError::TenantNotFound(_)) => {
                ApiError::BadRequest(e.code(), e.to_string())
            }
            TenantAccessError::Denied(e) => e.into(),
            TenantAccessError::Lookup(e) => {
                ApiError::InternalError("tenant_lookup_failed", e.to_string())
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidFormat(msg) => ApiError::BadRequest("invalid_credentials", msg),
            AuthError::InvalidToken(msg) => ApiError::Unauthorized(msg),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationErrorDetail> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| ValidationErrorDetail {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));
        ApiError::ValidationError(details)
    }
}
