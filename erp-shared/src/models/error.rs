//! Domain errors raised by entity invariants and tenant access rules
//!
//! Every variant carries a stable string code (see [`DomainError::code`])
//! that the API layer maps to an HTTP status and echoes in error bodies.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use super::tenant::TenantStatus;

/// Errors produced by domain rules
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// A required value was null, empty or whitespace
    #[error("{field} is required")]
    Required { field: &'static str },

    /// A value was present but malformed
    #[error("invalid {field}: {message}")]
    Invalid { field: &'static str, message: String },

    /// The tenant has no physical database description yet
    #[error("tenant {code} has no database configured")]
    DatabaseInfoRequired { code: String },

    /// Lifecycle action not allowed from the current status
    #[error("cannot {action} tenant {code} while it is {status}")]
    InvalidStatusTransition {
        code: String,
        status: TenantStatus,
        action: &'static str,
    },

    /// Tenant was not found by the given identifier
    #[error("tenant '{0}' was not found")]
    TenantNotFound(String),

    /// Tenant exists but is not in the Active state
    #[error("tenant {code} is {status}")]
    TenantInactive { code: String, status: TenantStatus },

    /// Authenticated tenant differs from the tenant the request resolved to
    #[error("token is scoped to tenant {claimed} but request targets {requested}")]
    TenantMismatch { claimed: Uuid, requested: Uuid },

    /// Tenant code is already taken
    #[error("tenant code {0} is already registered")]
    DuplicateTenantCode(String),

    /// Tenant has no subscription for the module
    #[error("tenant {tenant} is not subscribed to module {module}")]
    ModuleNotSubscribed { tenant: String, module: String },

    /// Subscription exists but is no longer usable
    #[error("subscription of tenant {tenant} to module {module} expired at {expired_at}")]
    SubscriptionExpired {
        tenant: String,
        module: String,
        expired_at: DateTime<Utc>,
    },

    /// Tenant already holds a usable subscription for the module
    #[error("tenant {tenant} is already subscribed to module {module}")]
    AlreadySubscribed { tenant: String, module: String },

    /// Subscription action not allowed from its current status
    #[error("cannot {action} a {status} subscription")]
    InvalidSubscriptionTransition {
        status: &'static str,
        action: &'static str,
    },

    /// Operation requires tenant administrator rights
    #[error("tenant administrator rights required")]
    TenantAdminRequired,
}

impl DomainError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Required { .. } | DomainError::Invalid { .. } => "validation_error",
            DomainError::DatabaseInfoRequired { .. } => "database_info_required",
            DomainError::InvalidStatusTransition { .. } => "invalid_status_transition",
            DomainError::TenantNotFound(_) => "tenant_not_found",
            DomainError::TenantInactive { .. } => "tenant_inactive",
            DomainError::TenantMismatch { .. } => "tenant_mismatch",
            DomainError::DuplicateTenantCode(_) => "duplicate_tenant_code",
            DomainError::ModuleNotSubscribed { .. } => "module_not_subscribed",
            DomainError::SubscriptionExpired { .. } => "subscription_expired",
            DomainError::AlreadySubscribed { .. } => "already_subscribed",
            DomainError::InvalidSubscriptionTransition { .. } => "invalid_subscription_transition",
            DomainError::TenantAdminRequired => "tenant_admin_required",
        }
    }

    /// Shorthand for [`DomainError::Invalid`]
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        DomainError::Invalid {
            field,
            message: message.into(),
        }
    }
}

/// Trims a required string, failing with [`DomainError::Required`] when blank
pub(crate) fn required(field: &'static str, value: &str) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::Required { field });
    }
    Ok(trimmed.to_string())
}

/// Trims an optional string, mapping blank values to `None`
pub(crate) fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_rejects_whitespace() {
        assert_eq!(
            required("name", "   \t"),
            Err(DomainError::Required { field: "name" })
        );
        assert_eq!(required("name", "  Acme ").unwrap(), "Acme");
    }

    #[test]
    fn test_optional_blank_is_none() {
        assert_eq!(optional(Some("  ")), None);
        assert_eq!(optional(None), None);
        assert_eq!(optional(Some(" x ")), Some("x".to_string()));
    }

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(
            DomainError::Required { field: "name" }.code(),
            "validation_error"
        );
        assert_eq!(
            DomainError::TenantNotFound("ACME".into()).code(),
            "tenant_not_found"
        );
        assert_eq!(DomainError::TenantAdminRequired.code(), "tenant_admin_required");
    }

    #[test]
    fn test_required_message_mentions_field() {
        let err = DomainError::Required { field: "name" };
        assert!(err.to_string().contains("name"));
    }
}
