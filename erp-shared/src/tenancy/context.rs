//! Per-request tenant context
//!
//! [`TenantContext`] collects what a request says about its tenant and
//! caller: the authenticated claims first, request headers as a fallback.
//! Nothing tenant-scoped may run on it directly. Callers first turn it into a
//! [`ValidatedTenant`] through [`TenantContext::validate_tenant_access`], and
//! only a `ValidatedTenant` opens a tenant database.

use std::sync::Arc;

use axum::http::{HeaderMap, HeaderName};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use super::identifier::{IdentifierSource, DEFAULT_TENANT_HEADER};
use super::service::TenantResolver;
use crate::auth::middleware::AuthContext;
use crate::data::{DataBackend, DataError};
use crate::models::{DomainError, Tenant, TenantModuleSubscription};

/// Header carrying the tenant code when no claim does
pub const TENANT_CODE_HEADER: &str = "x-tenant-code";

/// Header carrying the user id when no claim does
pub const USER_ID_HEADER: &str = "x-user-id";

/// Why a request may not act on a tenant
#[derive(Debug, Error)]
pub enum TenantAccessError {
    /// Neither claims, headers nor resolution named a tenant
    #[error("tenant identification required")]
    IdentificationRequired,

    /// The tenant exists but access is refused, or it does not exist
    #[error(transparent)]
    Denied(DomainError),

    /// The tenant registry could not be read
    #[error("tenant lookup failed: {0}")]
    Lookup(DataError),
}

impl TenantAccessError {
    pub fn code(&self) -> &'static str {
        match self {
            TenantAccessError::IdentificationRequired => "tenant_identification_required",
            TenantAccessError::Denied(e) => e.code(),
            TenantAccessError::Lookup(_) => "tenant_lookup_failed",
        }
    }
}

impl From<DataError> for TenantAccessError {
    fn from(error: DataError) -> Self {
        match error {
            DataError::Domain(e) => TenantAccessError::Denied(e),
            other => TenantAccessError::Lookup(other),
        }
    }
}

impl From<DomainError> for TenantAccessError {
    fn from(error: DomainError) -> Self {
        TenantAccessError::Denied(error)
    }
}

/// What a request claims about its tenant and caller
#[derive(Debug, Clone, Default)]
pub struct TenantContext {
    tenant_id: Option<Uuid>,
    tenant_code: Option<String>,
    user_id: Option<Uuid>,
    is_tenant_admin: bool,
    claimed_tenant_id: Option<Uuid>,
    resolved: Option<Arc<Tenant>>,
    source: Option<IdentifierSource>,
}

impl TenantContext {
    /// Builds the context from optional claims and the request headers,
    /// reading the tenant from the default `X-Tenant-Id` header
    pub fn new(auth: Option<&AuthContext>, headers: &HeaderMap) -> Self {
        Self::from_headers(auth, headers, &HeaderName::from_static(DEFAULT_TENANT_HEADER))
    }

    /// Builds the context from optional claims and the request headers
    ///
    /// Each value comes from the claims when present, otherwise from the
    /// matching header; `tenant_header` carries the tenant id or code. The
    /// admin flag is only ever taken from claims.
    pub fn from_headers(
        auth: Option<&AuthContext>,
        headers: &HeaderMap,
        tenant_header: &HeaderName,
    ) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let header_tenant = header(tenant_header.as_str());
        let header_tenant_id = header_tenant
            .as_deref()
            .and_then(|v| Uuid::parse_str(v).ok());
        // A non-UUID tenant header is a code
        let header_tenant_code = header(TENANT_CODE_HEADER)
            .or_else(|| header_tenant.filter(|_| header_tenant_id.is_none()));

        let claimed_tenant_id = auth.and_then(|a| a.tenant_id);
        Self {
            tenant_id: claimed_tenant_id.or(header_tenant_id),
            tenant_code: auth
                .and_then(|a| a.tenant_code.clone())
                .or(header_tenant_code)
                .map(|c| c.to_ascii_uppercase()),
            user_id: auth
                .map(|a| a.user_id)
                .or_else(|| header(USER_ID_HEADER).and_then(|v| Uuid::parse_str(&v).ok())),
            is_tenant_admin: auth.is_some_and(|a| a.is_tenant_admin),
            claimed_tenant_id,
            resolved: None,
            source: None,
        }
    }

    /// Attaches the tenant the request already resolved to
    pub fn with_resolved(mut self, tenant: Arc<Tenant>, source: Option<IdentifierSource>) -> Self {
        self.tenant_id = Some(tenant.id());
        self.tenant_code = Some(tenant.code().to_string());
        self.resolved = Some(tenant);
        self.source = source;
        self
    }

    pub fn tenant_id(&self) -> Option<Uuid> {
        self.tenant_id
    }

    pub fn tenant_code(&self) -> Option<&str> {
        self.tenant_code.as_deref()
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user_id
    }

    pub fn is_tenant_admin(&self) -> bool {
        self.is_tenant_admin
    }

    pub fn has_tenant(&self) -> bool {
        self.tenant_id.is_some() || self.tenant_code.is_some()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// Checks that the request may act on its tenant
    ///
    /// Uses the resolved tenant when the request has one, otherwise looks
    /// the tenant up by id, then by code. The tenant must be `Active`, and a
    /// tenant id carried in the claims must match it.
    ///
    /// # Errors
    ///
    /// - [`TenantAccessError::IdentificationRequired`] when no tenant is named
    /// - [`TenantAccessError::Denied`] for unknown, inactive or mismatched tenants
    /// - [`TenantAccessError::Lookup`] when the registry cannot be read
    pub async fn validate_tenant_access<B: DataBackend>(
        &self,
        resolver: &TenantResolver<B>,
    ) -> Result<ValidatedTenant, TenantAccessError> {
        let tenant = match (&self.resolved, self.tenant_id, &self.tenant_code) {
            (Some(tenant), _, _) => Arc::clone(tenant),
            (None, Some(id), _) => resolver
                .resolve_id(id)
                .await?
                .ok_or_else(|| DomainError::TenantNotFound(id.to_string()))?,
            (None, None, Some(code)) => resolver
                .resolve(code)
                .await?
                .ok_or_else(|| DomainError::TenantNotFound(code.clone()))?,
            (None, None, None) => return Err(TenantAccessError::IdentificationRequired),
        };

        if let Some(claimed) = self.claimed_tenant_id {
            if claimed != tenant.id() {
                warn!(
                    claimed = %claimed,
                    requested = %tenant.id(),
                    user_id = ?self.user_id,
                    "Token tenant does not match request tenant"
                );
                return Err(DomainError::TenantMismatch {
                    claimed,
                    requested: tenant.id(),
                }
                .into());
            }
        }

        if !tenant.is_active() {
            return Err(DomainError::TenantInactive {
                code: tenant.code().to_string(),
                status: tenant.status(),
            }
            .into());
        }

        debug!(tenant_code = %tenant.code(), user_id = ?self.user_id, "Tenant access validated");
        Ok(ValidatedTenant::new(
            tenant,
            self.user_id,
            self.is_tenant_admin,
            self.source,
        ))
    }
}

/// Proof that the current request may act on an active tenant
#[derive(Debug, Clone)]
pub struct ValidatedTenant {
    tenant: Arc<Tenant>,
    user_id: Option<Uuid>,
    is_tenant_admin: bool,
    source: Option<IdentifierSource>,
}

impl ValidatedTenant {
    pub(crate) fn new(
        tenant: Arc<Tenant>,
        user_id: Option<Uuid>,
        is_tenant_admin: bool,
        source: Option<IdentifierSource>,
    ) -> Self {
        Self {
            tenant,
            user_id,
            is_tenant_admin,
            source,
        }
    }

    pub fn tenant(&self) -> &Tenant {
        &self.tenant
    }

    pub fn id(&self) -> Uuid {
        self.tenant.id()
    }

    pub fn code(&self) -> &str {
        self.tenant.code()
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user_id
    }

    pub fn source(&self) -> Option<IdentifierSource> {
        self.source
    }

    /// Fails unless the tenant holds a usable subscription to the module
    pub fn require_module(
        &self,
        module_code: &str,
        now: DateTime<Utc>,
    ) -> Result<&TenantModuleSubscription, DomainError> {
        self.tenant.require_module(module_code, now)
    }

    pub fn require_admin(&self) -> Result<(), DomainError> {
        if self.is_tenant_admin {
            Ok(())
        } else {
            Err(DomainError::TenantAdminRequired)
        }
    }
}
