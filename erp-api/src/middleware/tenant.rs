//! Tenant resolution middleware
//!
//! Runs on tenant-scoped routes. Finds the tenant signal of the request
//! (header, subdomain, `tenant` route value, then `tenant` query parameter),
//! resolves it through the cached resolver and stores a [`TenantContext`]
//! in the request extensions for the handlers. Requests without any signal
//! are rejected unless their path is excluded.
//!
//! Handlers still call [`TenantContext::validate_tenant_access`]: this layer
//! only answers "which tenant", not "may this caller use it".

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, RawPathParams, Request, State},
    http::{header, request::Parts, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use erp_shared::auth::middleware::AuthContext;
use erp_shared::data::{DataBackend, DataError};
use erp_shared::models::Tenant;
use erp_shared::tenancy::{IdentifierSource, TenantContext, TENANT_PARAM};
use serde_json::json;
use tracing::{debug, error};

use crate::app::AppState;

/// Response header carrying the identifier the tenant was resolved from
pub const TENANT_IDENTIFIER_HEADER: &str = "x-tenant-identifier";

const TENANT_CACHE_CONTROL: &str = "private, max-age=300";

/// Resolves the request's tenant and attaches a [`TenantContext`]
pub async fn resolve_tenant<B: DataBackend>(
    State(state): State<AppState<B>>,
    params: Option<RawPathParams>,
    mut req: Request,
    next: Next,
) -> Response {
    if state.extractor.is_excluded(req.uri().path()) {
        return next.run(req).await;
    }

    let route_tenant = params.as_ref().and_then(|params| {
        params
            .iter()
            .find(|(name, _)| *name == TENANT_PARAM)
            .map(|(_, value)| value.to_string())
    });

    let Some(found) = state
        .extractor
        .extract(req.headers(), req.uri(), route_tenant.as_deref())
    else {
        return identification_required();
    };
    let identifier = found.value;
    let source = found.source;
    let lookup = state.resolver.resolve(&identifier).await;

    let tenant = match lookup {
        Ok(Some(tenant)) => tenant,
        Ok(None) => {
            debug!(identifier = %identifier, "No tenant matches identifier");
            return rejection(
                StatusCode::BAD_REQUEST,
                "tenant_not_found",
                format!("Tenant '{identifier}' not found"),
            );
        }
        Err(e) => return lookup_failed(&identifier, &e),
    };

    debug!(
        tenant_code = %tenant.code(),
        source = source.as_str(),
        "Tenant resolved"
    );
    attach_context(&state, &mut req, tenant, source);

    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&identifier) {
        headers.insert(TENANT_IDENTIFIER_HEADER, value);
    }
    headers
        .entry(header::CACHE_CONTROL)
        .or_insert(HeaderValue::from_static(TENANT_CACHE_CONTROL));
    response
}

fn attach_context<B>(
    state: &AppState<B>,
    req: &mut Request,
    tenant: Arc<Tenant>,
    source: IdentifierSource,
) {
    let context = TenantContext::from_headers(
        req.extensions().get::<AuthContext>(),
        req.headers(),
        state.extractor.header_name(),
    )
    .with_resolved(tenant, Some(source));
    req.extensions_mut().insert(context);
}

/// Tenant context of a tenant-scoped request
///
/// Set by [`resolve_tenant`]. On excluded paths nothing was resolved, so the
/// context comes from the caller's claims and headers alone.
pub struct RequestTenant(pub TenantContext);

#[async_trait]
impl<B: DataBackend> FromRequestParts<AppState<B>> for RequestTenant {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<B>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(context) = parts.extensions.get::<TenantContext>() {
            return Ok(Self(context.clone()));
        }
        Ok(Self(TenantContext::from_headers(
            parts.extensions.get::<AuthContext>(),
            &parts.headers,
            state.extractor.header_name(),
        )))
    }
}

fn identification_required() -> Response {
    rejection(
        StatusCode::BAD_REQUEST,
        "tenant_identification_required",
        "No tenant identifier found in header, subdomain, route or query".to_string(),
    )
}

fn lookup_failed(identifier: &str, e: &DataError) -> Response {
    error!(identifier = %identifier, error = %e, "Tenant lookup failed");
    rejection(
        StatusCode::INTERNAL_SERVER_ERROR,
        "tenant_resolution_failed",
        "Tenant could not be resolved".to_string(),
    )
}

fn rejection(status: StatusCode, error: &'static str, details: String) -> Response {
    (status, Json(json!({ "error": error, "details": details }))).into_response()
}
