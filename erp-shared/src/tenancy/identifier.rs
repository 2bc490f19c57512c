//! Tenant identifier extraction
//!
//! Derives the raw tenant token of an inbound request. Signals are checked
//! in priority order and the first non-blank one wins:
//!
//! 1. tenant header (`X-Tenant-Id` unless configured otherwise)
//! 2. first label of the host, for hosts with at least three labels
//! 3. `tenant` route parameter
//! 4. `tenant` query parameter
//!
//! Extraction is pure and synchronous. Resolving the token to a tenant is
//! the resolver's job.

use std::collections::HashMap;
use std::net::IpAddr;

use axum::extract::Query;
use axum::http::{header, HeaderMap, HeaderName, Uri};

/// Default header carrying the tenant id or code
pub const DEFAULT_TENANT_HEADER: &str = "x-tenant-id";

/// Route and query parameter name
pub const TENANT_PARAM: &str = "tenant";

/// Path prefixes served without a tenant
pub const DEFAULT_EXCLUDED_PREFIXES: &[&str] = &[
    "/health",
    "/swagger",
    "/api/auth/login",
    "/api/auth/register",
    "/api/tenants/register",
    "/.well-known",
    "/metrics",
    "/favicon.ico",
];

/// Static asset extensions served without a tenant
pub const STATIC_EXTENSIONS: &[&str] = &[".js", ".css", ".png", ".jpg", ".ico"];

const NON_TENANT_SUBDOMAINS: &[&str] = &["www", "localhost"];

/// Where a tenant identifier was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierSource {
    Header,
    Subdomain,
    Route,
    Query,
}

impl IdentifierSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentifierSource::Header => "header",
            IdentifierSource::Subdomain => "subdomain",
            IdentifierSource::Route => "route",
            IdentifierSource::Query => "query",
        }
    }
}

/// Raw tenant token plus its origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantIdentifier {
    pub value: String,
    pub source: IdentifierSource,
}

/// Extracts tenant identifiers from request parts
#[derive(Debug, Clone)]
pub struct TenantIdentifierExtractor {
    header_name: HeaderName,
    resolve_subdomains: bool,
    excluded_prefixes: Vec<String>,
}

impl Default for TenantIdentifierExtractor {
    fn default() -> Self {
        Self {
            header_name: HeaderName::from_static(DEFAULT_TENANT_HEADER),
            resolve_subdomains: true,
            excluded_prefixes: DEFAULT_EXCLUDED_PREFIXES
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

impl TenantIdentifierExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header_name(mut self, header_name: HeaderName) -> Self {
        self.header_name = header_name;
        self
    }

    pub fn with_subdomains(mut self, enabled: bool) -> Self {
        self.resolve_subdomains = enabled;
        self
    }

    /// Adds prefixes to the exclusion list
    pub fn with_excluded_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_prefixes
            .extend(prefixes.into_iter().map(Into::into));
        self
    }

    pub fn header_name(&self) -> &HeaderName {
        &self.header_name
    }

    /// First non-blank tenant signal of a request
    pub fn extract(
        &self,
        headers: &HeaderMap,
        uri: &Uri,
        route_tenant: Option<&str>,
    ) -> Option<TenantIdentifier> {
        let found = |value: &str, source| {
            non_blank(value).map(|value| TenantIdentifier {
                value: value.to_string(),
                source,
            })
        };

        headers
            .get(&self.header_name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| found(v, IdentifierSource::Header))
            .or_else(|| {
                self.resolve_subdomains
                    .then(|| request_host(headers, uri))
                    .flatten()
                    .and_then(subdomain)
                    .and_then(|v| found(v, IdentifierSource::Subdomain))
            })
            .or_else(|| route_tenant.and_then(|v| found(v, IdentifierSource::Route)))
            .or_else(|| {
                query_tenant(uri).and_then(|v| found(v.as_str(), IdentifierSource::Query))
            })
    }

    /// Whether a path is served without tenant resolution
    pub fn is_excluded(&self, path: &str) -> bool {
        let path = path.to_ascii_lowercase();
        self.excluded_prefixes
            .iter()
            .any(|prefix| path.starts_with(&prefix.to_ascii_lowercase()))
            || STATIC_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
    }
}

/// Host of a request without port: `Host` header first, then the URI
pub fn request_host<'a>(headers: &'a HeaderMap, uri: &'a Uri) -> Option<&'a str> {
    headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| uri.host())
        .map(strip_port)
        .and_then(non_blank)
}

/// Tenant label of a host name
///
/// Hosts need at least three labels (`acme.erp.example`). IP literals and
/// the `www` and `localhost` labels never name a tenant.
pub fn subdomain(host: &str) -> Option<&str> {
    let host = strip_port(host.trim());
    if host.parse::<IpAddr>().is_ok() {
        return None;
    }
    let mut labels = host.split('.');
    let first = labels.next()?;
    if labels.count() < 2 {
        return None;
    }
    if first.is_empty()
        || NON_TENANT_SUBDOMAINS
            .iter()
            .any(|label| first.eq_ignore_ascii_case(label))
    {
        return None;
    }
    Some(first)
}

fn strip_port(host: &str) -> &str {
    if let Some(literal) = host.strip_prefix('[') {
        return literal.split_once(']').map_or(literal, |(addr, _)| addr);
    }
    host.rsplit_once(':').map_or(host, |(name, _)| name)
}

fn query_tenant(uri: &Uri) -> Option<String> {
    let Query(params) = Query::<HashMap<String, String>>::try_from_uri(uri).ok()?;
    params.get(TENANT_PARAM).cloned()
}

fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}
