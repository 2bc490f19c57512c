//! Tenant resolution
//!
//! - [`identifier`]: raw tenant token from request parts
//! - [`service`]: registry operations and the cached resolver
//! - [`context`]: per-request context and access validation

pub mod context;
pub mod identifier;
pub mod service;

pub use context::{
    TenantAccessError, TenantContext, ValidatedTenant, TENANT_CODE_HEADER, USER_ID_HEADER,
};
pub use identifier::{
    request_host, subdomain, IdentifierSource, TenantIdentifier, TenantIdentifierExtractor,
    DEFAULT_EXCLUDED_PREFIXES, DEFAULT_TENANT_HEADER, STATIC_EXTENSIONS, TENANT_PARAM,
};
pub use service::{ResolverConfig, SweepReport, TenantResolver, TenantService};
