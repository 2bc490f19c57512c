//! Application state and router builder
//!
//! The router is generic over the [`DataBackend`]: the server runs on
//! PostgreSQL, the tests on the in-memory backend.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use erp_shared::data::DataBackend;
use erp_shared::specification::PageRequest;
use erp_shared::tenancy::{TenantIdentifierExtractor, TenantResolver, TenantService};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::config::Config;
use crate::error::expose_error_details;
use crate::middleware::{
    auth::authenticate_request, security::SecurityHeadersLayer, tenant::resolve_tenant,
};
use crate::routes::{customers, health, products, tenants};

/// Shared application state, cloned into every handler
pub struct AppState<B> {
    pub backend: B,
    pub tenants: TenantService<B>,
    pub resolver: TenantResolver<B>,
    pub extractor: Arc<TenantIdentifierExtractor>,
    pub config: Arc<Config>,
}

impl<B: Clone> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            tenants: self.tenants.clone(),
            resolver: self.resolver.clone(),
            extractor: Arc::clone(&self.extractor),
            config: Arc::clone(&self.config),
        }
    }
}

impl<B: DataBackend> AppState<B> {
    /// Wires the tenant services and the identifier extractor from config
    ///
    /// # Errors
    ///
    /// Fails when the configured tenant header name is not a valid header.
    pub fn new(backend: B, config: Config) -> anyhow::Result<Self> {
        let header_name = HeaderName::from_bytes(config.tenancy.header_name.to_ascii_lowercase().as_bytes())
            .context("tenancy.header_name is not a valid header name")?;
        let extractor = TenantIdentifierExtractor::new()
            .with_header_name(header_name)
            .with_subdomains(config.tenancy.resolve_subdomains)
            .with_excluded_prefixes(config.tenancy.excluded_paths.iter().cloned());

        let tenants = TenantService::new(backend.clone(), config.retry.strategy());
        let resolver = TenantResolver::new(tenants.clone(), config.tenancy.resolver_config());

        Ok(Self {
            backend,
            tenants,
            resolver,
            extractor: Arc::new(extractor),
            config: Arc::new(config),
        })
    }

    /// Page request from optional query values, with configured defaults
    /// and the page size ceiling applied
    pub fn page_request(&self, page_number: Option<u32>, page_size: Option<u32>) -> PageRequest {
        let pagination = &self.config.pagination;
        PageRequest::new(
            page_number.unwrap_or(1),
            page_size.unwrap_or(pagination.default_page_size),
        )
        .clamped(pagination.max_page_size)
    }
}

/// Builds the complete router with all routes and middleware
///
/// ```text
/// /health                                   liveness and diagnostics
/// /api/modules                              module catalog
/// /api/tenants/...                          tenant registry management
/// /api/{products,customers}                 tenant-scoped, tenant from request signals
/// /api/t/:tenant/{products,customers}       tenant-scoped, tenant from the path
/// ```
///
/// Tenant-scoped routes run the tenant resolution layer after routing so
/// the `tenant` path parameter is visible to it.
pub fn build_router<B: DataBackend>(state: AppState<B>) -> Router {
    let production = state.config.api.production;

    let management = Router::new()
        .route("/api/modules", get(tenants::list_modules::<B>))
        .route("/api/tenants", get(tenants::list_tenants::<B>))
        .route("/api/tenants/register", post(tenants::register_tenant::<B>))
        .route("/api/tenants/:code", get(tenants::get_tenant::<B>))
        .route("/api/tenants/:code/database", post(tenants::set_database::<B>))
        .route("/api/tenants/:code/activate", post(tenants::activate_tenant::<B>))
        .route("/api/tenants/:code/deactivate", post(tenants::deactivate_tenant::<B>))
        .route("/api/tenants/:code/suspend", post(tenants::suspend_tenant::<B>))
        .route("/api/tenants/:code/terminate", post(tenants::terminate_tenant::<B>))
        .route("/api/tenants/:code/subscriptions", post(tenants::subscribe_module::<B>))
        .route("/api/tenants/:code/users", post(tenants::add_user::<B>));

    let router = Router::new()
        .route("/health", get(health::health_check::<B>))
        .merge(management)
        .merge(tenant_routes(&state, "/api"))
        .merge(tenant_routes(&state, "/api/t/:tenant"));

    let router = if production {
        router
    } else {
        router.layer(from_fn(expose_error_details))
    };

    router
        .layer(from_fn_with_state(state.clone(), authenticate_request::<B>))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CompressionLayer::new())
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(production))
        .with_state(state)
}

fn tenant_routes<B: DataBackend>(state: &AppState<B>, prefix: &str) -> Router<AppState<B>> {
    Router::new()
        .route(
            &format!("{prefix}/products"),
            get(products::list_products::<B>).post(products::create_product::<B>),
        )
        .route(
            &format!("{prefix}/customers"),
            get(customers::list_customers::<B>).post(customers::create_customer::<B>),
        )
        .route_layer(from_fn_with_state(state.clone(), resolve_tenant::<B>))
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.api.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    let tenant_header = HeaderName::from_bytes(config.tenancy.header_name.to_ascii_lowercase().as_bytes())
        .unwrap_or(HeaderName::from_static("x-tenant-id"));

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, tenant_header])
        .expose_headers([HeaderName::from_static("x-tenant-identifier")])
        .max_age(Duration::from_secs(3600))
}
