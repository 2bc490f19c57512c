//! Configuration management for the API server
//!
//! Settings are layered, later sources winning:
//!
//! 1. built-in defaults
//! 2. optional `config/erp.toml`
//! 3. `ERP__<SECTION>__<KEY>` environment variables, e.g.
//!    `ERP__MASTER_DATABASE__URL` or `ERP__API__PORT`
//!
//! A `.env` file is loaded first when present. `ERP__MASTER_DATABASE__URL`
//! and `ERP__JWT__SECRET` (at least 32 characters) are required.

use std::time::Duration;

use anyhow::Context;
use config::{Environment, File};
use erp_shared::data::{ExecutionStrategy, TenantPoolConfig};
use erp_shared::db::pool::DatabaseConfig;
use erp_shared::specification::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use erp_shared::tenancy::{ResolverConfig, DEFAULT_TENANT_HEADER};
use serde::Deserialize;

/// Complete application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub master_database: DatabaseConfig,
    pub tenant_database: TenantDatabaseConfig,
    pub tenancy: TenancyConfig,
    pub retry: RetryConfig,
    pub pagination: PaginationConfig,
    pub jwt: JwtConfig,
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Enables HSTS and hides internal error details
    pub production: bool,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            production: false,
            cors_origins: vec!["*".to_string()],
        }
    }
}

/// Pools opened per tenant database
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TenantDatabaseConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,

    /// Tenant pools unused for this long are closed
    pub pool_idle_ttl_seconds: u64,
    pub max_pools: u64,
    pub run_migrations: bool,
}

impl Default for TenantDatabaseConfig {
    fn default() -> Self {
        let pools = TenantPoolConfig::default();
        Self {
            max_connections: pools.max_connections,
            min_connections: pools.min_connections,
            acquire_timeout_seconds: pools.acquire_timeout.as_secs(),
            idle_timeout_seconds: pools.idle_timeout.as_secs(),
            pool_idle_ttl_seconds: pools.pool_idle_ttl.as_secs(),
            max_pools: pools.max_pools,
            run_migrations: pools.run_migrations,
        }
    }
}

impl TenantDatabaseConfig {
    pub fn pool_config(&self) -> TenantPoolConfig {
        TenantPoolConfig {
            max_connections: self.max_connections,
            min_connections: self.min_connections,
            acquire_timeout: Duration::from_secs(self.acquire_timeout_seconds),
            idle_timeout: Duration::from_secs(self.idle_timeout_seconds),
            pool_idle_ttl: Duration::from_secs(self.pool_idle_ttl_seconds),
            max_pools: self.max_pools,
            run_migrations: self.run_migrations,
        }
    }
}

/// Tenant identification and resolution
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TenancyConfig {
    pub header_name: String,
    pub resolve_subdomains: bool,
    pub cache_ttl_seconds: u64,
    pub cache_max_entries: u64,

    /// Path prefixes served without a tenant, on top of the built-in list
    pub excluded_paths: Vec<String>,
}

impl Default for TenancyConfig {
    fn default() -> Self {
        let resolver = ResolverConfig::default();
        Self {
            header_name: DEFAULT_TENANT_HEADER.to_string(),
            resolve_subdomains: true,
            cache_ttl_seconds: resolver.ttl.as_secs(),
            cache_max_entries: resolver.max_entries,
            excluded_paths: Vec::new(),
        }
    }
}

impl TenancyConfig {
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            ttl: Duration::from_secs(self.cache_ttl_seconds),
            max_entries: self.cache_max_entries,
        }
    }
}

/// Retry policy for transient database failures
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let strategy = ExecutionStrategy::default();
        Self {
            max_retries: strategy.max_retries,
            base_delay_ms: strategy.base_delay.as_millis() as u64,
            max_delay_ms: strategy.max_delay.as_millis() as u64,
        }
    }
}

impl RetryConfig {
    pub fn strategy(&self) -> ExecutionStrategy {
        ExecutionStrategy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

/// JWT configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    /// HS256 secret; at least 32 bytes. Generate with `openssl rand -hex 32`.
    pub secret: String,
}

impl Config {
    /// Loads configuration from `.env`, `config/erp.toml` and the environment
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or a required value is
    /// missing or invalid.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config: Config = config::Config::builder()
            .add_source(File::with_name("config/erp").required(false))
            .add_source(
                Environment::with_prefix("ERP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("api.cors_origins")
                    .with_list_parse_key("tenancy.excluded_paths"),
            )
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Checks required values and cross-field constraints
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.master_database.url.trim().is_empty() {
            anyhow::bail!("ERP__MASTER_DATABASE__URL is required");
        }
        if self.jwt.secret.len() < 32 {
            anyhow::bail!("ERP__JWT__SECRET must be at least 32 characters long");
        }
        if self.pagination.default_page_size == 0
            || self.pagination.default_page_size > self.pagination.max_page_size
        {
            anyhow::bail!("pagination.default_page_size must be between 1 and max_page_size");
        }
        Ok(())
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}
