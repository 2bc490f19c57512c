//! Tenant database routing
//!
//! Maps a tenant to a connection pool for its own database. Pools live in a
//! `moka` cache bounded by count and idle time, so a busy tenant keeps its
//! pool and an idle one releases its connections.
//!
//! ```text
//! pool_for(tenant)
//!   ├─> cached pool            -> reused
//!   └─> DatabaseInfo::connect_options
//!         ├─> PgPoolOptions::connect_with -> created
//!         └─> optional tenant migrations
//! ```

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::data::{ConnectionDiagnostics, DataError};
use crate::db::migrations::run_tenant_migrations;
use crate::models::{DatabaseInfo, DomainError, Tenant};

/// Pool settings applied to every tenant database
#[derive(Debug, Clone)]
pub struct TenantPoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    /// Pools unused for this long are closed
    pub pool_idle_ttl: Duration,
    /// Maximum number of open tenant pools
    pub max_pools: u64,
    /// Apply tenant migrations when a pool is first opened
    pub run_migrations: bool,
}

impl Default for TenantPoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            min_connections: 0,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(300),
            pool_idle_ttl: Duration::from_secs(1800),
            max_pools: 100,
            run_migrations: false,
        }
    }
}

/// One connection pool per tenant database
///
/// Pools are opened on first use and shared by every later request for the
/// same tenant. Concurrent first requests open a single pool. Idle pools are
/// evicted; their connections close once in-flight units of work finish.
pub struct TenantDatabaseRouter {
    pools: Cache<Uuid, PgPool>,
    config: TenantPoolConfig,
    diagnostics: Arc<ConnectionDiagnostics>,
}

impl TenantDatabaseRouter {
    pub fn new(config: TenantPoolConfig, diagnostics: Arc<ConnectionDiagnostics>) -> Self {
        let evictions = Arc::clone(&diagnostics);
        let pools = Cache::builder()
            .max_capacity(config.max_pools)
            .time_to_idle(config.pool_idle_ttl)
            .eviction_listener(move |tenant_id: Arc<Uuid>, _pool: PgPool, cause| {
                debug!(tenant_id = %tenant_id, ?cause, "Tenant pool removed");
                if cause.was_evicted() {
                    evictions.record_eviction();
                }
            })
            .build();

        Self {
            pools,
            config,
            diagnostics,
        }
    }

    /// Pool of a tenant's database, opening it on first use
    ///
    /// # Errors
    ///
    /// [`DomainError::DatabaseInfoRequired`] when the tenant has no database
    /// configured, [`DataError::TenantDatabaseUnavailable`] when connecting
    /// fails.
    pub async fn pool_for(&self, tenant: &Tenant) -> Result<PgPool, DataError> {
        let Some(info) = tenant.database_info().cloned() else {
            self.diagnostics.record_failure();
            return Err(DomainError::DatabaseInfoRequired {
                code: tenant.code().to_string(),
            }
            .into());
        };

        let config = self.config.clone();
        let entry = self
            .pools
            .entry(tenant.id())
            .or_try_insert_with(connect(info, config))
            .await;

        match entry {
            Ok(entry) => {
                if entry.is_fresh() {
                    info!(tenant_code = %tenant.code(), "Opened tenant database pool");
                    self.diagnostics.record_created();
                } else {
                    self.diagnostics.record_reused();
                }
                Ok(entry.into_value())
            }
            Err(e) => {
                warn!(tenant_code = %tenant.code(), error = %e, "Tenant database unavailable");
                self.diagnostics.record_failure();
                Err(DataError::TenantDatabaseUnavailable {
                    tenant: tenant.code().to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Drops the cached pool of a tenant, e.g. after its database moved
    pub async fn invalidate(&self, tenant_id: Uuid) {
        self.pools.invalidate(&tenant_id).await;
    }

    pub fn pool_count(&self) -> u64 {
        self.pools.entry_count()
    }
}

async fn connect(info: DatabaseInfo, config: TenantPoolConfig) -> Result<PgPool, DataError> {
    debug!(database = %info, "Connecting to tenant database");
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(Some(config.idle_timeout))
        .connect_with(info.connect_options())
        .await?;

    if config.run_migrations {
        run_tenant_migrations(&pool).await?;
    }
    Ok(pool)
}
