//! PostgreSQL [`DataBackend`]
//!
//! The master pool serves the tenant registry. Tenant units of work get a
//! pool from the [`TenantDatabaseRouter`], keyed by tenant id and built from
//! the tenant's [`DatabaseInfo`](crate::models::DatabaseInfo).
//!
//! # Example
//!
//! ```text
//! let pool = create_pool(&config).await?;
//! let backend = PgBackend::new(pool, TenantPoolConfig::default());
//! let mut uow = backend.tenant(&validated).await?;
//! let products = uow.products().find(&spec).await?;
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::{PgUnitOfWork, TenantDatabaseRouter, TenantPoolConfig};
use crate::data::{
    ConnectionDiagnostics, ConnectionStats, DataBackend, DataError, MasterUnitOfWork,
    TenantUnitOfWork,
};
use crate::db::migrations::provision_tenant_database;
use crate::models::{DomainError, Tenant};
use crate::tenancy::ValidatedTenant;

/// Master pool plus a router over tenant pools
#[derive(Clone)]
pub struct PgBackend {
    master: PgPool,
    router: Arc<TenantDatabaseRouter>,
    diagnostics: Arc<ConnectionDiagnostics>,
}

impl PgBackend {
    pub fn new(master: PgPool, tenant_pools: TenantPoolConfig) -> Self {
        let diagnostics = Arc::new(ConnectionDiagnostics::new());
        let router = TenantDatabaseRouter::new(tenant_pools, Arc::clone(&diagnostics));
        Self {
            master,
            router: Arc::new(router),
            diagnostics,
        }
    }

    pub fn master_pool(&self) -> &PgPool {
        &self.master
    }

    pub fn router(&self) -> &TenantDatabaseRouter {
        &self.router
    }
}

#[async_trait]
impl DataBackend for PgBackend {
    type Uow = PgUnitOfWork;

    fn master(&self) -> MasterUnitOfWork<PgUnitOfWork> {
        MasterUnitOfWork::new(PgUnitOfWork::new(self.master.clone()))
    }

    async fn tenant(
        &self,
        tenant: &ValidatedTenant,
    ) -> Result<TenantUnitOfWork<PgUnitOfWork>, DataError> {
        let pool = self.router.pool_for(tenant.tenant()).await?;
        Ok(TenantUnitOfWork::new(PgUnitOfWork::new(pool)))
    }

    async fn provision_tenant(&self, tenant: &Tenant) -> Result<(), DataError> {
        let info = tenant
            .database_info()
            .ok_or_else(|| DomainError::DatabaseInfoRequired {
                code: tenant.code().to_string(),
            })?;
        provision_tenant_database(info).await?;
        info!(tenant_code = %tenant.code(), "Tenant database provisioned");
        Ok(())
    }

    async fn release_tenant(&self, tenant_id: Uuid) {
        self.router.invalidate(tenant_id).await;
    }

    async fn check_master(&self) -> Result<(), DataError> {
        sqlx::query("SELECT 1").execute(&self.master).await?;
        Ok(())
    }

    fn connection_stats(&self) -> ConnectionStats {
        self.diagnostics.snapshot()
    }
}
