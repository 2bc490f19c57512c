//! In-memory [`DataBackend`]
//!
//! One [`MemoryDatabase`] holds the tenant registry; every tenant gets its
//! own database the first time it is provisioned or opened. Opening a
//! tenant without database info fails the same way the PostgreSQL backend
//! does, so tests exercise the activation rules unchanged.
//!
//! Pool events are recorded in the shared [`ConnectionDiagnostics`]:
//! the first open of a tenant counts as created, later opens as reused.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{MemoryDatabase, MemoryUnitOfWork};
use crate::data::diagnostics::{ConnectionDiagnostics, ConnectionStats};
use crate::data::{DataBackend, DataError, MasterUnitOfWork, TenantUnitOfWork};
use crate::models::{DomainError, Tenant};
use crate::tenancy::ValidatedTenant;

/// In-memory master database plus one in-memory database per tenant
#[derive(Clone, Default)]
pub struct MemoryBackend {
    master: MemoryDatabase,
    tenants: Arc<RwLock<HashMap<Uuid, MemoryDatabase>>>,
    diagnostics: Arc<ConnectionDiagnostics>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn master_database(&self) -> &MemoryDatabase {
        &self.master
    }

    /// The database of a tenant, if it has been opened
    pub async fn tenant_database(&self, tenant_id: Uuid) -> Option<MemoryDatabase> {
        self.tenants.read().await.get(&tenant_id).cloned()
    }
}

#[async_trait]
impl DataBackend for MemoryBackend {
    type Uow = MemoryUnitOfWork;

    fn master(&self) -> MasterUnitOfWork<MemoryUnitOfWork> {
        MasterUnitOfWork::new(MemoryUnitOfWork::new(self.master.clone()))
    }

    async fn tenant(
        &self,
        tenant: &ValidatedTenant,
    ) -> Result<TenantUnitOfWork<MemoryUnitOfWork>, DataError> {
        let tenant = tenant.tenant();
        if tenant.database_info().is_none() {
            self.diagnostics.record_failure();
            return Err(DomainError::DatabaseInfoRequired {
                code: tenant.code().to_string(),
            }
            .into());
        }

        if let Some(db) = self.tenants.read().await.get(&tenant.id()) {
            self.diagnostics.record_reused();
            return Ok(TenantUnitOfWork::new(MemoryUnitOfWork::new(db.clone())));
        }

        let mut tenants = self.tenants.write().await;
        let db = match tenants.get(&tenant.id()) {
            Some(db) => {
                self.diagnostics.record_reused();
                db.clone()
            }
            None => {
                debug!(tenant_code = %tenant.code(), "Creating in-memory tenant database");
                self.diagnostics.record_created();
                tenants.entry(tenant.id()).or_default().clone()
            }
        };
        Ok(TenantUnitOfWork::new(MemoryUnitOfWork::new(db)))
    }

    async fn provision_tenant(&self, tenant: &Tenant) -> Result<(), DataError> {
        if tenant.database_info().is_none() {
            return Err(DomainError::DatabaseInfoRequired {
                code: tenant.code().to_string(),
            }
            .into());
        }
        self.tenants.write().await.entry(tenant.id()).or_default();
        debug!(tenant_code = %tenant.code(), "Provisioned in-memory tenant database");
        Ok(())
    }

    async fn release_tenant(&self, _tenant_id: Uuid) {}

    async fn check_master(&self) -> Result<(), DataError> {
        Ok(())
    }

    fn connection_stats(&self) -> ConnectionStats {
        self.diagnostics.snapshot()
    }
}
