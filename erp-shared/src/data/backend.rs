//! Backend abstraction used by the tenancy services, the API and the worker
//!
//! A backend hands out units of work: one over the master database and one
//! per tenant database. Opening a tenant database requires a
//! [`ValidatedTenant`](crate::tenancy::ValidatedTenant), so tenant data is
//! only reachable after access validation.

use async_trait::async_trait;
use uuid::Uuid;

use super::diagnostics::ConnectionStats;
use super::unit_of_work::{MasterUnitOfWork, TenantUnitOfWork, UnitOfWork};
use super::DataError;
use crate::models::Tenant;
use crate::tenancy::ValidatedTenant;

/// Source of units of work for the master and tenant databases
#[async_trait]
pub trait DataBackend: Clone + Send + Sync + 'static {
    type Uow: UnitOfWork + 'static;

    /// New unit of work over the master database
    fn master(&self) -> MasterUnitOfWork<Self::Uow>;

    /// New unit of work over a tenant's own database
    ///
    /// Only a [`ValidatedTenant`] opens a tenant database, so tenant access
    /// has always been validated first.
    async fn tenant(&self, tenant: &ValidatedTenant) -> Result<TenantUnitOfWork<Self::Uow>, DataError>;

    /// Creates a tenant's database and schema if missing
    ///
    /// # Errors
    ///
    /// Fails when the tenant has no database info or the server refuses.
    async fn provision_tenant(&self, tenant: &Tenant) -> Result<(), DataError>;

    /// Drops any cached connection to a tenant's database
    async fn release_tenant(&self, tenant_id: Uuid);

    /// Round trip to the master database
    async fn check_master(&self) -> Result<(), DataError>;

    fn connection_stats(&self) -> ConnectionStats;
}
