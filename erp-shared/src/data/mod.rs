//! Data access layer
//!
//! Repositories and units of work over two interchangeable backends:
//! PostgreSQL for deployments and an in-memory store for tests and local
//! development. The master database holds the tenant registry; every tenant
//! has a database of its own.

mod backend;
mod diagnostics;
mod entity;
mod error;
pub mod memory;
pub mod postgres;
mod repository;
mod strategy;
mod unit_of_work;

#[cfg(test)]
pub(crate) mod test_support;

pub use backend::DataBackend;
pub use diagnostics::{ConnectionDiagnostics, ConnectionStats};
pub use entity::{attach_children, ChildLoader, Entity, Includes, MasterEntity, Record, TenantEntity};
pub use error::{is_transient_sqlx, DataError, TransientError};
pub use memory::{MemoryBackend, MemoryDatabase, MemoryUnitOfWork};
pub use postgres::{PgBackend, PgRecord, PgUnitOfWork, TenantDatabaseRouter, TenantPoolConfig};
pub use repository::Repository;
pub use strategy::ExecutionStrategy;
pub use unit_of_work::{
    execute_in_transaction, MasterUnitOfWork, RepositoryCache, TenantUnitOfWork, Transactional,
    UnitOfWork,
};
