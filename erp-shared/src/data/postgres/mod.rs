//! PostgreSQL backend
//!
//! - `query`: renders specifications to SQL with `sqlx::QueryBuilder`
//! - `repository`: [`PgRepository`]
//! - `unit_of_work`: [`PgUnitOfWork`], one pooled session with an optional
//!   open transaction
//! - `router`: [`TenantDatabaseRouter`], one pool per tenant database
//! - `backend`: [`PgBackend`]

mod backend;
mod query;
mod repository;
mod router;
mod unit_of_work;

use sqlx::postgres::PgRow;
use sqlx::query_builder::Separated;
use sqlx::{FromRow, Postgres};

use super::Entity;

pub use backend::PgBackend;
pub use repository::PgRepository;
pub use router::{TenantDatabaseRouter, TenantPoolConfig};
pub use unit_of_work::PgUnitOfWork;

/// Table mapping of an entity
///
/// `COLUMNS` lists every stored column in the order `bind_columns` binds
/// them. Criteria fields map to columns of the same name.
pub trait PgRecord: Entity + for<'r> FromRow<'r, PgRow> {
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];

    /// Binds one value per entry of `COLUMNS`
    fn bind_columns(&self, row: &mut Separated<'_, 'static, Postgres, &'static str>);

    /// Column backing a criteria field
    fn column(field: &str) -> Option<&'static str> {
        Self::FIELDS
            .iter()
            .copied()
            .find(|f| *f == field && Self::COLUMNS.contains(f))
    }
}
