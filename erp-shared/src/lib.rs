//! # ERP shared library
//!
//! Domain model and data access shared by the ERP API server and the
//! background worker.
//!
//! ## Module Organization
//!
//! - `models`: master and tenant entities with their invariants
//! - `specification`: composable query specifications and concrete catalog
//! - `data`: repositories, units of work, retry strategy, PostgreSQL and
//!   in-memory backends
//! - `tenancy`: identifier extraction, tenant resolution and access validation
//! - `auth`: JWT claims and the optional bearer-token layer
//! - `db`: pool creation and migrations

pub mod auth;
pub mod data;
pub mod db;
pub mod models;
pub mod specification;
pub mod tenancy;

/// Current version of the ERP shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
