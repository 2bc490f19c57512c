//! Database plumbing
//!
//! - `pool`: master connection pool creation and health checks
//! - `migrations`: master and tenant schema migrations, tenant database
//!   provisioning

pub mod migrations;
pub mod pool;
