//! API route handlers
//!
//! - `health`: liveness, master database check and pool diagnostics
//! - `tenants`: tenant registry and module catalog management
//! - `products`: inventory catalog of the resolved tenant
//! - `customers`: customer master data of the resolved tenant

pub mod customers;
pub mod health;
pub mod products;
pub mod tenants;
