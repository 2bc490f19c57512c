//! Domain model
//!
//! Master database entities (tenant registry):
//!
//! - `tenant`: tenant aggregate and lifecycle
//! - `database_info`: physical database of a tenant
//! - `settings`: tenant preferences
//! - `module`: billable modules
//! - `subscription`: tenant module subscriptions
//! - `tenant_user`: user memberships
//!
//! Tenant database entities (business data):
//!
//! - `customer`, `product`, `order`, `account`, `employee`

pub mod account;
pub mod customer;
pub mod database_info;
pub mod employee;
pub mod error;
pub mod module;
pub mod order;
pub mod product;
pub mod settings;
pub mod subscription;
pub mod tenant;
pub mod tenant_user;

pub use account::{Account, AccountType};
pub use customer::{CreateCustomer, Customer};
pub use database_info::DatabaseInfo;
pub use employee::Employee;
pub use error::DomainError;
pub use module::Module;
pub use order::{Order, OrderStatus};
pub use product::{CreateProduct, Product};
pub use settings::TenantSettings;
pub use subscription::{SubscriptionPeriod, SubscriptionStatus, TenantModuleSubscription};
pub use tenant::{CreateTenant, Tenant, TenantStatus};
pub use tenant_user::TenantUser;
