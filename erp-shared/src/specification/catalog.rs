//! Named specifications used by services, routes and the worker
//!
//! Registry: active tenants, tenant by code or domain, tenant listing,
//! module and subscription lookups, expired subscriptions.
//! Tenant data: products in a price range, customers over their credit
//! limit.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::{field, Specification};
use crate::models::{
    Account, AccountType, Customer, Employee, Module, Order, Product, SubscriptionStatus, Tenant,
    TenantModuleSubscription, TenantStatus, TenantUser,
};

/// Active tenants by name
pub fn active_tenants() -> Specification<Tenant> {
    Specification::with_criteria(field("status").eq(TenantStatus::Active.as_str()))
        .order_by(field("name"))
}

/// Tenant with the given code; codes are stored upper-cased
pub fn tenant_by_code(code: &str) -> Specification<Tenant> {
    Specification::with_criteria(field("code").eq(code.trim().to_ascii_uppercase()))
}

/// Tenant registered for a custom domain; domains are stored lower-cased
pub fn tenant_by_domain(domain: &str) -> Specification<Tenant> {
    Specification::with_criteria(field("domain").eq(domain.trim().to_ascii_lowercase()))
}

/// Tenant listing, optionally narrowed by status and a search term
///
/// The search term matches code, name or domain, case-insensitively.
/// Blank terms are ignored.
pub fn tenants_by_status(status: Option<TenantStatus>, search: Option<&str>) -> Specification<Tenant> {
    let mut spec = Specification::new();
    if let Some(status) = status {
        spec = spec.filter(field("status").eq(status.as_str()));
    }
    if let Some(term) = search.map(str::trim).filter(|t| !t.is_empty()) {
        spec = spec.filter(
            field("code").contains(term) | field("name").contains(term) | field("domain").contains(term),
        );
    }
    spec.order_by(field("name")).then_by(field("code"))
}

/// Module with the given code; codes are stored upper-cased
pub fn module_by_code(code: &str) -> Specification<Module> {
    Specification::with_criteria(field("code").eq(code.trim().to_ascii_uppercase()))
}

/// Modules open for subscription
pub fn active_modules() -> Specification<Module> {
    Specification::with_criteria(field("is_active").eq(true)).order_by(field("code"))
}

/// A tenant's user with the given email
pub fn tenant_user_by_email(tenant_id: Uuid, email: &str) -> Specification<TenantUser> {
    Specification::with_criteria(
        field("tenant_id").eq(tenant_id) & field("email").eq(email.trim().to_ascii_lowercase()),
    )
}

/// Subscriptions still marked active whose period has ended
pub fn expired_subscriptions(now: DateTime<Utc>) -> Specification<TenantModuleSubscription> {
    Specification::with_criteria(
        field("status").eq(SubscriptionStatus::Active.as_str()) & field("end_date").le(now),
    )
    .order_by(field("end_date"))
}

/// Active subscriptions of one tenant
pub fn subscriptions_of_tenant(tenant_id: Uuid) -> Specification<TenantModuleSubscription> {
    Specification::with_criteria(field("tenant_id").eq(tenant_id)).order_by(field("module_code"))
}

/// Active products priced within an inclusive range
pub fn products_in_price_range(min: Option<Decimal>, max: Option<Decimal>) -> Specification<Product> {
    Specification::with_criteria(field("is_active").eq(true) & field("unit_price").between(min, max))
        .order_by(field("unit_price"))
        .then_by(field("sku"))
}

/// Active customers whose balance is above their credit limit
pub fn customers_with_credit_exceeded() -> Specification<Customer> {
    use super::Comparison;

    Specification::with_criteria(
        field("is_active").eq(true)
            & field("current_balance").compared_to(Comparison::Gt, field("credit_limit")),
    )
    .order_by(field("code"))
}

/// A customer's orders, newest first
pub fn orders_by_customer(customer_id: Uuid) -> Specification<Order> {
    Specification::with_criteria(field("customer_id").eq(customer_id))
        .order_by_descending(field("order_date"))
        .then_by(field("order_number"))
}

/// Active employees of a department by name
pub fn employees_by_department(department: &str) -> Specification<Employee> {
    Specification::with_criteria(field("department").eq(department.trim()) & field("is_active").eq(true))
        .order_by(field("last_name"))
        .then_by(field("first_name"))
}

/// Chart of accounts entries of one type by code
pub fn accounts_by_type(account_type: AccountType) -> Specification<Account> {
    Specification::with_criteria(field("account_type").eq(account_type.as_str())).order_by(field("code"))
}
