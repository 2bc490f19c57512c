//! Customers (tenant database)
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE customers (
//!     id UUID PRIMARY KEY,
//!     code VARCHAR(50) NOT NULL UNIQUE,
//!     name VARCHAR(200) NOT NULL,
//!     email VARCHAR(255),
//!     credit_limit NUMERIC(18, 2) NOT NULL DEFAULT 0,
//!     current_balance NUMERIC(18, 2) NOT NULL DEFAULT 0,
//!     is_active BOOLEAN NOT NULL DEFAULT TRUE,
//!     created_at TIMESTAMPTZ NOT NULL,
//!     updated_at TIMESTAMPTZ NOT NULL
//! );
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::query_builder::Separated;
use sqlx::Postgres;
use uuid::Uuid;
use validator::ValidateEmail;

use super::error::{optional, required, DomainError};
use crate::data::postgres::PgRecord;
use crate::data::{Entity, Includes, TenantEntity};
use crate::specification::FieldValue;

/// Input for creating a customer
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCustomer {
    pub code: String,
    pub name: String,
    pub email: Option<String>,
    #[serde(default)]
    pub credit_limit: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Customer {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub email: Option<String>,
    pub credit_limit: Decimal,
    pub current_balance: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn create(input: CreateCustomer) -> Result<Self, DomainError> {
        if input.credit_limit.is_sign_negative() {
            return Err(DomainError::invalid("credit_limit", "must not be negative"));
        }
        let email = optional(input.email.as_deref());
        if email.as_ref().is_some_and(|e| !e.validate_email()) {
            return Err(DomainError::invalid("email", "not an email address"));
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            code: required("code", &input.code)?.to_ascii_uppercase(),
            name: required("name", &input.name)?,
            email,
            credit_limit: input.credit_limit,
            current_balance: Decimal::ZERO,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Adds an amount to the open balance
    pub fn charge(&mut self, amount: Decimal) -> Result<(), DomainError> {
        if amount.is_sign_negative() {
            return Err(DomainError::invalid("amount", "must not be negative"));
        }
        self.current_balance += amount;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn is_credit_exceeded(&self) -> bool {
        self.current_balance > self.credit_limit
    }
}

impl Entity for Customer {
    const NAME: &'static str = "customer";
    const FIELDS: &'static [&'static str] = &[
        "id",
        "code",
        "name",
        "email",
        "credit_limit",
        "current_balance",
        "is_active",
        "created_at",
    ];

    fn id(&self) -> Uuid {
        self.id
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        Some(match name {
            "id" => self.id.into(),
            "code" => self.code.as_str().into(),
            "name" => self.name.as_str().into(),
            "email" => self.email.as_deref().into(),
            "credit_limit" => self.credit_limit.into(),
            "current_balance" => self.current_balance.into(),
            "is_active" => self.is_active.into(),
            "created_at" => self.created_at.into(),
            _ => return None,
        })
    }
}

impl Includes for Customer {}

impl TenantEntity for Customer {}

impl PgRecord for Customer {
    const TABLE: &'static str = "customers";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "code",
        "name",
        "email",
        "credit_limit",
        "current_balance",
        "is_active",
        "created_at",
        "updated_at",
    ];

    fn bind_columns(&self, row: &mut Separated<'_, 'static, Postgres, &'static str>) {
        row.push_bind(self.id)
            .push_bind(self.code.clone())
            .push_bind(self.name.clone())
            .push_bind(self.email.clone())
            .push_bind(self.credit_limit)
            .push_bind(self.current_balance)
            .push_bind(self.is_active)
            .push_bind(self.created_at)
            .push_bind(self.updated_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(limit: i64) -> CreateCustomer {
        CreateCustomer {
            code: "c-001".into(),
            name: "Globex".into(),
            email: None,
            credit_limit: Decimal::from(limit),
        }
    }

    #[test]
    fn test_credit_exceeded() {
        let mut customer = Customer::create(input(100)).unwrap();
        assert_eq!(customer.code, "C-001");
        customer.charge(Decimal::from(100)).unwrap();
        assert!(!customer.is_credit_exceeded());
        customer.charge(Decimal::new(1, 2)).unwrap();
        assert!(customer.is_credit_exceeded());
    }

    #[test]
    fn test_validation() {
        assert!(Customer::create(input(-1)).is_err());
        let mut bad_email = input(1);
        bad_email.email = Some("nope".into());
        assert!(Customer::create(bad_email).is_err());
        let mut customer = Customer::create(input(1)).unwrap();
        assert!(customer.charge(Decimal::from(-5)).is_err());
    }
}
