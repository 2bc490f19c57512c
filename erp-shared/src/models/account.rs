//! Chart of accounts (tenant database)
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE accounts (
//!     id UUID PRIMARY KEY,
//!     code VARCHAR(20) NOT NULL UNIQUE,
//!     name VARCHAR(200) NOT NULL,
//!     account_type TEXT NOT NULL,
//!     balance NUMERIC(18, 2) NOT NULL DEFAULT 0,
//!     is_active BOOLEAN NOT NULL DEFAULT TRUE,
//!     created_at TIMESTAMPTZ NOT NULL
//! );
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::query_builder::Separated;
use sqlx::Postgres;
use uuid::Uuid;

use super::error::{required, DomainError};
use crate::data::postgres::PgRecord;
use crate::data::{Entity, Includes, TenantEntity};
use crate::specification::FieldValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Asset => "asset",
            AccountType::Liability => "liability",
            AccountType::Equity => "equity",
            AccountType::Revenue => "revenue",
            AccountType::Expense => "expense",
        }
    }

    /// Debit-normal accounts grow with debits
    pub fn is_debit_normal(&self) -> bool {
        matches!(self, AccountType::Asset | AccountType::Expense)
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for AccountType {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "asset" => Ok(AccountType::Asset),
            "liability" => Ok(AccountType::Liability),
            "equity" => Ok(AccountType::Equity),
            "revenue" => Ok(AccountType::Revenue),
            "expense" => Ok(AccountType::Expense),
            other => Err(DomainError::invalid("account_type", format!("unknown account type '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub account_type: AccountType,
    pub balance: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(code: &str, name: &str, account_type: AccountType) -> Result<Self, DomainError> {
        Ok(Self {
            id: Uuid::new_v4(),
            code: required("code", code)?,
            name: required("name", name)?,
            account_type,
            balance: Decimal::ZERO,
            is_active: true,
            created_at: Utc::now(),
        })
    }

    /// Posts a debit (positive) or credit (negative) amount
    pub fn post(&mut self, debit: Decimal) {
        if self.account_type.is_debit_normal() {
            self.balance += debit;
        } else {
            self.balance -= debit;
        }
    }
}

impl Entity for Account {
    const NAME: &'static str = "account";
    const FIELDS: &'static [&'static str] =
        &["id", "code", "name", "account_type", "balance", "is_active", "created_at"];

    fn id(&self) -> Uuid {
        self.id
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        Some(match name {
            "id" => self.id.into(),
            "code" => self.code.as_str().into(),
            "name" => self.name.as_str().into(),
            "account_type" => self.account_type.as_str().into(),
            "balance" => self.balance.into(),
            "is_active" => self.is_active.into(),
            "created_at" => self.created_at.into(),
            _ => return None,
        })
    }
}

impl Includes for Account {}

impl TenantEntity for Account {}

impl PgRecord for Account {
    const TABLE: &'static str = "accounts";
    const COLUMNS: &'static [&'static str] =
        &["id", "code", "name", "account_type", "balance", "is_active", "created_at"];

    fn bind_columns(&self, row: &mut Separated<'_, 'static, Postgres, &'static str>) {
        row.push_bind(self.id)
            .push_bind(self.code.clone())
            .push_bind(self.name.clone())
            .push_bind(self.account_type.as_str())
            .push_bind(self.balance)
            .push_bind(self.is_active)
            .push_bind(self.created_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posting_follows_normal_side() {
        let mut cash = Account::new("1000", "Cash", AccountType::Asset).unwrap();
        let mut sales = Account::new("4000", "Sales", AccountType::Revenue).unwrap();
        cash.post(Decimal::from(50));
        sales.post(Decimal::from(-50));
        assert_eq!(cash.balance, Decimal::from(50));
        assert_eq!(sales.balance, Decimal::from(50));
    }
}
