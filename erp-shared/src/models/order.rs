//! Sales orders (tenant database)
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE orders (
//!     id UUID PRIMARY KEY,
//!     order_number VARCHAR(50) NOT NULL UNIQUE,
//!     customer_id UUID NOT NULL REFERENCES customers(id),
//!     status TEXT NOT NULL,
//!     order_date TIMESTAMPTZ NOT NULL,
//!     total_amount NUMERIC(18, 2) NOT NULL DEFAULT 0,
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
pub enum OrderStatus {
    Draft,
    Confirmed,
    Shipped,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "draft",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for OrderStatus {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "draft" => Ok(OrderStatus::Draft),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "shipped" => Ok(OrderStatus::Shipped),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(DomainError::invalid("status", format!("unknown order status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    #[sqlx(try_from = "String")]
    pub status: OrderStatus,
    pub order_date: DateTime<Utc>,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn new(order_number: &str, customer_id: Uuid, total_amount: Decimal) -> Result<Self, DomainError> {
        if total_amount.is_sign_negative() {
            return Err(DomainError::invalid("total_amount", "must not be negative"));
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            order_number: required("order_number", order_number)?,
            customer_id,
            status: OrderStatus::Draft,
            order_date: now,
            total_amount,
            created_at: now,
        })
    }

    pub fn confirm(&mut self) -> Result<(), DomainError> {
        self.advance(OrderStatus::Draft, OrderStatus::Confirmed)
    }

    pub fn ship(&mut self) -> Result<(), DomainError> {
        self.advance(OrderStatus::Confirmed, OrderStatus::Shipped)
    }

    pub fn complete(&mut self) -> Result<(), DomainError> {
        self.advance(OrderStatus::Shipped, OrderStatus::Completed)
    }

    pub fn cancel(&mut self) -> Result<(), DomainError> {
        match self.status {
            OrderStatus::Draft | OrderStatus::Confirmed => {
                self.status = OrderStatus::Cancelled;
                Ok(())
            }
            other => Err(DomainError::invalid(
                "status",
                format!("cannot cancel a {other} order"),
            )),
        }
    }

    fn advance(&mut self, from: OrderStatus, to: OrderStatus) -> Result<(), DomainError> {
        if self.status != from {
            return Err(DomainError::invalid(
                "status",
                format!("cannot move a {} order to {}", self.status, to),
            ));
        }
        self.status = to;
        Ok(())
    }
}

impl Entity for Order {
    const NAME: &'static str = "order";
    const FIELDS: &'static [&'static str] = &[
        "id",
        "order_number",
        "customer_id",
        "status",
        "order_date",
        "total_amount",
        "created_at",
    ];

    fn id(&self) -> Uuid {
        self.id
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        Some(match name {
            "id" => self.id.into(),
            "order_number" => self.order_number.as_str().into(),
            "customer_id" => self.customer_id.into(),
            "status" => self.status.as_str().into(),
            "order_date" => self.order_date.into(),
            "total_amount" => self.total_amount.into(),
            "created_at" => self.created_at.into(),
            _ => return None,
        })
    }
}

impl Includes for Order {}

impl TenantEntity for Order {}

impl PgRecord for Order {
    const TABLE: &'static str = "orders";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "order_number",
        "customer_id",
        "status",
        "order_date",
        "total_amount",
        "created_at",
    ];

    fn bind_columns(&self, row: &mut Separated<'_, 'static, Postgres, &'static str>) {
        row.push_bind(self.id)
            .push_bind(self.order_number.clone())
            .push_bind(self.customer_id)
            .push_bind(self.status.as_str())
            .push_bind(self.order_date)
            .push_bind(self.total_amount)
            .push_bind(self.created_at);
    }
}
