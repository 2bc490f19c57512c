//! Products (tenant database)
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE products (
//!     id UUID PRIMARY KEY,
//!     sku VARCHAR(64) NOT NULL UNIQUE,
//!     name VARCHAR(200) NOT NULL,
//!     category VARCHAR(100),
//!     unit_price NUMERIC(18, 2) NOT NULL,
//!     stock_quantity INTEGER NOT NULL DEFAULT 0,
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

use super::error::{optional, required, DomainError};
use crate::data::postgres::PgRecord;
use crate::data::{Entity, Includes, TenantEntity};
use crate::specification::FieldValue;

/// Input for creating a product
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProduct {
    pub sku: String,
    pub name: String,
    pub category: Option<String>,
    pub unit_price: Decimal,
    #[serde(default)]
    pub stock_quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub category: Option<String>,
    pub unit_price: Decimal,
    pub stock_quantity: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn create(input: CreateProduct) -> Result<Self, DomainError> {
        if input.unit_price.is_sign_negative() {
            return Err(DomainError::invalid("unit_price", "must not be negative"));
        }
        if input.stock_quantity < 0 {
            return Err(DomainError::invalid("stock_quantity", "must not be negative"));
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            sku: required("sku", &input.sku)?.to_ascii_uppercase(),
            name: required("name", &input.name)?,
            category: optional(input.category.as_deref()),
            unit_price: input.unit_price,
            stock_quantity: input.stock_quantity,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Adjusts stock by a signed delta; stock never goes negative
    pub fn adjust_stock(&mut self, delta: i32) -> Result<(), DomainError> {
        let quantity = self
            .stock_quantity
            .checked_add(delta)
            .filter(|q| *q >= 0)
            .ok_or_else(|| DomainError::invalid("stock_quantity", "insufficient stock"))?;
        self.stock_quantity = quantity;
        self.updated_at = Utc::now();
        Ok(())
    }
}

impl Entity for Product {
    const NAME: &'static str = "product";
    const FIELDS: &'static [&'static str] = &[
        "id",
        "sku",
        "name",
        "category",
        "unit_price",
        "stock_quantity",
        "is_active",
        "created_at",
    ];

    fn id(&self) -> Uuid {
        self.id
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        Some(match name {
            "id" => self.id.into(),
            "sku" => self.sku.as_str().into(),
            "name" => self.name.as_str().into(),
            "category" => self.category.as_deref().into(),
            "unit_price" => self.unit_price.into(),
            "stock_quantity" => self.stock_quantity.into(),
            "is_active" => self.is_active.into(),
            "created_at" => self.created_at.into(),
            _ => return None,
        })
    }
}

impl Includes for Product {}

impl TenantEntity for Product {}

impl PgRecord for Product {
    const TABLE: &'static str = "products";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "sku",
        "name",
        "category",
        "unit_price",
        "stock_quantity",
        "is_active",
        "created_at",
        "updated_at",
    ];

    fn bind_columns(&self, row: &mut Separated<'_, 'static, Postgres, &'static str>) {
        row.push_bind(self.id)
            .push_bind(self.sku.clone())
            .push_bind(self.name.clone())
            .push_bind(self.category.clone())
            .push_bind(self.unit_price)
            .push_bind(self.stock_quantity)
            .push_bind(self.is_active)
            .push_bind(self.created_at)
            .push_bind(self.updated_at);
    }
}
