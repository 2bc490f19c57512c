//! Employees (tenant database)
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE employees (
//!     id UUID PRIMARY KEY,
//!     employee_number VARCHAR(50) NOT NULL UNIQUE,
//!     first_name VARCHAR(100) NOT NULL,
//!     last_name VARCHAR(100) NOT NULL,
//!     department VARCHAR(100) NOT NULL,
//!     hire_date DATE NOT NULL,
//!     salary NUMERIC(18, 2) NOT NULL,
//!     is_active BOOLEAN NOT NULL DEFAULT TRUE,
//!     created_at TIMESTAMPTZ NOT NULL
//! );
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::query_builder::Separated;
use sqlx::Postgres;
use uuid::Uuid;

use super::error::{required, DomainError};
use crate::data::postgres::PgRecord;
use crate::data::{Entity, Includes, TenantEntity};
use crate::specification::FieldValue;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Employee {
    pub id: Uuid,
    pub employee_number: String,
    pub first_name: String,
    pub last_name: String,
    pub department: String,
    pub hire_date: NaiveDate,
    pub salary: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Employee {
    pub fn hire(
        employee_number: &str,
        first_name: &str,
        last_name: &str,
        department: &str,
        hire_date: NaiveDate,
        salary: Decimal,
    ) -> Result<Self, DomainError> {
        if salary.is_sign_negative() {
            return Err(DomainError::invalid("salary", "must not be negative"));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            employee_number: required("employee_number", employee_number)?,
            first_name: required("first_name", first_name)?,
            last_name: required("last_name", last_name)?,
            department: required("department", department)?,
            hire_date,
            salary,
            is_active: true,
            created_at: Utc::now(),
        })
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl Entity for Employee {
    const NAME: &'static str = "employee";
    const FIELDS: &'static [&'static str] = &[
        "id",
        "employee_number",
        "first_name",
        "last_name",
        "department",
        "hire_date",
        "salary",
        "is_active",
    ];

    fn id(&self) -> Uuid {
        self.id
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        Some(match name {
            "id" => self.id.into(),
            "employee_number" => self.employee_number.as_str().into(),
            "first_name" => self.first_name.as_str().into(),
            "last_name" => self.last_name.as_str().into(),
            "department" => self.department.as_str().into(),
            "hire_date" => self.hire_date.into(),
            "salary" => self.salary.into(),
            "is_active" => self.is_active.into(),
            _ => return None,
        })
    }
}

impl Includes for Employee {}

impl TenantEntity for Employee {}

impl PgRecord for Employee {
    const TABLE: &'static str = "employees";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "employee_number",
        "first_name",
        "last_name",
        "department",
        "hire_date",
        "salary",
        "is_active",
        "created_at",
    ];

    fn bind_columns(&self, row: &mut Separated<'_, 'static, Postgres, &'static str>) {
        row.push_bind(self.id)
            .push_bind(self.employee_number.clone())
            .push_bind(self.first_name.clone())
            .push_bind(self.last_name.clone())
            .push_bind(self.department.clone())
            .push_bind(self.hire_date)
            .push_bind(self.salary)
            .push_bind(self.is_active)
            .push_bind(self.created_at);
    }
}
