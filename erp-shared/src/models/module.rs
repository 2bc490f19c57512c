//! Billable modules
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE modules (
//!     id UUID PRIMARY KEY,
//!     code VARCHAR(50) NOT NULL UNIQUE,
//!     name VARCHAR(200) NOT NULL,
//!     description TEXT,
//!     is_active BOOLEAN NOT NULL DEFAULT TRUE,
//!     created_at TIMESTAMPTZ NOT NULL
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::query_builder::Separated;
use sqlx::Postgres;
use uuid::Uuid;

use super::error::{optional, required, DomainError};
use crate::data::postgres::PgRecord;
use crate::data::{Entity, Includes, MasterEntity};
use crate::specification::FieldValue;

/// Module codes gating the tenant-scoped endpoints
pub mod codes {
    pub const INVENTORY: &str = "INVENTORY";
    pub const CRM: &str = "CRM";
    pub const SALES: &str = "SALES";
    pub const ACCOUNTING: &str = "ACCOUNTING";
    pub const HR: &str = "HR";
}

/// A feature area a tenant can subscribe to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Module {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Module {
    pub fn new(code: &str, name: &str, description: Option<&str>) -> Result<Self, DomainError> {
        Ok(Self {
            id: Uuid::new_v4(),
            code: required("code", code)?.to_ascii_uppercase(),
            name: required("name", name)?,
            description: optional(description),
            is_active: true,
            created_at: Utc::now(),
        })
    }
}

impl Entity for Module {
    const NAME: &'static str = "module";
    const FIELDS: &'static [&'static str] = &["id", "code", "name", "is_active", "created_at"];

    fn id(&self) -> Uuid {
        self.id
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        Some(match name {
            "id" => self.id.into(),
            "code" => self.code.as_str().into(),
            "name" => self.name.as_str().into(),
            "is_active" => self.is_active.into(),
            "created_at" => self.created_at.into(),
            _ => return None,
        })
    }
}

impl Includes for Module {}

impl MasterEntity for Module {}

impl PgRecord for Module {
    const TABLE: &'static str = "modules";
    const COLUMNS: &'static [&'static str] =
        &["id", "code", "name", "description", "is_active", "created_at"];

    fn bind_columns(&self, row: &mut Separated<'_, 'static, Postgres, &'static str>) {
        row.push_bind(self.id)
            .push_bind(self.code.clone())
            .push_bind(self.name.clone())
            .push_bind(self.description.clone())
            .push_bind(self.is_active)
            .push_bind(self.created_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_module() {
        let module = Module::new("crm", "Customer Relations", Some(" ")).unwrap();
        assert_eq!(module.code, codes::CRM);
        assert_eq!(module.description, None);
        assert!(module.is_active);
        assert!(Module::new("", "x", None).is_err());
    }
}
