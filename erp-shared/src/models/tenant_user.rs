//! Users belonging to a tenant
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE tenant_users (
//!     id UUID PRIMARY KEY,
//!     tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
//!     email VARCHAR(255) NOT NULL,
//!     display_name VARCHAR(200) NOT NULL,
//!     is_tenant_admin BOOLEAN NOT NULL DEFAULT FALSE,
//!     is_active BOOLEAN NOT NULL DEFAULT TRUE,
//!     created_at TIMESTAMPTZ NOT NULL,
//!     UNIQUE (tenant_id, email)
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::query_builder::Separated;
use sqlx::Postgres;
use uuid::Uuid;
use validator::ValidateEmail;

use super::error::{required, DomainError};
use crate::data::postgres::PgRecord;
use crate::data::{Entity, Includes, MasterEntity};
use crate::specification::FieldValue;

/// Membership of a user in a tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TenantUser {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub display_name: String,
    pub is_tenant_admin: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl TenantUser {
    pub fn new(
        tenant_id: Uuid,
        email: &str,
        display_name: &str,
        is_tenant_admin: bool,
    ) -> Result<Self, DomainError> {
        let email = required("email", email)?.to_ascii_lowercase();
        if !email.validate_email() {
            return Err(DomainError::invalid("email", "not an email address"));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            tenant_id,
            email,
            display_name: required("display_name", display_name)?,
            is_tenant_admin,
            is_active: true,
            created_at: Utc::now(),
        })
    }
}

impl Entity for TenantUser {
    const NAME: &'static str = "tenant_user";
    const FIELDS: &'static [&'static str] = &[
        "id",
        "tenant_id",
        "email",
        "display_name",
        "is_tenant_admin",
        "is_active",
        "created_at",
    ];

    fn id(&self) -> Uuid {
        self.id
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        Some(match name {
            "id" => self.id.into(),
            "tenant_id" => self.tenant_id.into(),
            "email" => self.email.as_str().into(),
            "display_name" => self.display_name.as_str().into(),
            "is_tenant_admin" => self.is_tenant_admin.into(),
            "is_active" => self.is_active.into(),
            "created_at" => self.created_at.into(),
            _ => return None,
        })
    }
}

impl Includes for TenantUser {}

impl MasterEntity for TenantUser {}

impl PgRecord for TenantUser {
    const TABLE: &'static str = "tenant_users";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "tenant_id",
        "email",
        "display_name",
        "is_tenant_admin",
        "is_active",
        "created_at",
    ];

    fn bind_columns(&self, row: &mut Separated<'_, 'static, Postgres, &'static str>) {
        row.push_bind(self.id)
            .push_bind(self.tenant_id)
            .push_bind(self.email.clone())
            .push_bind(self.display_name.clone())
            .push_bind(self.is_tenant_admin)
            .push_bind(self.is_active)
            .push_bind(self.created_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_validates_email() {
        let user = TenantUser::new(Uuid::new_v4(), "Admin@Acme.COM", "Admin", true).unwrap();
        assert_eq!(user.email, "admin@acme.com");
        assert!(TenantUser::new(Uuid::new_v4(), "nope", "x", false).is_err());
        assert!(TenantUser::new(Uuid::new_v4(), "a@b.co", " ", false).is_err());
    }
}
