//! Module subscriptions of a tenant
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE tenant_module_subscriptions (
//!     id UUID PRIMARY KEY,
//!     tenant_id UUID NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
//!     module_code VARCHAR(50) NOT NULL,
//!     start_date TIMESTAMPTZ NOT NULL,
//!     end_date TIMESTAMPTZ NOT NULL,
//!     status TEXT NOT NULL,
//!     auto_renew BOOLEAN NOT NULL DEFAULT FALSE,
//!     created_at TIMESTAMPTZ NOT NULL,
//!     updated_at TIMESTAMPTZ NOT NULL
//! );
//! ```

use std::fmt;

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use sqlx::query_builder::Separated;
use sqlx::Postgres;
use uuid::Uuid;

use super::error::{required, DomainError};
use crate::data::postgres::PgRecord;
use crate::data::{Entity, Includes, MasterEntity};
use crate::specification::FieldValue;

/// Subscription status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Suspended,
    Cancelled,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Suspended => "suspended",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for SubscriptionStatus {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "active" => Ok(SubscriptionStatus::Active),
            "suspended" => Ok(SubscriptionStatus::Suspended),
            "cancelled" => Ok(SubscriptionStatus::Cancelled),
            "expired" => Ok(SubscriptionStatus::Expired),
            other => Err(DomainError::invalid(
                "status",
                format!("unknown subscription status '{other}'"),
            )),
        }
    }
}

/// Validity window of a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SubscriptionPeriod {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl SubscriptionPeriod {
    pub fn new(start_date: DateTime<Utc>, end_date: DateTime<Utc>) -> Result<Self, DomainError> {
        if end_date <= start_date {
            return Err(DomainError::invalid("end_date", "must be after start_date"));
        }
        Ok(Self {
            start_date,
            end_date,
        })
    }

    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        self.end_date <= now
    }
}

/// Link between a tenant and a module it pays for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TenantModuleSubscription {
    id: Uuid,
    tenant_id: Uuid,
    module_code: String,
    #[sqlx(flatten)]
    period: SubscriptionPeriod,
    #[sqlx(try_from = "String")]
    status: SubscriptionStatus,
    auto_renew: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TenantModuleSubscription {
    pub fn new(
        tenant_id: Uuid,
        module_code: &str,
        period: SubscriptionPeriod,
        auto_renew: bool,
    ) -> Result<Self, DomainError> {
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            tenant_id,
            module_code: required("module_code", module_code)?.to_ascii_uppercase(),
            period,
            status: SubscriptionStatus::Active,
            auto_renew,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    pub fn module_code(&self) -> &str {
        &self.module_code
    }

    pub fn period(&self) -> SubscriptionPeriod {
        self.period
    }

    pub fn status(&self) -> SubscriptionStatus {
        self.status
    }

    pub fn auto_renew(&self) -> bool {
        self.auto_renew
    }

    /// Active and inside its period
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active && !self.period.has_expired(now)
    }

    /// Extends the period by `months`, counted from the current end date
    ///
    /// Renewing an expired subscription reactivates it.
    pub fn renew(&mut self, months: u32) -> Result<(), DomainError> {
        if self.status == SubscriptionStatus::Cancelled {
            return Err(DomainError::InvalidSubscriptionTransition {
                status: self.status.as_str(),
                action: "renew",
            });
        }
        if months == 0 {
            return Err(DomainError::invalid("months", "must be at least 1"));
        }
        self.period.end_date = self
            .period
            .end_date
            .checked_add_months(Months::new(months))
            .ok_or_else(|| DomainError::invalid("months", "period out of range"))?;
        self.status = SubscriptionStatus::Active;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn expire(&mut self) -> Result<(), DomainError> {
        if self.status != SubscriptionStatus::Active {
            return Err(DomainError::InvalidSubscriptionTransition {
                status: self.status.as_str(),
                action: "expire",
            });
        }
        self.status = SubscriptionStatus::Expired;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), DomainError> {
        if self.status == SubscriptionStatus::Cancelled {
            return Err(DomainError::InvalidSubscriptionTransition {
                status: self.status.as_str(),
                action: "cancel",
            });
        }
        self.status = SubscriptionStatus::Cancelled;
        self.auto_renew = false;
        self.updated_at = Utc::now();
        Ok(())
    }
}

impl Entity for TenantModuleSubscription {
    const NAME: &'static str = "tenant_module_subscription";
    const FIELDS: &'static [&'static str] = &[
        "id",
        "tenant_id",
        "module_code",
        "start_date",
        "end_date",
        "status",
        "auto_renew",
        "created_at",
    ];

    fn id(&self) -> Uuid {
        self.id
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        Some(match name {
            "id" => self.id.into(),
            "tenant_id" => self.tenant_id.into(),
            "module_code" => self.module_code.as_str().into(),
            "start_date" => self.period.start_date.into(),
            "end_date" => self.period.end_date.into(),
            "status" => self.status.as_str().into(),
            "auto_renew" => self.auto_renew.into(),
            "created_at" => self.created_at.into(),
            _ => return None,
        })
    }
}

impl Includes for TenantModuleSubscription {}

impl MasterEntity for TenantModuleSubscription {}

impl PgRecord for TenantModuleSubscription {
    const TABLE: &'static str = "tenant_module_subscriptions";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "tenant_id",
        "module_code",
        "start_date",
        "end_date",
        "status",
        "auto_renew",
        "created_at",
        "updated_at",
    ];

    fn bind_columns(&self, row: &mut Separated<'_, 'static, Postgres, &'static str>) {
        row.push_bind(self.id)
            .push_bind(self.tenant_id)
            .push_bind(self.module_code.clone())
            .push_bind(self.period.start_date)
            .push_bind(self.period.end_date)
            .push_bind(self.status.as_str())
            .push_bind(self.auto_renew)
            .push_bind(self.created_at)
            .push_bind(self.updated_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn subscription(days: i64, auto_renew: bool) -> TenantModuleSubscription {
        let start = Utc::now() - Duration::days(30);
        let period = SubscriptionPeriod::new(start, start + Duration::days(days)).unwrap();
        TenantModuleSubscription::new(Uuid::new_v4(), "crm", period, auto_renew).unwrap()
    }

    #[test]
    fn test_period_must_be_ordered() {
        let now = Utc::now();
        assert!(SubscriptionPeriod::new(now, now).is_err());
        assert!(SubscriptionPeriod::new(now, now - Duration::days(1)).is_err());
    }

    #[test]
    fn test_usability_tracks_end_date() {
        let now = Utc::now();
        assert!(subscription(60, false).is_usable(now));
        assert!(!subscription(10, false).is_usable(now));
        assert_eq!(subscription(60, false).module_code(), "CRM");
    }

    #[test]
    fn test_renew_extends_from_end_date() {
        let mut sub = subscription(10, true);
        let old_end = sub.period().end_date;
        sub.expire().unwrap();
        sub.renew(1).unwrap();

        assert_eq!(sub.status(), SubscriptionStatus::Active);
        assert_eq!(sub.period().end_date, old_end.checked_add_months(Months::new(1)).unwrap());
    }

    #[test]
    fn test_cancel_is_final() {
        let mut sub = subscription(60, true);
        sub.cancel().unwrap();
        assert!(!sub.auto_renew());
        assert!(sub.renew(1).is_err());
        assert!(sub.expire().is_err());
        assert!(sub.cancel().is_err());
    }

    #[test]
    fn test_status_round_trip_from_text() {
        for status in [
            SubscriptionStatus::Active,
            SubscriptionStatus::Suspended,
            SubscriptionStatus::Cancelled,
            SubscriptionStatus::Expired,
        ] {
            assert_eq!(
                SubscriptionStatus::try_from(status.as_str().to_string()).unwrap(),
                status
            );
        }
        assert!(SubscriptionStatus::try_from("paused".to_string()).is_err());
    }
}
