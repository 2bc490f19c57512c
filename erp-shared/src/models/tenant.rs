//! Tenant aggregate
//!
//! A tenant is one customer organization of the platform. It lives in the
//! master database together with its module subscriptions and users; its
//! business data lives in a separate database described by [`DatabaseInfo`].
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE tenants (
//!     id UUID PRIMARY KEY,
//!     code VARCHAR(50) NOT NULL UNIQUE,
//!     name VARCHAR(200) NOT NULL,
//!     domain VARCHAR(255) UNIQUE,
//!     contact_email VARCHAR(255),
//!     status TEXT NOT NULL,
//!     settings JSONB NOT NULL,
//!     db_name TEXT, db_server TEXT, db_port INTEGER,
//!     db_username TEXT, db_password TEXT,
//!     db_created_at TIMESTAMPTZ,
//!     db_last_maintenance_at TIMESTAMPTZ,
//!     db_last_backup_at TIMESTAMPTZ,
//!     activated_at TIMESTAMPTZ,
//!     status_reason TEXT,
//!     status_changed_by TEXT,
//!     status_changed_at TIMESTAMPTZ,
//!     created_at TIMESTAMPTZ NOT NULL,
//!     updated_at TIMESTAMPTZ NOT NULL
//! );
//! ```
//!
//! # Lifecycle
//!
//! ```text
//! Pending --activate--> Active --deactivate--> Inactive
//!                       Active --suspend-----> Suspended
//! Inactive | Suspended --activate--> Active
//! any non-terminated --terminate--> Terminated
//! ```

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::query_builder::Separated;
use sqlx::types::Json;
use sqlx::{FromRow, Postgres, Row};
use uuid::Uuid;

use super::database_info::DatabaseInfo;
use super::error::{optional, required, DomainError};
use super::settings::TenantSettings;
use super::subscription::{SubscriptionPeriod, TenantModuleSubscription};
use super::tenant_user::TenantUser;
use crate::data::postgres::PgRecord;
use crate::data::{attach_children, ChildLoader, DataError, Entity, Includes, MasterEntity};
use crate::specification::FieldValue;

/// Maximum length of a tenant name
pub const MAX_NAME_LENGTH: usize = 200;

/// Tenant lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Pending,
    Active,
    Inactive,
    Suspended,
    Terminated,
}

impl TenantStatus {
    /// Converts status to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantStatus::Pending => "pending",
            TenantStatus::Active => "active",
            TenantStatus::Inactive => "inactive",
            TenantStatus::Suspended => "suspended",
            TenantStatus::Terminated => "terminated",
        }
    }
}

impl fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TenantStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(TenantStatus::Pending),
            "active" => Ok(TenantStatus::Active),
            "inactive" => Ok(TenantStatus::Inactive),
            "suspended" => Ok(TenantStatus::Suspended),
            "terminated" => Ok(TenantStatus::Terminated),
            other => Err(DomainError::invalid("status", format!("unknown status '{other}'"))),
        }
    }
}

/// Input for registering a tenant
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTenant {
    pub code: String,
    pub name: String,
    pub domain: Option<String>,
    pub contact_email: Option<String>,
    pub settings: Option<TenantSettings>,
}

/// Tenant aggregate root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    id: Uuid,
    code: String,
    name: String,
    domain: Option<String>,
    contact_email: Option<String>,
    status: TenantStatus,
    settings: TenantSettings,
    database_info: Option<DatabaseInfo>,
    activated_at: Option<DateTime<Utc>>,
    status_reason: Option<String>,
    status_changed_by: Option<String>,
    status_changed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,

    /// Loaded only when the `module_subscriptions` include is requested
    #[serde(skip)]
    module_subscriptions: Vec<TenantModuleSubscription>,

    /// Loaded only when the `users` include is requested
    #[serde(skip)]
    users: Vec<TenantUser>,
}

impl Tenant {
    /// Registers a new tenant in `Pending` status
    ///
    /// # Errors
    ///
    /// Returns a validation error when the name is blank or too long, the
    /// code is malformed, or the contact email is not an address.
    pub fn register(input: CreateTenant) -> Result<Self, DomainError> {
        let now = Utc::now();
        let contact_email = optional(input.contact_email.as_deref());
        if let Some(email) = &contact_email {
            if !validator::ValidateEmail::validate_email(email) {
                return Err(DomainError::invalid("contact_email", "not an email address"));
            }
        }

        Ok(Self {
            id: Uuid::new_v4(),
            code: normalize_code(&input.code)?,
            name: validate_name(&input.name)?,
            domain: optional(input.domain.as_deref()).map(|d| d.to_ascii_lowercase()),
            contact_email,
            status: TenantStatus::Pending,
            settings: input.settings.unwrap_or_default(),
            database_info: None,
            activated_at: None,
            status_reason: None,
            status_changed_by: None,
            status_changed_at: None,
            created_at: now,
            updated_at: now,
            module_subscriptions: Vec::new(),
            users: Vec::new(),
        })
    }

    /// Shorthand for [`Tenant::register`] with only a code and a name
    pub fn new(code: &str, name: &str) -> Result<Self, DomainError> {
        Self::register(CreateTenant {
            code: code.to_string(),
            name: name.to_string(),
            ..Default::default()
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn contact_email(&self) -> Option<&str> {
        self.contact_email.as_deref()
    }

    pub fn status(&self) -> TenantStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == TenantStatus::Active
    }

    pub fn settings(&self) -> &TenantSettings {
        &self.settings
    }

    pub fn database_info(&self) -> Option<&DatabaseInfo> {
        self.database_info.as_ref()
    }

    pub fn activated_at(&self) -> Option<DateTime<Utc>> {
        self.activated_at
    }

    pub fn status_reason(&self) -> Option<&str> {
        self.status_reason.as_deref()
    }

    pub fn status_changed_by(&self) -> Option<&str> {
        self.status_changed_by.as_deref()
    }

    pub fn status_changed_at(&self) -> Option<DateTime<Utc>> {
        self.status_changed_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn module_subscriptions(&self) -> &[TenantModuleSubscription] {
        &self.module_subscriptions
    }

    pub fn users(&self) -> &[TenantUser] {
        &self.users
    }

    /// Moves the tenant to `Active`
    ///
    /// Allowed from `Pending`, `Inactive` and `Suspended`, and only once a
    /// database has been assigned.
    pub fn activate(&mut self, actor: &str) -> Result<(), DomainError> {
        let actor = required("actor", actor)?;
        match self.status {
            TenantStatus::Pending | TenantStatus::Inactive | TenantStatus::Suspended => {}
            _ => return Err(self.transition_error("activate")),
        }
        if self.database_info.is_none() {
            return Err(DomainError::DatabaseInfoRequired {
                code: self.code.clone(),
            });
        }

        let now = Utc::now();
        self.status = TenantStatus::Active;
        self.activated_at = Some(now);
        self.record_status_change(None, actor, now);
        Ok(())
    }

    /// Moves an active tenant to `Inactive`
    pub fn deactivate(&mut self, reason: &str, actor: &str) -> Result<(), DomainError> {
        self.leave_active(TenantStatus::Inactive, "deactivate", reason, actor)
    }

    /// Moves an active tenant to `Suspended`
    pub fn suspend(&mut self, reason: &str, actor: &str) -> Result<(), DomainError> {
        self.leave_active(TenantStatus::Suspended, "suspend", reason, actor)
    }

    /// Terminates the tenant; terminal
    pub fn terminate(&mut self, reason: &str, actor: &str) -> Result<(), DomainError> {
        let reason = required("reason", reason)?;
        let actor = required("actor", actor)?;
        if self.status == TenantStatus::Terminated {
            return Err(self.transition_error("terminate"));
        }
        self.status = TenantStatus::Terminated;
        self.record_status_change(Some(reason), actor, Utc::now());
        Ok(())
    }

    fn leave_active(
        &mut self,
        target: TenantStatus,
        action: &'static str,
        reason: &str,
        actor: &str,
    ) -> Result<(), DomainError> {
        let reason = required("reason", reason)?;
        let actor = required("actor", actor)?;
        if self.status != TenantStatus::Active {
            return Err(self.transition_error(action));
        }
        self.status = target;
        self.record_status_change(Some(reason), actor, Utc::now());
        Ok(())
    }

    fn record_status_change(&mut self, reason: Option<String>, actor: String, at: DateTime<Utc>) {
        self.status_reason = reason;
        self.status_changed_by = Some(actor);
        self.status_changed_at = Some(at);
        self.updated_at = at;
    }

    fn transition_error(&self, action: &'static str) -> DomainError {
        DomainError::InvalidStatusTransition {
            code: self.code.clone(),
            status: self.status,
            action,
        }
    }

    /// Assigns or replaces the tenant's database
    pub fn set_database_info(&mut self, info: DatabaseInfo) -> Result<(), DomainError> {
        if self.status == TenantStatus::Terminated {
            return Err(self.transition_error("change the database of"));
        }
        self.database_info = Some(info);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn record_database_maintenance(&mut self, at: DateTime<Utc>) -> Result<(), DomainError> {
        let info = self.require_database_info()?.with_maintenance(at);
        self.database_info = Some(info);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn record_database_backup(&mut self, at: DateTime<Utc>) -> Result<(), DomainError> {
        let info = self.require_database_info()?.with_backup(at);
        self.database_info = Some(info);
        self.updated_at = Utc::now();
        Ok(())
    }

    fn require_database_info(&self) -> Result<&DatabaseInfo, DomainError> {
        self.database_info
            .as_ref()
            .ok_or_else(|| DomainError::DatabaseInfoRequired {
                code: self.code.clone(),
            })
    }

    pub fn update_settings(&mut self, settings: TenantSettings) {
        self.settings = settings;
        self.updated_at = Utc::now();
    }

    pub fn rename(&mut self, name: &str) -> Result<(), DomainError> {
        self.name = validate_name(name)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Starts a subscription to a module for `months` months from `now`
    ///
    /// The subscription is added to the loaded `module_subscriptions` and
    /// returned so the caller can persist it.
    ///
    /// # Errors
    ///
    /// Fails for terminated tenants and when a usable subscription to the
    /// same module is already loaded.
    pub fn subscribe(
        &mut self,
        module_code: &str,
        months: u32,
        auto_renew: bool,
        now: DateTime<Utc>,
    ) -> Result<TenantModuleSubscription, DomainError> {
        if self.status == TenantStatus::Terminated {
            return Err(self.transition_error("subscribe"));
        }
        if months == 0 {
            return Err(DomainError::invalid("months", "must be at least 1"));
        }
        let module_code = required("module_code", module_code)?.to_ascii_uppercase();
        if self
            .module_subscriptions
            .iter()
            .any(|s| s.module_code() == module_code && s.is_usable(now))
        {
            return Err(DomainError::AlreadySubscribed {
                tenant: self.code.clone(),
                module: module_code,
            });
        }

        let end = now
            .checked_add_months(Months::new(months))
            .ok_or_else(|| DomainError::invalid("months", "period out of range"))?;
        let subscription = TenantModuleSubscription::new(
            self.id,
            &module_code,
            SubscriptionPeriod::new(now, end)?,
            auto_renew,
        )?;
        self.module_subscriptions.push(subscription.clone());
        Ok(subscription)
    }

    /// The most recent subscription to a module among the loaded ones
    pub fn subscription_for(&self, module_code: &str) -> Option<&TenantModuleSubscription> {
        self.module_subscriptions
            .iter()
            .filter(|s| s.module_code().eq_ignore_ascii_case(module_code))
            .max_by_key(|s| s.period().end_date)
    }

    /// Whether the tenant may use a module right now
    pub fn has_active_module(&self, module_code: &str, now: DateTime<Utc>) -> bool {
        self.subscription_for(module_code)
            .is_some_and(|s| s.is_usable(now))
    }

    /// Returns the usable subscription to a module
    ///
    /// # Errors
    ///
    /// [`DomainError::ModuleNotSubscribed`] when there is none, or
    /// [`DomainError::SubscriptionExpired`] when the latest one is no longer
    /// usable.
    pub fn require_module(
        &self,
        module_code: &str,
        now: DateTime<Utc>,
    ) -> Result<&TenantModuleSubscription, DomainError> {
        match self.subscription_for(module_code) {
            Some(s) if s.is_usable(now) => Ok(s),
            Some(s) => Err(DomainError::SubscriptionExpired {
                tenant: self.code.clone(),
                module: s.module_code().to_string(),
                expired_at: s.period().end_date,
            }),
            None => Err(DomainError::ModuleNotSubscribed {
                tenant: self.code.clone(),
                module: module_code.to_ascii_uppercase(),
            }),
        }
    }
}

/// Upper-cases and validates a tenant code
pub fn normalize_code(code: &str) -> Result<String, DomainError> {
    let code = required("code", code)?.to_ascii_uppercase();
    if !(2..=50).contains(&code.len()) {
        return Err(DomainError::invalid("code", "must be 2 to 50 characters"));
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(DomainError::invalid(
            "code",
            "only letters, digits, '-' and '_' are allowed",
        ));
    }
    Ok(code)
}

fn validate_name(name: &str) -> Result<String, DomainError> {
    let name = required("name", name)?;
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(DomainError::invalid("name", "must be at most 200 characters"));
    }
    Ok(name)
}

impl Entity for Tenant {
    const NAME: &'static str = "tenant";
    const FIELDS: &'static [&'static str] = &[
        "id",
        "code",
        "name",
        "domain",
        "contact_email",
        "status",
        "activated_at",
        "created_at",
        "updated_at",
    ];
    const RELATIONS: &'static [&'static str] = &["module_subscriptions", "users"];

    fn id(&self) -> Uuid {
        self.id
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        Some(match name {
            "id" => self.id.into(),
            "code" => self.code.as_str().into(),
            "name" => self.name.as_str().into(),
            "domain" => self.domain.as_deref().into(),
            "contact_email" => self.contact_email.as_deref().into(),
            "status" => self.status.as_str().into(),
            "activated_at" => self.activated_at.into(),
            "created_at" => self.created_at.into(),
            "updated_at" => self.updated_at.into(),
            _ => return None,
        })
    }
}

#[async_trait]
impl Includes for Tenant {
    async fn load_includes<L: ChildLoader>(
        items: &mut [Self],
        includes: &[&'static str],
        loader: &L,
    ) -> Result<(), DataError> {
        let ids: Vec<Uuid> = items.iter().map(|t| t.id).collect();
        for include in includes {
            match *include {
                "module_subscriptions" => {
                    let children = loader
                        .load_children::<TenantModuleSubscription>("tenant_id", ids.clone())
                        .await?;
                    attach_children(items, children, |s| s.tenant_id(), |t, s| {
                        t.module_subscriptions = s
                    });
                }
                "users" => {
                    let children = loader
                        .load_children::<TenantUser>("tenant_id", ids.clone())
                        .await?;
                    attach_children(items, children, |u| u.tenant_id, |t, u| t.users = u);
                }
                other => return Err(DataError::unknown_include::<Self>(other)),
            }
        }
        Ok(())
    }
}

impl MasterEntity for Tenant {}

impl PgRecord for Tenant {
    const TABLE: &'static str = "tenants";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "code",
        "name",
        "domain",
        "contact_email",
        "status",
        "settings",
        "db_name",
        "db_server",
        "db_port",
        "db_username",
        "db_password",
        "db_created_at",
        "db_last_maintenance_at",
        "db_last_backup_at",
        "activated_at",
        "status_reason",
        "status_changed_by",
        "status_changed_at",
        "created_at",
        "updated_at",
    ];

    fn bind_columns(&self, row: &mut Separated<'_, 'static, Postgres, &'static str>) {
        let db = self.database_info.as_ref();
        row.push_bind(self.id)
            .push_bind(self.code.clone())
            .push_bind(self.name.clone())
            .push_bind(self.domain.clone())
            .push_bind(self.contact_email.clone())
            .push_bind(self.status.as_str())
            .push_bind(Json(self.settings.clone()))
            .push_bind(db.map(|d| d.database_name().to_string()))
            .push_bind(db.map(|d| d.server().to_string()))
            .push_bind(db.map(|d| i32::from(d.port())))
            .push_bind(db.map(|d| d.username().to_string()))
            .push_bind(db.map(|d| d.password().to_string()))
            .push_bind(db.map(|d| d.created_at()))
            .push_bind(db.and_then(|d| d.last_maintenance_at()))
            .push_bind(db.and_then(|d| d.last_backup_at()))
            .push_bind(self.activated_at)
            .push_bind(self.status_reason.clone())
            .push_bind(self.status_changed_by.clone())
            .push_bind(self.status_changed_at)
            .push_bind(self.created_at)
            .push_bind(self.updated_at);
    }
}

impl<'r> FromRow<'r, PgRow> for Tenant {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        let status = status
            .parse::<TenantStatus>()
            .map_err(|e| decode_error("status", e))?;
        let Json(settings) = row.try_get::<Json<TenantSettings>, _>("settings")?;

        let database_info = match row.try_get::<Option<String>, _>("db_name")? {
            Some(database_name) => {
                let port: i32 = row.try_get::<Option<i32>, _>("db_port")?.unwrap_or(5432);
                let port = u16::try_from(port).map_err(|e| decode_error("db_port", e))?;
                Some(DatabaseInfo::from_parts(
                    database_name,
                    row.try_get::<Option<String>, _>("db_server")?.unwrap_or_default(),
                    port,
                    row.try_get::<Option<String>, _>("db_username")?.unwrap_or_default(),
                    row.try_get::<Option<String>, _>("db_password")?.unwrap_or_default(),
                    row.try_get::<Option<DateTime<Utc>>, _>("db_created_at")?
                        .unwrap_or_else(Utc::now),
                    row.try_get("db_last_maintenance_at")?,
                    row.try_get("db_last_backup_at")?,
                ))
            }
            None => None,
        };

        Ok(Self {
            id: row.try_get("id")?,
            code: row.try_get("code")?,
            name: row.try_get("name")?,
            domain: row.try_get("domain")?,
            contact_email: row.try_get("contact_email")?,
            status,
            settings,
            database_info,
            activated_at: row.try_get("activated_at")?,
            status_reason: row.try_get("status_reason")?,
            status_changed_by: row.try_get("status_changed_by")?,
            status_changed_at: row.try_get("status_changed_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            module_subscriptions: Vec::new(),
            users: Vec::new(),
        })
    }
}

fn decode_error(
    column: &str,
    source: impl std::error::Error + Send + Sync + 'static,
) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn database() -> DatabaseInfo {
        DatabaseInfo::new("erp_test001", "localhost", 5432, "erp", "erp").unwrap()
    }

    #[test]
    fn test_register_normalizes_input() {
        let tenant = Tenant::register(CreateTenant {
            code: " test-001 ".into(),
            name: "  Test Company ".into(),
            domain: Some("ERP.Example.com".into()),
            contact_email: Some("  ".into()),
            settings: None,
        })
        .unwrap();

        assert_eq!(tenant.code(), "TEST-001");
        assert_eq!(tenant.name(), "Test Company");
        assert_eq!(tenant.domain(), Some("erp.example.com"));
        assert_eq!(tenant.contact_email(), None);
        assert_eq!(tenant.status(), TenantStatus::Pending);
        assert_eq!(tenant.settings(), &TenantSettings::default());
    }

    #[test]
    fn test_blank_name_is_rejected() {
        for name in ["", "   ", "\t\n"] {
            let err = Tenant::new("TEST001", name).unwrap_err();
            assert_eq!(err, DomainError::Required { field: "name" });
            assert!(err.to_string().contains("name"));
        }
    }

    #[test]
    fn test_code_rules() {
        assert!(Tenant::new("A", "x").is_err());
        assert!(Tenant::new("HAS SPACE", "x").is_err());
        assert!(Tenant::new(&"X".repeat(51), "x").is_err());
        assert!(Tenant::new("ok_code-1", "x").is_ok());
    }

    #[test]
    fn test_invalid_email_is_rejected() {
        let result = Tenant::register(CreateTenant {
            code: "ACME".into(),
            name: "Acme".into(),
            contact_email: Some("not-an-email".into()),
            ..Default::default()
        });
        assert!(matches!(
            result,
            Err(DomainError::Invalid { field: "contact_email", .. })
        ));
    }

    #[test]
    fn test_activation_requires_database_info() {
        let mut tenant = Tenant::new("TEST001", "Test Company").unwrap();

        let err = tenant.activate("admin").unwrap_err();
        assert!(matches!(err, DomainError::DatabaseInfoRequired { .. }));
        assert_eq!(tenant.status(), TenantStatus::Pending);

        tenant.set_database_info(database()).unwrap();
        tenant.activate("admin").unwrap();
        assert_eq!(tenant.status(), TenantStatus::Active);
        assert!(tenant.is_active());
        assert!(tenant.activated_at().is_some());
        assert_eq!(tenant.status_changed_by(), Some("admin"));
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut tenant = Tenant::new("TEST001", "Test Company").unwrap();
        tenant.set_database_info(database()).unwrap();

        assert!(tenant.suspend("late payment", "billing").is_err());
        tenant.activate("admin").unwrap();
        assert!(tenant.activate("admin").is_err());

        tenant.suspend("late payment", "billing").unwrap();
        assert_eq!(tenant.status(), TenantStatus::Suspended);
        assert_eq!(tenant.status_reason(), Some("late payment"));
        assert!(tenant.deactivate("closing", "admin").is_err());

        tenant.activate("admin").unwrap();
        assert_eq!(tenant.status_reason(), None);
        tenant.deactivate("closing", "admin").unwrap();
        assert_eq!(tenant.status(), TenantStatus::Inactive);

        tenant.terminate("contract ended", "admin").unwrap();
        assert_eq!(tenant.status(), TenantStatus::Terminated);
        assert!(tenant.activate("admin").is_err());
        assert!(tenant.terminate("again", "admin").is_err());
        assert!(tenant.set_database_info(database()).is_err());
    }

    #[test]
    fn test_status_changes_require_reason_and_actor() {
        let mut tenant = Tenant::new("TEST001", "Test Company").unwrap();
        tenant.set_database_info(database()).unwrap();
        tenant.activate("admin").unwrap();

        assert_eq!(
            tenant.deactivate("  ", "admin"),
            Err(DomainError::Required { field: "reason" })
        );
        assert_eq!(
            tenant.suspend("why", ""),
            Err(DomainError::Required { field: "actor" })
        );
        assert!(tenant.is_active());
    }

    #[test]
    fn test_maintenance_requires_database_info() {
        let mut tenant = Tenant::new("TEST001", "Test Company").unwrap();
        assert!(tenant.record_database_maintenance(Utc::now()).is_err());
        assert!(tenant.record_database_backup(Utc::now()).is_err());

        tenant.set_database_info(database()).unwrap();
        let at = Utc::now();
        tenant.record_database_backup(at).unwrap();
        assert_eq!(tenant.database_info().unwrap().last_backup_at(), Some(at));
    }

    #[test]
    fn test_module_gate() {
        let now = Utc::now();
        let mut tenant = Tenant::new("TEST001", "Test Company").unwrap();

        assert!(matches!(
            tenant.require_module("CRM", now),
            Err(DomainError::ModuleNotSubscribed { .. })
        ));

        tenant.subscribe("crm", 1, false, now).unwrap();
        assert!(tenant.has_active_module("CRM", now));
        assert!(matches!(
            tenant.subscribe("CRM", 1, false, now),
            Err(DomainError::AlreadySubscribed { .. })
        ));

        let later = now + Duration::days(40);
        assert!(matches!(
            tenant.require_module("CRM", later),
            Err(DomainError::SubscriptionExpired { .. })
        ));
    }

    #[test]
    fn test_rename() {
        let mut tenant = Tenant::new("TEST001", "Test Company").unwrap();
        tenant.rename("Renamed").unwrap();
        assert_eq!(tenant.name(), "Renamed");
        assert!(tenant.rename(" ").is_err());
        assert!(tenant.rename(&"n".repeat(201)).is_err());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("Active".parse::<TenantStatus>().unwrap(), TenantStatus::Active);
        assert!("gone".parse::<TenantStatus>().is_err());
    }
}
