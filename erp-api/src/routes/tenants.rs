//! Tenant registry management endpoints
//!
//! # Endpoints
//!
//! - `GET /api/modules` - Active module catalog
//! - `GET /api/tenants` - Paged tenant list, filterable by status and search text
//! - `POST /api/tenants/register` - Register a tenant (starts `pending`)
//! - `GET /api/tenants/:code` - Tenant with subscriptions and users
//! - `POST /api/tenants/:code/database` - Set database info, optionally provision
//! - `POST /api/tenants/:code/{activate,deactivate,suspend,terminate}`
//! - `POST /api/tenants/:code/subscriptions` - Subscribe a module
//! - `POST /api/tenants/:code/users` - Add a user membership
//!
//! Every mutation evicts the tenant from the resolver cache so tenant-scoped
//! requests see the new state immediately.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use erp_shared::auth::middleware::AuthContext;
use erp_shared::data::DataBackend;
use erp_shared::models::{
    CreateTenant, DatabaseInfo, Module, Tenant, TenantModuleSubscription, TenantSettings,
    TenantStatus, TenantUser,
};
use erp_shared::specification::Page;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{app::AppState, error::ApiResult};

const DEFAULT_SUBSCRIPTION_MONTHS: u32 = 12;

/// Register tenant request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterTenantRequest {
    /// 2-20 letters, digits, `-` or `_`; stored upper-case
    #[validate(length(min = 2, max = 50, message = "Code must be 2-50 characters"))]
    pub code: String,

    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,

    pub domain: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub contact_email: Option<String>,

    pub settings: Option<TenantSettings>,
}

/// Set database info request
#[derive(Debug, Deserialize, Validate)]
pub struct SetDatabaseRequest {
    #[validate(length(min = 1, max = 63, message = "Database name must be 1-63 characters"))]
    pub database_name: String,
    pub server: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: String,

    /// Create and migrate the database after saving
    #[serde(default)]
    pub provision: bool,
}

fn default_port() -> u16 {
    5432
}

/// Activation request; the body is optional
#[derive(Debug, Default, Deserialize)]
pub struct ActivateRequest {
    pub actor: Option<String>,
}

/// Deactivate, suspend or terminate request
#[derive(Debug, Deserialize, Validate)]
pub struct StatusChangeRequest {
    #[validate(length(min = 1, max = 500, message = "Reason must be 1-500 characters"))]
    pub reason: String,
    pub actor: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubscribeRequest {
    #[validate(length(min = 1, max = 50))]
    pub module_code: String,

    #[validate(range(min = 1, max = 120, message = "Months must be 1-120"))]
    #[serde(default = "default_months")]
    pub months: u32,

    #[serde(default)]
    pub auto_renew: bool,
}

fn default_months() -> u32 {
    DEFAULT_SUBSCRIPTION_MONTHS
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddUserRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, max = 200))]
    pub display_name: String,

    #[serde(default)]
    pub is_tenant_admin: bool,
}

/// Tenant list filters
#[derive(Debug, Default, Deserialize)]
pub struct ListTenantsQuery {
    pub status: Option<String>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Database info without credentials
#[derive(Debug, Serialize)]
pub struct DatabaseSummary {
    pub database_name: String,
    pub server: String,
    pub port: u16,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub last_maintenance_at: Option<DateTime<Utc>>,
    pub last_backup_at: Option<DateTime<Utc>>,
}

impl From<&DatabaseInfo> for DatabaseSummary {
    fn from(info: &DatabaseInfo) -> Self {
        Self {
            database_name: info.database_name().to_string(),
            server: info.server().to_string(),
            port: info.port(),
            username: info.username().to_string(),
            created_at: info.created_at(),
            last_maintenance_at: info.last_maintenance_at(),
            last_backup_at: info.last_backup_at(),
        }
    }
}

/// Tenant as returned by the API
#[derive(Debug, Serialize)]
pub struct TenantResponse {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub domain: Option<String>,
    pub contact_email: Option<String>,
    pub status: TenantStatus,
    pub settings: TenantSettings,
    pub database: Option<DatabaseSummary>,
    pub activated_at: Option<DateTime<Utc>>,
    pub status_reason: Option<String>,
    pub status_changed_by: Option<String>,
    pub status_changed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Tenant> for TenantResponse {
    fn from(tenant: &Tenant) -> Self {
        Self {
            id: tenant.id(),
            code: tenant.code().to_string(),
            name: tenant.name().to_string(),
            domain: tenant.domain().map(str::to_string),
            contact_email: tenant.contact_email().map(str::to_string),
            status: tenant.status(),
            settings: tenant.settings().clone(),
            database: tenant.database_info().map(DatabaseSummary::from),
            activated_at: tenant.activated_at(),
            status_reason: tenant.status_reason().map(str::to_string),
            status_changed_by: tenant.status_changed_by().map(str::to_string),
            status_changed_at: tenant.status_changed_at(),
            created_at: tenant.created_at(),
            updated_at: tenant.updated_at(),
        }
    }
}

/// Tenant with its subscriptions and users
#[derive(Debug, Serialize)]
pub struct TenantDetailResponse {
    #[serde(flatten)]
    pub tenant: TenantResponse,
    pub subscriptions: Vec<TenantModuleSubscription>,
    pub users: Vec<TenantUser>,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    pub tenant: TenantResponse,
    pub subscription: TenantModuleSubscription,
}

/// Active module catalog
pub async fn list_modules<B: DataBackend>(
    State(state): State<AppState<B>>,
) -> ApiResult<Json<Vec<Module>>> {
    Ok(Json(state.tenants.list_modules().await?))
}

/// Paged tenant list
///
/// ```text
/// GET /api/tenants?status=active&search=acme&page=1&page_size=20
/// ```
pub async fn list_tenants<B: DataBackend>(
    State(state): State<AppState<B>>,
    Query(query): Query<ListTenantsQuery>,
) -> ApiResult<Json<Page<TenantResponse>>> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<TenantStatus>)
        .transpose()?;
    let page = state.page_request(query.page, query.page_size);

    let tenants = state
        .tenants
        .list(status, query.search.as_deref(), page)
        .await?;
    Ok(Json(tenants.map(|t| TenantResponse::from(&t))))
}

/// Registers a tenant in the `pending` state
///
/// ```text
/// POST /api/tenants/register
/// Content-Type: application/json
///
/// { "code": "ACME", "name": "Acme Corp", "contact_email": "ops@acme.test" }
/// ```
pub async fn register_tenant<B: DataBackend>(
    State(state): State<AppState<B>>,
    Json(req): Json<RegisterTenantRequest>,
) -> ApiResult<(StatusCode, Json<TenantResponse>)> {
    req.validate()?;

    let tenant = state
        .tenants
        .register(CreateTenant {
            code: req.code,
            name: req.name,
            domain: req.domain,
            contact_email: req.contact_email,
            settings: req.settings,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(TenantResponse::from(&tenant))))
}

/// Tenant with subscriptions and users
pub async fn get_tenant<B: DataBackend>(
    State(state): State<AppState<B>>,
    Path(code): Path<String>,
) -> ApiResult<Json<TenantDetailResponse>> {
    let tenant = state.tenants.get(&code).await?;
    Ok(Json(TenantDetailResponse {
        tenant: TenantResponse::from(&tenant),
        subscriptions: tenant.module_subscriptions().to_vec(),
        users: tenant.users().to_vec(),
    }))
}

/// Stores where the tenant's business database lives
pub async fn set_database<B: DataBackend>(
    State(state): State<AppState<B>>,
    Path(code): Path<String>,
    Json(req): Json<SetDatabaseRequest>,
) -> ApiResult<Json<TenantResponse>> {
    req.validate()?;
    let info = DatabaseInfo::new(
        &req.database_name,
        &req.server,
        req.port,
        &req.username,
        &req.password,
    )?;

    let tenant = state
        .tenants
        .set_database_info(&code, info, req.provision)
        .await?;
    state.resolver.invalidate(&tenant).await;
    Ok(Json(TenantResponse::from(&tenant)))
}

pub async fn activate_tenant<B: DataBackend>(
    State(state): State<AppState<B>>,
    Path(code): Path<String>,
    auth: Option<Extension<AuthContext>>,
    body: Option<Json<ActivateRequest>>,
) -> ApiResult<Json<TenantResponse>> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let actor = actor(req.actor, auth.as_deref());

    let tenant = state.tenants.activate(&code, &actor).await?;
    state.resolver.invalidate(&tenant).await;
    Ok(Json(TenantResponse::from(&tenant)))
}

pub async fn deactivate_tenant<B: DataBackend>(
    state: State<AppState<B>>,
    code: Path<String>,
    auth: Option<Extension<AuthContext>>,
    req: Json<StatusChangeRequest>,
) -> ApiResult<Json<TenantResponse>> {
    change_status(state, code, auth, req, StatusChange::Deactivate).await
}

pub async fn suspend_tenant<B: DataBackend>(
    state: State<AppState<B>>,
    code: Path<String>,
    auth: Option<Extension<AuthContext>>,
    req: Json<StatusChangeRequest>,
) -> ApiResult<Json<TenantResponse>> {
    change_status(state, code, auth, req, StatusChange::Suspend).await
}

/// Terminal; the tenant can never be reactivated
pub async fn terminate_tenant<B: DataBackend>(
    state: State<AppState<B>>,
    code: Path<String>,
    auth: Option<Extension<AuthContext>>,
    req: Json<StatusChangeRequest>,
) -> ApiResult<Json<TenantResponse>> {
    change_status(state, code, auth, req, StatusChange::Terminate).await
}

enum StatusChange {
    Deactivate,
    Suspend,
    Terminate,
}

async fn change_status<B: DataBackend>(
    State(state): State<AppState<B>>,
    Path(code): Path<String>,
    auth: Option<Extension<AuthContext>>,
    Json(req): Json<StatusChangeRequest>,
    change: StatusChange,
) -> ApiResult<Json<TenantResponse>> {
    req.validate()?;
    let actor = actor(req.actor, auth.as_deref());

    let tenant = match change {
        StatusChange::Deactivate => state.tenants.deactivate(&code, &req.reason, &actor).await?,
        StatusChange::Suspend => state.tenants.suspend(&code, &req.reason, &actor).await?,
        StatusChange::Terminate => state.tenants.terminate(&code, &req.reason, &actor).await?,
    };
    state.resolver.invalidate(&tenant).await;
    Ok(Json(TenantResponse::from(&tenant)))
}

/// Subscribes the tenant to a module for a number of months from now
pub async fn subscribe_module<B: DataBackend>(
    State(state): State<AppState<B>>,
    Path(code): Path<String>,
    Json(req): Json<SubscribeRequest>,
) -> ApiResult<(StatusCode, Json<SubscriptionResponse>)> {
    req.validate()?;

    let (tenant, subscription) = state
        .tenants
        .subscribe(&code, &req.module_code, req.months, req.auto_renew, Utc::now())
        .await?;
    state.resolver.invalidate(&tenant).await;

    Ok((
        StatusCode::CREATED,
        Json(SubscriptionResponse {
            tenant: TenantResponse::from(&tenant),
            subscription,
        }),
    ))
}

/// Adds a user to the tenant; an existing membership is returned as is
pub async fn add_user<B: DataBackend>(
    State(state): State<AppState<B>>,
    Path(code): Path<String>,
    Json(req): Json<AddUserRequest>,
) -> ApiResult<(StatusCode, Json<TenantUser>)> {
    req.validate()?;

    let user = state
        .tenants
        .add_user(&code, &req.email, &req.display_name, req.is_tenant_admin)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Explicit actor, else the authenticated user, else `api`
fn actor(explicit: Option<String>, auth: Option<&AuthContext>) -> String {
    explicit
        .filter(|a| !a.trim().is_empty())
        .or_else(|| auth.map(|a| a.user_id.to_string()))
        .unwrap_or_else(|| "api".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_precedence() {
        let auth = AuthContext {
            user_id: Uuid::nil(),
            tenant_id: None,
            tenant_code: None,
            is_tenant_admin: false,
        };
        assert_eq!(actor(Some("ops".into()), Some(&auth)), "ops");
        assert_eq!(actor(Some("  ".into()), Some(&auth)), Uuid::nil().to_string());
        assert_eq!(actor(None, None), "api");
    }

    #[test]
    fn test_tenant_response_hides_password() {
        let mut tenant = Tenant::new("ACME", "Acme Corp").unwrap();
        tenant
            .set_database_info(
                DatabaseInfo::new("erp_acme", "localhost", 5432, "erp", "s3cret").unwrap(),
            )
            .unwrap();

        let json = serde_json::to_string(&TenantResponse::from(&tenant)).unwrap();
        assert!(json.contains("erp_acme"));
        assert!(!json.contains("s3cret"));
    }

    #[test]
    fn test_register_request_validation() {
        let req = RegisterTenantRequest {
            code: "A".into(),
            name: String::new(),
            domain: None,
            contact_email: Some("not-an-email".into()),
            settings: None,
        };
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("code"));
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("contact_email"));
    }

    #[test]
    fn test_code_length_matches_domain_rule() {
        let request = |code: String| RegisterTenantRequest {
            code,
            name: "Acme".into(),
            domain: None,
            contact_email: None,
            settings: None,
        };

        let longest = "A".repeat(50);
        assert!(request(longest.clone()).validate().is_ok());
        assert!(erp_shared::models::tenant::normalize_code(&longest).is_ok());

        let too_long = "A".repeat(51);
        assert!(request(too_long.clone()).validate().is_err());
        assert!(erp_shared::models::tenant::normalize_code(&too_long).is_err());
    }
}
