//! Tenant registry operations and cached tenant resolution
//!
//! [`TenantService`] performs registry reads and writes on the master
//! database; each write runs in its own transaction through the execution
//! strategy. [`TenantResolver`] fronts the lookups used per request with a
//! TTL cache.
//!
//! ```text
//! register -> set_database_info -> activate -> subscribe / add_user
//!                                     │
//!                                     ├─> deactivate | suspend
//!                                     └─> terminate (final)
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::data::{
    execute_in_transaction, DataBackend, DataError, ExecutionStrategy, Repository,
};
use crate::models::{
    CreateTenant, DatabaseInfo, DomainError, Module, Tenant, TenantModuleSubscription,
    TenantSettings, TenantStatus, TenantUser,
};
use crate::specification::catalog::{
    active_modules, expired_subscriptions, module_by_code, tenant_by_code, tenant_by_domain,
    tenant_user_by_email, tenants_by_status,
};
use crate::specification::{field, Page, PageRequest, Specification};

/// Outcome of one subscription sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub renewed: u64,
    pub expired: u64,
}

/// Tenant registry operations on the master database
///
/// Lookups are plain repository reads without caching; see
/// [`TenantResolver`] for the cached path used per request. Every mutation
/// runs in its own transaction through [`execute_in_transaction`].
#[derive(Clone)]
pub struct TenantService<B> {
    backend: B,
    strategy: ExecutionStrategy,
}

impl<B: DataBackend> TenantService<B> {
    pub fn new(backend: B, strategy: ExecutionStrategy) -> Self {
        Self { backend, strategy }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub async fn resolve_by_id(&self, id: Uuid) -> Result<Option<Tenant>, DataError> {
        self.find_one(Specification::with_criteria(field("id").eq(id)))
            .await
    }

    pub async fn resolve_by_code(&self, code: &str) -> Result<Option<Tenant>, DataError> {
        self.find_one(tenant_by_code(code)).await
    }

    pub async fn resolve_by_domain(&self, domain: &str) -> Result<Option<Tenant>, DataError> {
        self.find_one(tenant_by_domain(domain)).await
    }

    /// Looks up by id when the identifier is a UUID, by code otherwise
    pub async fn resolve_by_identifier(&self, identifier: &str) -> Result<Option<Tenant>, DataError> {
        match Uuid::parse_str(identifier.trim()) {
            Ok(id) => self.resolve_by_id(id).await,
            Err(_) => self.resolve_by_code(identifier).await,
        }
    }

    async fn find_one(&self, spec: Specification<Tenant>) -> Result<Option<Tenant>, DataError> {
        let spec = spec.include("module_subscriptions").as_no_tracking();
        self.backend.master().tenants().first_or_default(&spec).await
    }

    /// Tenant by code, with subscriptions and users loaded
    ///
    /// # Errors
    ///
    /// [`DomainError::TenantNotFound`] when no tenant has the code.
    pub async fn get(&self, code: &str) -> Result<Tenant, DataError> {
        let spec = tenant_by_code(code)
            .include("module_subscriptions")
            .include("users");
        self.backend
            .master()
            .tenants()
            .first_or_default(&spec)
            .await?
            .ok_or_else(|| DomainError::TenantNotFound(code.to_string()).into())
    }

    /// Paged tenant listing
    pub async fn list(
        &self,
        status: Option<TenantStatus>,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<Tenant>, DataError> {
        let spec = tenants_by_status(status, search).as_no_tracking();
        self.backend.master().tenants().find_paged(&spec, page).await
    }

    pub async fn list_modules(&self) -> Result<Vec<Module>, DataError> {
        self.backend.master().modules().find(&active_modules()).await
    }

    /// Registers a new tenant in the `Pending` state
    ///
    /// # Errors
    ///
    /// Validation errors from [`Tenant::register`], or
    /// [`DomainError::DuplicateTenantCode`] when the code is taken.
    pub async fn register(&self, input: CreateTenant) -> Result<Tenant, DataError> {
        let tenant = Tenant::register(input)?;
        let mut uow = self.backend.master();

        let tenant = execute_in_transaction(&mut uow, &self.strategy, |uow| {
            let tenant = tenant.clone();
            Box::pin(async move {
                let repo = uow.tenants();
                if repo.any(&tenant_by_code(tenant.code())).await? {
                    return Err(DomainError::DuplicateTenantCode(tenant.code().to_string()).into());
                }
                repo.add(&tenant).await?;
                Ok::<_, DataError>(tenant)
            })
        })
        .await?;

        info!(tenant_id = %tenant.id(), tenant_code = %tenant.code(), "Tenant registered");
        Ok(tenant)
    }

    /// Stores the tenant's database description
    ///
    /// Cached connections to the previous database are dropped. With
    /// `provision`, the database is created and migrated afterwards; a
    /// provisioning failure leaves the stored description in place so the
    /// call can be repeated.
    pub async fn set_database_info(
        &self,
        code: &str,
        info: DatabaseInfo,
        provision: bool,
    ) -> Result<Tenant, DataError> {
        let (tenant, ()) = self
            .modify(code, move |t| t.set_database_info(info.clone()))
            .await?;
        self.backend.release_tenant(tenant.id()).await;
        if provision {
            self.backend.provision_tenant(&tenant).await?;
        }
        info!(tenant_code = %tenant.code(), provisioned = provision, "Tenant database configured");
        Ok(tenant)
    }

    pub async fn activate(&self, code: &str, actor: &str) -> Result<Tenant, DataError> {
        let actor = actor.to_string();
        let (tenant, ()) = self.modify(code, move |t| t.activate(&actor)).await?;
        info!(tenant_code = %tenant.code(), "Tenant activated");
        Ok(tenant)
    }

    pub async fn deactivate(&self, code: &str, reason: &str, actor: &str) -> Result<Tenant, DataError> {
        let (reason, actor) = (reason.to_string(), actor.to_string());
        let (tenant, ()) = self
            .modify(code, move |t| t.deactivate(&reason, &actor))
            .await?;
        info!(tenant_code = %tenant.code(), "Tenant deactivated");
        Ok(tenant)
    }

    pub async fn suspend(&self, code: &str, reason: &str, actor: &str) -> Result<Tenant, DataError> {
        let (reason, actor) = (reason.to_string(), actor.to_string());
        let (tenant, ()) = self
            .modify(code, move |t| t.suspend(&reason, &actor))
            .await?;
        info!(tenant_code = %tenant.code(), "Tenant suspended");
        Ok(tenant)
    }

    pub async fn terminate(&self, code: &str, reason: &str, actor: &str) -> Result<Tenant, DataError> {
        let (reason, actor) = (reason.to_string(), actor.to_string());
        let (tenant, ()) = self
            .modify(code, move |t| t.terminate(&reason, &actor))
            .await?;
        self.backend.release_tenant(tenant.id()).await;
        info!(tenant_code = %tenant.code(), "Tenant terminated");
        Ok(tenant)
    }

    pub async fn update_settings(&self, code: &str, settings: TenantSettings) -> Result<Tenant, DataError> {
        let (tenant, ()) = self
            .modify(code, move |t| {
                t.update_settings(settings.clone());
                Ok(())
            })
            .await?;
        Ok(tenant)
    }

    /// Subscribes a tenant to an active module
    ///
    /// # Errors
    ///
    /// [`DataError::NotFound`] for unknown or inactive modules, plus the
    /// rules of [`Tenant::subscribe`].
    pub async fn subscribe(
        &self,
        code: &str,
        module_code: &str,
        months: u32,
        auto_renew: bool,
        now: DateTime<Utc>,
    ) -> Result<(Tenant, TenantModuleSubscription), DataError> {
        let (code, module_code) = (code.to_string(), module_code.to_string());
        let mut uow = self.backend.master();

        let (tenant, subscription) = execute_in_transaction(&mut uow, &self.strategy, |uow| {
            let (code, module_code) = (code.clone(), module_code.clone());
            Box::pin(async move {
                let module = uow
                    .modules()
                    .first_or_default(&module_by_code(&module_code))
                    .await?
                    .filter(|m| m.is_active)
                    .ok_or_else(|| DataError::not_found::<Module>(&module_code))?;

                let mut tenant = uow
                    .tenants()
                    .first_or_default(&tenant_by_code(&code).include("module_subscriptions"))
                    .await?
                    .ok_or_else(|| DomainError::TenantNotFound(code.clone()))?;

                let subscription = tenant.subscribe(&module.code, months, auto_renew, now)?;
                uow.subscriptions().add(&subscription).await?;
                Ok::<_, DataError>((tenant, subscription))
            })
        })
        .await?;

        info!(
            tenant_code = %tenant.code(),
            module = %subscription.module_code(),
            end_date = %subscription.period().end_date,
            "Module subscribed"
        );
        Ok((tenant, subscription))
    }

    /// Adds a user membership to a tenant
    ///
    /// Adding an email that is already a member returns the existing
    /// membership.
    pub async fn add_user(
        &self,
        code: &str,
        email: &str,
        display_name: &str,
        is_tenant_admin: bool,
    ) -> Result<TenantUser, DataError> {
        let tenant = self.get(code).await?;
        let user = TenantUser::new(tenant.id(), email, display_name, is_tenant_admin)?;
        let mut uow = self.backend.master();

        execute_in_transaction(&mut uow, &self.strategy, |uow| {
            let user = user.clone();
            Box::pin(async move {
                let repo = uow.tenant_users();
                let existing = repo
                    .first_or_default(&tenant_user_by_email(user.tenant_id, &user.email))
                    .await?;
                if let Some(existing) = existing {
                    return Ok(existing);
                }
                repo.add(&user).await?;
                Ok::<_, DataError>(user)
            })
        })
        .await
    }

    /// Renews or expires subscriptions whose period has ended
    ///
    /// Auto-renewing subscriptions are extended by `renew_months` until
    /// their period covers `now`; the others are marked expired.
    pub async fn sweep_subscriptions(
        &self,
        now: DateTime<Utc>,
        renew_months: u32,
    ) -> Result<SweepReport, DataError> {
        let mut uow = self.backend.master();
        let report = execute_in_transaction(&mut uow, &self.strategy, move |uow| {
            Box::pin(async move {
                let repo = uow.subscriptions();
                let mut report = SweepReport::default();
                for mut subscription in repo.find(&expired_subscriptions(now)).await? {
                    if subscription.auto_renew() {
                        while subscription.period().has_expired(now) {
                            subscription.renew(renew_months)?;
                        }
                        report.renewed += 1;
                    } else {
                        subscription.expire()?;
                        report.expired += 1;
                    }
                    repo.update(&subscription).await?;
                }
                Ok::<_, DataError>(report)
            })
        })
        .await?;

        debug!(renewed = report.renewed, expired = report.expired, "Subscription sweep finished");
        Ok(report)
    }

    /// Loads a tenant by code, applies `change` and saves it, in one
    /// transaction
    async fn modify<R, F>(&self, code: &str, change: F) -> Result<(Tenant, R), DataError>
    where
        R: Send + 'static,
        F: Fn(&mut Tenant) -> Result<R, DomainError> + Clone + Send + Sync + 'static,
    {
        let code = code.to_string();
        let mut uow = self.backend.master();

        execute_in_transaction(&mut uow, &self.strategy, |uow| {
            let (code, change) = (code.clone(), change.clone());
            Box::pin(async move {
                let repo = uow.tenants();
                let mut tenant = repo
                    .first_or_default(&tenant_by_code(&code).include("module_subscriptions"))
                    .await?
                    .ok_or_else(|| DomainError::TenantNotFound(code.clone()))?;
                let output = change(&mut tenant)?;
                repo.update(&tenant).await?;
                Ok::<_, DataError>((tenant, output))
            })
        })
        .await
    }
}

/// Cache settings of [`TenantResolver`]
#[derive(Debug, Clone, Copy)]
pub struct ResolverConfig {
    pub ttl: Duration,
    pub max_entries: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            max_entries: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ResolverKey {
    Id(Uuid),
    Code(String),
}

/// Per-request tenant lookups with a TTL cache in front of [`TenantService`]
///
/// Found tenants are cached under their id and code. Misses are not
/// cached. Callers that mutate a tenant invalidate it explicitly.
#[derive(Clone)]
pub struct TenantResolver<B> {
    service: TenantService<B>,
    cache: Cache<ResolverKey, Arc<Tenant>>,
}

impl<B: DataBackend> TenantResolver<B> {
    pub fn new(service: TenantService<B>, config: ResolverConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(config.ttl)
            .build();
        Self { service, cache }
    }

    pub fn service(&self) -> &TenantService<B> {
        &self.service
    }

    /// Resolves a raw identifier: UUIDs by id, anything else by code
    pub async fn resolve(&self, identifier: &str) -> Result<Option<Arc<Tenant>>, DataError> {
        let key = match Uuid::parse_str(identifier.trim()) {
            Ok(id) => ResolverKey::Id(id),
            Err(_) => ResolverKey::Code(identifier.trim().to_ascii_uppercase()),
        };
        self.cached(key, self.service.resolve_by_identifier(identifier))
            .await
    }

    pub async fn resolve_id(&self, id: Uuid) -> Result<Option<Arc<Tenant>>, DataError> {
        self.cached(ResolverKey::Id(id), self.service.resolve_by_id(id))
            .await
    }

    async fn cached(
        &self,
        key: ResolverKey,
        lookup: impl std::future::Future<Output = Result<Option<Tenant>, DataError>>,
    ) -> Result<Option<Arc<Tenant>>, DataError> {
        if let Some(tenant) = self.cache.get(&key).await {
            return Ok(Some(tenant));
        }
        let Some(tenant) = lookup.await? else {
            debug!(?key, "Tenant not found");
            return Ok(None);
        };
        let tenant = Arc::new(tenant);
        for key in keys_of(&tenant) {
            self.cache.insert(key, Arc::clone(&tenant)).await;
        }
        Ok(Some(tenant))
    }

    /// Drops every cached entry of a tenant
    pub async fn invalidate(&self, tenant: &Tenant) {
        for key in keys_of(tenant) {
            self.cache.invalidate(&key).await;
        }
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}

fn keys_of(tenant: &Tenant) -> [ResolverKey; 2] {
    [
        ResolverKey::Id(tenant.id()),
        ResolverKey::Code(tenant.code().to_string()),
    ]
}
