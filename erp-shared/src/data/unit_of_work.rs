//! Unit of work and transactional execution
//!
//! A unit of work owns one database session. Repositories obtained from it
//! share that session, so writes made through any of them commit or roll
//! back together.
//!
//! Master and tenant data are reached through two separate wrappers,
//! [`MasterUnitOfWork`] and [`TenantUnitOfWork`]. Each only hands out
//! repositories for entities marked [`MasterEntity`] or [`TenantEntity`],
//! so a business entity can never be written to the master database.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tracing::{debug, warn};

use super::{DataError, ExecutionStrategy, MasterEntity, Record, Repository, TenantEntity, TransientError};
use crate::models::{
    Account, Customer, Employee, Module, Order, Product, Tenant, TenantModuleSubscription,
    TenantUser,
};

/// Transaction control of a unit of work
#[async_trait]
pub trait Transactional: Send {
    /// Opens a transaction
    ///
    /// # Errors
    ///
    /// [`DataError::TransactionAlreadyActive`] when one is already open.
    async fn begin_transaction(&mut self) -> Result<(), DataError>;

    /// Commits the open transaction
    ///
    /// # Errors
    ///
    /// [`DataError::NoActiveTransaction`] when none is open.
    async fn commit(&mut self) -> Result<(), DataError>;

    /// Discards the open transaction
    ///
    /// # Errors
    ///
    /// [`DataError::NoActiveTransaction`] when none is open.
    async fn rollback(&mut self) -> Result<(), DataError>;

    fn has_active_transaction(&self) -> bool;
}

/// A session plus lazily created repositories
pub trait UnitOfWork: Transactional {
    type Repo<T: Record>: Repository<T> + 'static;

    /// Repository for `T`, created on first access and cached afterwards
    fn repository<T: Record>(&mut self) -> Arc<Self::Repo<T>>;
}

/// Per-type repository cache used by unit of work implementations
#[derive(Default)]
pub struct RepositoryCache {
    entries: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl RepositoryCache {
    /// Returns the cached `R`, creating it with `make` on first access
    pub fn get_or_insert_with<R>(&mut self, make: impl FnOnce() -> R) -> Arc<R>
    where
        R: Send + Sync + 'static,
    {
        let key = TypeId::of::<R>();
        if let Some(existing) = self
            .entries
            .get(&key)
            .and_then(|entry| entry.downcast_ref::<Arc<R>>())
        {
            return Arc::clone(existing);
        }
        let created = Arc::new(make());
        self.entries.insert(key, Box::new(Arc::clone(&created)));
        created
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Runs `operation` inside a transaction
///
/// Begins a transaction, runs the operation and commits. If the operation
/// fails, the transaction is rolled back and the operation's error is
/// returned unchanged. Failures classified as transient are retried
/// according to `strategy`, each attempt in a fresh transaction.
///
/// The operation is re-invoked on retry, so it must own (clone) whatever it
/// captures.
pub async fn execute_in_transaction<U, T, E, F>(
    uow: &mut U,
    strategy: &ExecutionStrategy,
    mut operation: F,
) -> Result<T, E>
where
    U: Transactional,
    T: Send,
    E: From<DataError> + TransientError + std::fmt::Display + Send,
    F: for<'u> FnMut(&'u mut U) -> BoxFuture<'u, Result<T, E>> + Send,
{
    let mut attempt: u32 = 0;
    loop {
        let error = match uow.begin_transaction().await {
            Err(e) => E::from(e),
            Ok(()) => match operation(uow).await {
                Ok(value) => match uow.commit().await {
                    Ok(()) => {
                        debug!(attempt, "Transaction committed");
                        return Ok(value);
                    }
                    Err(e) => E::from(e),
                },
                Err(e) => {
                    if let Err(rollback_error) = uow.rollback().await {
                        warn!(error = %rollback_error, "Rollback after failed operation failed");
                    }
                    e
                }
            },
        };

        if !strategy.should_retry(attempt, error.is_transient()) {
            return Err(error);
        }

        let delay = strategy.delay_for_attempt(attempt);
        warn!(
            attempt = attempt + 1,
            max_retries = strategy.max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Transient failure, retrying transaction"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// Unit of work over the master database
pub struct MasterUnitOfWork<U> {
    inner: U,
}

impl<U: UnitOfWork> MasterUnitOfWork<U> {
    pub fn new(inner: U) -> Self {
        Self { inner }
    }

    pub fn repository<T: MasterEntity>(&mut self) -> Arc<U::Repo<T>> {
        self.inner.repository::<T>()
    }

    pub fn tenants(&mut self) -> Arc<U::Repo<Tenant>> {
        self.repository::<Tenant>()
    }

    pub fn modules(&mut self) -> Arc<U::Repo<Module>> {
        self.repository::<Module>()
    }

    pub fn subscriptions(&mut self) -> Arc<U::Repo<TenantModuleSubscription>> {
        self.repository::<TenantModuleSubscription>()
    }

    pub fn tenant_users(&mut self) -> Arc<U::Repo<TenantUser>> {
        self.repository::<TenantUser>()
    }
}

/// Unit of work over one tenant's database
pub struct TenantUnitOfWork<U> {
    inner: U,
}

impl<U: UnitOfWork> TenantUnitOfWork<U> {
    pub fn new(inner: U) -> Self {
        Self { inner }
    }

    pub fn repository<T: TenantEntity>(&mut self) -> Arc<U::Repo<T>> {
        self.inner.repository::<T>()
    }

    pub fn customers(&mut self) -> Arc<U::Repo<Customer>> {
        self.repository::<Customer>()
    }

    pub fn products(&mut self) -> Arc<U::Repo<Product>> {
        self.repository::<Product>()
    }

    pub fn orders(&mut self) -> Arc<U::Repo<Order>> {
        self.repository::<Order>()
    }

    pub fn accounts(&mut self) -> Arc<U::Repo<Account>> {
        self.repository::<Account>()
    }

    pub fn employees(&mut self) -> Arc<U::Repo<Employee>> {
        self.repository::<Employee>()
    }
}

#[async_trait]
impl<U: UnitOfWork> Transactional for MasterUnitOfWork<U> {
    async fn begin_transaction(&mut self) -> Result<(), DataError> {
        self.inner.begin_transaction().await
    }

    async fn commit(&mut self) -> Result<(), DataError> {
        self.inner.commit().await
    }

    async fn rollback(&mut self) -> Result<(), DataError> {
        self.inner.rollback().await
    }

    fn has_active_transaction(&self) -> bool {
        self.inner.has_active_transaction()
    }
}

#[async_trait]
impl<U: UnitOfWork> Transactional for TenantUnitOfWork<U> {
    async fn begin_transaction(&mut self) -> Result<(), DataError> {
        self.inner.begin_transaction().await
    }

    async fn commit(&mut self) -> Result<(), DataError> {
        self.inner.commit().await
    }

    async fn rollback(&mut self) -> Result<(), DataError> {
        self.inner.rollback().await
    }

    fn has_active_transaction(&self) -> bool {
        self.inner.has_active_transaction()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::memory::MemoryUnitOfWork;
    use crate::data::test_support::Widget;
    use crate::data::MemoryDatabase;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Debug, PartialEq)]
    enum OpError {
        Data(String),
        Flaky,
        Business(&'static str),
    }

    impl From<DataError> for OpError {
        fn from(e: DataError) -> Self {
            OpError::Data(e.to_string())
        }
    }

    impl TransientError for OpError {
        fn is_transient(&self) -> bool {
            matches!(self, OpError::Flaky)
        }
    }

    impl std::fmt::Display for OpError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    fn fast_retries(max_retries: u32) -> ExecutionStrategy {
        ExecutionStrategy {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    #[test]
    fn test_repository_cache_returns_same_instance() {
        let mut cache = RepositoryCache::default();
        let first = cache.get_or_insert_with(|| String::from("repo"));
        let second = cache.get_or_insert_with(|| String::from("other"));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*second, "repo");
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_operation_persists_nothing() {
        let db = MemoryDatabase::default();
        let mut uow = MemoryUnitOfWork::new(db.clone());
        let widget = Widget::new("Bolt", 1, None);

        let result: Result<(), OpError> =
            execute_in_transaction(&mut uow, &ExecutionStrategy::default(), |uow| {
                let widget = widget.clone();
                Box::pin(async move {
                    uow.repository::<Widget>().add(&widget).await?;
                    Err(OpError::Business("stock check failed"))
                })
            })
            .await;

        assert_eq!(result, Err(OpError::Business("stock check failed")));
        assert!(!uow.has_active_transaction());

        let mut reader = MemoryUnitOfWork::new(db);
        assert!(reader.repository::<Widget>().list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_success_commits() {
        let db = MemoryDatabase::default();
        let mut uow = MemoryUnitOfWork::new(db.clone());
        let widget = Widget::new("Bolt", 1, None);
        let id = widget.id;

        let stored: Result<u64, DataError> =
            execute_in_transaction(&mut uow, &ExecutionStrategy::default(), |uow| {
                let widget = widget.clone();
                Box::pin(async move {
                    let repo = uow.repository::<Widget>();
                    repo.add(&widget).await?;
                    repo.count(&Default::default()).await
                })
            })
            .await;

        assert_eq!(stored.unwrap(), 1);
        let mut reader = MemoryUnitOfWork::new(db);
        assert!(reader.repository::<Widget>().get_by_id(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let attempts = Arc::new(AtomicU32::new(0));
        let mut uow = MemoryUnitOfWork::new(MemoryDatabase::default());

        let counter = Arc::clone(&attempts);
        let result: Result<u32, OpError> =
            execute_in_transaction(&mut uow, &fast_retries(3), move |_| {
                let counter = Arc::clone(&counter);
                Box::pin(async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 {
                        Err(OpError::Flaky)
                    } else {
                        Ok(n)
                    }
                })
            })
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let attempts = Arc::new(AtomicU32::new(0));
        let mut uow = MemoryUnitOfWork::new(MemoryDatabase::default());

        let counter = Arc::clone(&attempts);
        let result: Result<(), OpError> =
            execute_in_transaction(&mut uow, &fast_retries(2), move |_| {
                let counter = Arc::clone(&counter);
                Box::pin(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(OpError::Flaky)
                })
            })
            .await;

        assert_eq!(result, Err(OpError::Flaky));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_transient_failures_are_not_retried() {
        let attempts = Arc::new(AtomicU32::new(0));
        let mut uow = MemoryUnitOfWork::new(MemoryDatabase::default());

        let counter = Arc::clone(&attempts);
        let result: Result<(), OpError> =
            execute_in_transaction(&mut uow, &fast_retries(5), move |_| {
                let counter = Arc::clone(&counter);
                Box::pin(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(OpError::Business("no"))
                })
            })
            .await;

        assert_eq!(result, Err(OpError::Business("no")));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
