//! Unit of work over a PostgreSQL pool
//!
//! A unit of work owns at most one transaction. Its repositories share the
//! transaction through a [`PgSession`], so every statement issued between
//! `begin_transaction` and `commit` lands in the same transaction.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tokio::sync::Mutex;
use tracing::debug;

use super::PgRepository;
use crate::data::unit_of_work::{RepositoryCache, Transactional, UnitOfWork};
use crate::data::{DataError, Record};

/// Pool plus the transaction opened on it, shared with repositories
#[derive(Clone)]
pub(crate) struct PgSession {
    pub(crate) pool: PgPool,
    pub(crate) transaction: Arc<Mutex<Option<Transaction<'static, Postgres>>>>,
}

/// Runs `$body` with `$conn` bound to the open transaction, or to the pool
/// when none is open
macro_rules! with_connection {
    ($session:expr, |$conn:ident| $body:expr) => {{
        let mut guard = $session.transaction.lock().await;
        match guard.as_mut() {
            Some(tx) => {
                let $conn = &mut **tx;
                $body
            }
            None => {
                let $conn = &$session.pool;
                $body
            }
        }
    }};
}
pub(crate) use with_connection;

/// Unit of work over one PostgreSQL pool
///
/// Outside a transaction each statement runs on its own pooled connection.
/// Between `begin_transaction` and commit or rollback every repository of
/// this unit of work runs on the transaction's connection.
pub struct PgUnitOfWork {
    session: PgSession,
    active: bool,
    repositories: RepositoryCache,
}

impl PgUnitOfWork {
    pub fn new(pool: PgPool) -> Self {
        Self {
            session: PgSession {
                pool,
                transaction: Arc::new(Mutex::new(None)),
            },
            active: false,
            repositories: RepositoryCache::default(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.session.pool
    }
}

#[async_trait]
impl Transactional for PgUnitOfWork {
    async fn begin_transaction(&mut self) -> Result<(), DataError> {
        let mut slot = self.session.transaction.lock().await;
        if slot.is_some() {
            return Err(DataError::TransactionAlreadyActive);
        }
        *slot = Some(self.session.pool.begin().await?);
        self.active = true;
        debug!("Transaction started");
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), DataError> {
        let transaction = self
            .session
            .transaction
            .lock()
            .await
            .take()
            .ok_or(DataError::NoActiveTransaction)?;
        self.active = false;
        transaction.commit().await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DataError> {
        let transaction = self
            .session
            .transaction
            .lock()
            .await
            .take()
            .ok_or(DataError::NoActiveTransaction)?;
        self.active = false;
        transaction.rollback().await?;
        debug!("Transaction rolled back");
        Ok(())
    }

    fn has_active_transaction(&self) -> bool {
        self.active
    }
}

impl UnitOfWork for PgUnitOfWork {
    type Repo<T: Record> = PgRepository<T>;

    fn repository<T: Record>(&mut self) -> Arc<PgRepository<T>> {
        let session = self.session.clone();
        self.repositories
            .get_or_insert_with(|| PgRepository::new(session))
    }
}
