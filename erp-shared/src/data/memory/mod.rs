//! In-memory backend
//!
//! Entities are stored as JSON documents keyed by id, one table per entity
//! type. A transaction works on a snapshot taken at `begin_transaction` and
//! records row-level changes; commit applies those changes to the shared
//! state, rollback drops them. Outside a transaction every write applies
//! immediately.
//!
//! Used by tests and local development; it is not durable.

mod backend;
mod repository;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use super::unit_of_work::{RepositoryCache, Transactional, UnitOfWork};
use super::{DataError, Record};

pub use backend::MemoryBackend;
pub use repository::MemoryRepository;

pub(crate) type Table = BTreeMap<Uuid, Value>;

#[derive(Debug, Clone, Default)]
pub(crate) struct Tables(HashMap<&'static str, Table>);

impl Tables {
    pub(crate) fn table(&self, name: &str) -> Option<&Table> {
        self.0.get(name)
    }

    pub(crate) fn table_mut(&mut self, name: &'static str) -> &mut Table {
        self.0.entry(name).or_default()
    }
}

/// Open transaction of one unit of work
#[derive(Debug)]
pub(crate) struct MemoryTransaction {
    pub(crate) snapshot: Tables,
    pub(crate) changes: BTreeMap<(&'static str, Uuid), Option<Value>>,
}

/// Session shared by a unit of work and its repositories
pub(crate) type Session = Arc<Mutex<Option<MemoryTransaction>>>;

/// Shared in-memory database
///
/// Cloning is cheap; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    committed: Arc<RwLock<Tables>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows of an entity type
    pub async fn row_count(&self, entity: &str) -> usize {
        self.committed
            .read()
            .await
            .table(entity)
            .map_or(0, BTreeMap::len)
    }
}

/// Unit of work over a [`MemoryDatabase`]
pub struct MemoryUnitOfWork {
    db: MemoryDatabase,
    session: Session,
    active: bool,
    repositories: RepositoryCache,
}

impl MemoryUnitOfWork {
    pub fn new(db: MemoryDatabase) -> Self {
        Self {
            db,
            session: Arc::new(Mutex::new(None)),
            active: false,
            repositories: RepositoryCache::default(),
        }
    }
}

#[async_trait]
impl Transactional for MemoryUnitOfWork {
    async fn begin_transaction(&mut self) -> Result<(), DataError> {
        let mut session = self.session.lock().await;
        if session.is_some() {
            return Err(DataError::TransactionAlreadyActive);
        }
        let snapshot = self.db.committed.read().await.clone();
        *session = Some(MemoryTransaction {
            snapshot,
            changes: BTreeMap::new(),
        });
        self.active = true;
        debug!("Memory transaction started");
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), DataError> {
        let transaction = self
            .session
            .lock()
            .await
            .take()
            .ok_or(DataError::NoActiveTransaction)?;
        self.active = false;

        let change_count = transaction.changes.len();
        let mut committed = self.db.committed.write().await;
        for ((table, id), value) in transaction.changes {
            let table = committed.table_mut(table);
            match value {
                Some(value) => {
                    table.insert(id, value);
                }
                None => {
                    table.remove(&id);
                }
            }
        }
        debug!(changes = change_count, "Memory transaction committed");
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DataError> {
        let transaction = self
            .session
            .lock()
            .await
            .take()
            .ok_or(DataError::NoActiveTransaction)?;
        self.active = false;
        debug!(
            discarded = transaction.changes.len(),
            "Memory transaction rolled back"
        );
        Ok(())
    }

    fn has_active_transaction(&self) -> bool {
        self.active
    }
}

impl UnitOfWork for MemoryUnitOfWork {
    type Repo<T: Record> = MemoryRepository<T>;

    fn repository<T: Record>(&mut self) -> Arc<MemoryRepository<T>> {
        let db = self.db.clone();
        let session = Arc::clone(&self.session);
        self.repositories
            .get_or_insert_with(|| MemoryRepository::new(db, session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_support::Widget;
    use crate::data::{Entity, Repository};

    #[tokio::test]
    async fn test_begin_twice_fails() {
        let mut uow = MemoryUnitOfWork::new(MemoryDatabase::new());
        uow.begin_transaction().await.unwrap();
        assert!(uow.has_active_transaction());
        assert!(matches!(
            uow.begin_transaction().await,
            Err(DataError::TransactionAlreadyActive)
        ));
    }

    #[tokio::test]
    async fn test_commit_without_transaction_fails() {
        let mut uow = MemoryUnitOfWork::new(MemoryDatabase::new());
        assert!(matches!(uow.commit().await, Err(DataError::NoActiveTransaction)));
        assert!(matches!(uow.rollback().await, Err(DataError::NoActiveTransaction)));
    }

    #[tokio::test]
    async fn test_uncommitted_writes_are_isolated() {
        let db = MemoryDatabase::new();
        let mut writer = MemoryUnitOfWork::new(db.clone());
        let mut reader = MemoryUnitOfWork::new(db.clone());
        let widget = Widget::new("Bolt", 1, None);

        writer.begin_transaction().await.unwrap();
        writer.repository::<Widget>().add(&widget).await.unwrap();

        assert!(writer.repository::<Widget>().get_by_id(widget.id).await.unwrap().is_some());
        assert!(reader.repository::<Widget>().get_by_id(widget.id).await.unwrap().is_none());

        writer.commit().await.unwrap();
        assert!(reader.repository::<Widget>().get_by_id(widget.id).await.unwrap().is_some());
        assert_eq!(db.row_count(Widget::NAME).await, 1);
    }

    #[tokio::test]
    async fn test_rollback_discards_changes() {
        let db = MemoryDatabase::new();
        let mut uow = MemoryUnitOfWork::new(db.clone());
        let widget = Widget::new("Bolt", 1, None);
        uow.repository::<Widget>().add(&widget).await.unwrap();

        uow.begin_transaction().await.unwrap();
        uow.repository::<Widget>().remove(widget.id).await.unwrap();
        uow.rollback().await.unwrap();

        assert!(!uow.has_active_transaction());
        assert_eq!(db.row_count(Widget::NAME).await, 1);
    }

    #[tokio::test]
    async fn test_commit_keeps_concurrent_rows() {
        let db = MemoryDatabase::new();
        let mut first = MemoryUnitOfWork::new(db.clone());
        let mut second = MemoryUnitOfWork::new(db.clone());

        first.begin_transaction().await.unwrap();
        first
            .repository::<Widget>()
            .add(&Widget::new("A", 1, None))
            .await
            .unwrap();
        second
            .repository::<Widget>()
            .add(&Widget::new("B", 1, None))
            .await
            .unwrap();
        first.commit().await.unwrap();

        assert_eq!(db.row_count(Widget::NAME).await, 2);
    }

    #[test]
    fn test_repositories_are_cached() {
        let mut uow = MemoryUnitOfWork::new(MemoryDatabase::new());
        let a = uow.repository::<Widget>();
        let b = uow.repository::<Widget>();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
