//! Repository over one table of a memory database
//!
//! Rows are stored as JSON documents keyed by id. Reads inside a
//! transaction see the transaction's snapshot; outside one they see the
//! committed state. Writes outside a transaction apply immediately.
//! Specifications run through [`SpecificationEvaluator`].

use std::marker::PhantomData;

use async_trait::async_trait;
use uuid::Uuid;

use super::{MemoryDatabase, Session, Table};
use crate::data::{ChildLoader, DataError, Record, Repository};
use crate::specification::{field, Specification, SpecificationEvaluator};

/// Repository over one table of a [`MemoryDatabase`]
pub struct MemoryRepository<T> {
    db: MemoryDatabase,
    session: Session,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Record> MemoryRepository<T> {
    pub(crate) fn new(db: MemoryDatabase, session: Session) -> Self {
        Self {
            db,
            session,
            _entity: PhantomData,
        }
    }

    /// All rows visible to this session
    async fn load_all(&self) -> Result<Vec<T>, DataError> {
        let values = {
            let session = self.session.lock().await;
            match session.as_ref() {
                Some(tx) => tx.snapshot.table(T::NAME).cloned(),
                None => self.db.committed.read().await.table(T::NAME).cloned(),
            }
        };
        values
            .unwrap_or_default()
            .into_values()
            .map(|value| serde_json::from_value(value).map_err(DataError::from))
            .collect()
    }

    /// Applies a mutation to this session's view of the table
    ///
    /// `mutate` returns its result plus the ids it touched; inside a
    /// transaction those rows are recorded for commit.
    async fn write<R>(
        &self,
        mutate: impl FnOnce(&mut Table) -> Result<(R, Vec<Uuid>), DataError> + Send,
    ) -> Result<R, DataError> {
        let mut session = self.session.lock().await;
        match session.as_mut() {
            Some(tx) => {
                let table = tx.snapshot.table_mut(T::NAME);
                let (result, touched) = mutate(table)?;
                for id in touched {
                    tx.changes.insert((T::NAME, id), table.get(&id).cloned());
                }
                Ok(result)
            }
            None => {
                let mut committed = self.db.committed.write().await;
                let (result, _) = mutate(committed.table_mut(T::NAME))?;
                Ok(result)
            }
        }
    }

    fn conflict(id: Uuid) -> DataError {
        DataError::Conflict {
            entity: T::NAME,
            id: id.to_string(),
        }
    }
}

#[async_trait]
impl<T: Record> Repository<T> for MemoryRepository<T> {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<T>, DataError> {
        let value = {
            let session = self.session.lock().await;
            match session.as_ref() {
                Some(tx) => tx.snapshot.table(T::NAME).and_then(|t| t.get(&id)).cloned(),
                None => self
                    .db
                    .committed
                    .read()
                    .await
                    .table(T::NAME)
                    .and_then(|t| t.get(&id))
                    .cloned(),
            }
        };
        value
            .map(|v| serde_json::from_value(v).map_err(DataError::from))
            .transpose()
    }

    async fn list_all(&self) -> Result<Vec<T>, DataError> {
        self.load_all().await
    }

    async fn add(&self, entity: &T) -> Result<(), DataError> {
        let id = entity.id();
        let value = serde_json::to_value(entity)?;
        self.write(move |table| {
            if table.contains_key(&id) {
                return Err(Self::conflict(id));
            }
            table.insert(id, value);
            Ok(((), vec![id]))
        })
        .await
    }

    async fn add_range(&self, entities: &[T]) -> Result<(), DataError> {
        let rows = entities
            .iter()
            .map(|e| -> Result<(Uuid, serde_json::Value), DataError> {
                Ok((e.id(), serde_json::to_value(e)?))
            })
            .collect::<Result<Vec<_>, DataError>>()?;
        self.write(move |table| {
            let mut ids = Vec::with_capacity(rows.len());
            for (id, _) in &rows {
                if table.contains_key(id) || ids.contains(id) {
                    return Err(Self::conflict(*id));
                }
                ids.push(*id);
            }
            table.extend(rows);
            Ok(((), ids))
        })
        .await
    }

    async fn update(&self, entity: &T) -> Result<(), DataError> {
        let id = entity.id();
        let value = serde_json::to_value(entity)?;
        self.write(move |table| match table.get_mut(&id) {
            Some(slot) => {
                *slot = value;
                Ok(((), vec![id]))
            }
            None => Err(DataError::not_found::<T>(id)),
        })
        .await
    }

    async fn remove(&self, id: Uuid) -> Result<bool, DataError> {
        self.write(move |table| {
            let removed = table.remove(&id).is_some();
            Ok((removed, if removed { vec![id] } else { Vec::new() }))
        })
        .await
    }

    async fn find(&self, spec: &Specification<T>) -> Result<Vec<T>, DataError> {
        let items = self.load_all().await?;
        SpecificationEvaluator::evaluate(items, spec, self).await
    }

    async fn count(&self, spec: &Specification<T>) -> Result<u64, DataError> {
        spec.validate()?;
        let items = self.load_all().await?;
        Ok(SpecificationEvaluator::filter(items, spec).len() as u64)
    }
}

#[async_trait]
impl<T: Record> ChildLoader for MemoryRepository<T> {
    async fn load_children<C: Record>(
        &self,
        foreign_key: &'static str,
        parent_ids: Vec<Uuid>,
    ) -> Result<Vec<C>, DataError> {
        if parent_ids.is_empty() {
            return Ok(Vec::new());
        }
        let children = MemoryRepository::<C>::new(self.db.clone(), self.session.clone());
        children
            .find(&Specification::with_criteria(field(foreign_key).is_in(parent_ids)))
            .await
    }
}
