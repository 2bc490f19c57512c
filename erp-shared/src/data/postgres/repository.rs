//! Repository over one PostgreSQL table
//!
//! Statements are rendered by [`query`] and run on the unit of work's open
//! transaction, or on the pool when none is open. Includes are loaded with
//! one `IN` query per relation. A unique violation on insert or update is
//! reported as [`DataError::Conflict`].

use std::marker::PhantomData;

use async_trait::async_trait;
use uuid::Uuid;

use super::query;
use super::unit_of_work::{with_connection, PgSession};
use crate::data::{ChildLoader, DataError, Record, Repository};
use crate::specification::{field, Specification, SpecificationEvaluator};

/// Repository over one table, bound to a unit of work's session
pub struct PgRepository<T> {
    session: PgSession,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Record> PgRepository<T> {
    pub(crate) fn new(session: PgSession) -> Self {
        Self {
            session,
            _entity: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Record> Repository<T> for PgRepository<T> {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<T>, DataError> {
        let spec = Specification::<T>::with_criteria(field("id").eq(id));
        let mut qb = query::select(&spec)?;
        let row = with_connection!(self.session, |conn| {
            qb.build_query_as::<T>().fetch_optional(conn).await
        })?;
        Ok(row)
    }

    async fn list_all(&self) -> Result<Vec<T>, DataError> {
        let mut qb = query::select(&Specification::<T>::new())?;
        let rows = with_connection!(self.session, |conn| {
            qb.build_query_as::<T>().fetch_all(conn).await
        })?;
        Ok(rows)
    }

    async fn add(&self, entity: &T) -> Result<(), DataError> {
        self.add_range(std::slice::from_ref(entity)).await
    }

    async fn add_range(&self, entities: &[T]) -> Result<(), DataError> {
        if entities.is_empty() {
            return Ok(());
        }
        let mut qb = query::insert(entities);
        with_connection!(self.session, |conn| qb.build().execute(conn).await)
            .map_err(DataError::from_write::<T>)?;
        Ok(())
    }

    async fn update(&self, entity: &T) -> Result<(), DataError> {
        let mut qb = query::update(entity);
        let result = with_connection!(self.session, |conn| qb.build().execute(conn).await)
            .map_err(DataError::from_write::<T>)?;
        if result.rows_affected() == 0 {
            return Err(DataError::not_found::<T>(entity.id()));
        }
        Ok(())
    }

    async fn remove(&self, id: Uuid) -> Result<bool, DataError> {
        let sql = format!("DELETE FROM {} WHERE id = $1", T::TABLE);
        let result = with_connection!(self.session, |conn| {
            sqlx::query(&sql).bind(id).execute(conn).await
        })?;
        Ok(result.rows_affected() > 0)
    }

    async fn find(&self, spec: &Specification<T>) -> Result<Vec<T>, DataError> {
        let mut qb = query::select(spec)?;
        let mut items = with_connection!(self.session, |conn| {
            qb.build_query_as::<T>().fetch_all(conn).await
        })?;
        if !spec.includes().is_empty() {
            T::load_includes(&mut items, spec.includes(), self).await?;
        }
        Ok(SpecificationEvaluator::resolve_identity(items, spec))
    }

    async fn count(&self, spec: &Specification<T>) -> Result<u64, DataError> {
        let mut qb = query::count(spec)?;
        let (count,) = with_connection!(self.session, |conn| {
            qb.build_query_as::<(i64,)>().fetch_one(conn).await
        })?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn any(&self, spec: &Specification<T>) -> Result<bool, DataError> {
        let mut qb = query::exists(spec)?;
        let (exists,) = with_connection!(self.session, |conn| {
            qb.build_query_as::<(bool,)>().fetch_one(conn).await
        })?;
        Ok(exists)
    }
}

#[async_trait]
impl<T: Record> ChildLoader for PgRepository<T> {
    async fn load_children<C: Record>(
        &self,
        foreign_key: &'static str,
        parent_ids: Vec<Uuid>,
    ) -> Result<Vec<C>, DataError> {
        if parent_ids.is_empty() {
            return Ok(Vec::new());
        }
        let children = PgRepository::<C>::new(self.session.clone());
        children
            .find(&Specification::with_criteria(field(foreign_key).is_in(parent_ids)))
            .await
    }
}
