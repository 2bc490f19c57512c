//! Generic repository over one entity type

use async_trait::async_trait;
use uuid::Uuid;

use super::{DataError, Record};
use crate::specification::{Page, PageRequest, Specification};

/// Data access for one entity type within a unit of work
///
/// Writes made while the owning unit of work has an open transaction become
/// visible to other units of work only on commit.
#[async_trait]
pub trait Repository<T: Record>: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<T>, DataError>;

    async fn list_all(&self) -> Result<Vec<T>, DataError>;

    /// Inserts a new entity
    ///
    /// # Errors
    ///
    /// [`DataError::Conflict`] in-memory, or a unique-violation driver error
    /// in PostgreSQL, when the id already exists.
    async fn add(&self, entity: &T) -> Result<(), DataError>;

    async fn add_range(&self, entities: &[T]) -> Result<(), DataError>;

    /// Replaces a stored entity
    ///
    /// # Errors
    ///
    /// [`DataError::NotFound`] when no entity has the id.
    async fn update(&self, entity: &T) -> Result<(), DataError>;

    /// Deletes by id, returning whether a row was removed
    async fn remove(&self, id: Uuid) -> Result<bool, DataError>;

    async fn find(&self, spec: &Specification<T>) -> Result<Vec<T>, DataError>;

    async fn count(&self, spec: &Specification<T>) -> Result<u64, DataError>;

    async fn any(&self, spec: &Specification<T>) -> Result<bool, DataError> {
        Ok(self.count(spec).await? > 0)
    }

    /// First match in the specification's order, if any
    async fn first_or_default(&self, spec: &Specification<T>) -> Result<Option<T>, DataError> {
        let spec = spec.clone().take(1);
        Ok(self.find(&spec).await?.into_iter().next())
    }

    /// One page of matches plus the total match count
    async fn find_paged(
        &self,
        spec: &Specification<T>,
        page: PageRequest,
    ) -> Result<Page<T>, DataError> {
        let total = self.count(&spec.unpaged()).await?;
        let paged = spec
            .clone()
            .apply_page(u64::from(page.page_number), u64::from(page.page_size))?;
        let items = self.find(&paged).await?;
        Ok(Page::new(items, page, total))
    }
}
