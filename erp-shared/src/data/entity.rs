//! Entity traits shared by both backends
//!
//! - [`Entity`]: identity plus named, comparable fields for criteria
//! - [`Includes`]: loading of related collections requested by a
//!   specification
//! - [`Record`]: everything a repository needs to store an entity
//! - [`MasterEntity`] / [`TenantEntity`]: which database an entity lives in

use std::collections::HashMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use super::postgres::PgRecord;
use super::DataError;
use crate::specification::FieldValue;

/// An identifiable entity whose fields criteria can refer to
pub trait Entity: Clone + Send + Sync + Unpin + 'static {
    /// Entity name used in errors and as the in-memory table name
    const NAME: &'static str;

    /// Fields usable in criteria and ordering
    const FIELDS: &'static [&'static str];

    /// Related collections usable as includes
    const RELATIONS: &'static [&'static str] = &[];

    fn id(&self) -> Uuid;

    /// Value of a field, `None` when the entity has no such field
    fn field(&self, name: &str) -> Option<FieldValue>;
}

/// Loads related collections into already-fetched entities
#[async_trait]
pub trait Includes: Entity {
    /// Fills the requested relations of `items`
    ///
    /// The default implementation has no relations and rejects any include.
    async fn load_includes<L: ChildLoader>(
        items: &mut [Self],
        includes: &[&'static str],
        loader: &L,
    ) -> Result<(), DataError> {
        let _ = (items, loader);
        match includes.first() {
            Some(include) => Err(DataError::unknown_include::<Self>(include)),
            None => Ok(()),
        }
    }
}

/// Fetches child rows by foreign key within the caller's session
#[async_trait]
pub trait ChildLoader: Send + Sync {
    async fn load_children<C: Record>(
        &self,
        foreign_key: &'static str,
        parent_ids: Vec<Uuid>,
    ) -> Result<Vec<C>, DataError>;
}

/// An entity storable by every backend
pub trait Record: Includes + PgRecord + Serialize + DeserializeOwned {}

impl<T> Record for T where T: Includes + PgRecord + Serialize + DeserializeOwned {}

/// Entity stored in the master database
pub trait MasterEntity: Record {}

/// Entity stored in a tenant's own database
pub trait TenantEntity: Record {}

/// Distributes loaded children to their parents
///
/// Parents without children receive an empty collection.
pub fn attach_children<P, C>(
    parents: &mut [P],
    children: Vec<C>,
    parent_id: impl Fn(&C) -> Uuid,
    assign: impl Fn(&mut P, Vec<C>),
) where
    P: Entity,
{
    let mut grouped: HashMap<Uuid, Vec<C>> = HashMap::new();
    for child in children {
        grouped.entry(parent_id(&child)).or_default().push(child);
    }
    for parent in parents.iter_mut() {
        let children = grouped.remove(&parent.id()).unwrap_or_default();
        assign(parent, children);
    }
}
