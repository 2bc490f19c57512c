//! In-memory specification evaluator
//!
//! Runs the specification stages literally, in order, over a collection of
//! entities. Used by the in-memory backend; the PostgreSQL backend pushes
//! the same stages into SQL instead.

use std::collections::HashSet;

use super::specification::{SortDirection, Specification};
use crate::data::{ChildLoader, DataError, Entity, Includes};

/// Stateless stage runner
pub struct SpecificationEvaluator;

impl SpecificationEvaluator {
    /// Applies every stage: filter, includes, ordering, paging, tracking
    ///
    /// # Errors
    ///
    /// Fails when the specification names an unknown field or include, or
    /// when loading an include fails.
    pub async fn evaluate<T, L>(
        items: Vec<T>,
        spec: &Specification<T>,
        loader: &L,
    ) -> Result<Vec<T>, DataError>
    where
        T: Includes,
        L: ChildLoader,
    {
        spec.validate()?;

        let mut items = Self::filter(items, spec);
        if !spec.includes().is_empty() {
            T::load_includes(&mut items, spec.includes(), loader).await?;
        }
        Self::order(&mut items, spec);
        let items = Self::page(items, spec);
        Ok(Self::resolve_identity(items, spec))
    }

    /// Stage 1: keeps entities satisfying the criteria
    pub fn filter<T: Entity>(items: Vec<T>, spec: &Specification<T>) -> Vec<T> {
        items
            .into_iter()
            .filter(|item| spec.is_satisfied_by(item))
            .collect()
    }

    /// Stage 3: stable sort by the ordering keys
    ///
    /// With paging enabled the id is the final tiebreak.
    pub fn order<T: Entity>(items: &mut [T], spec: &Specification<T>) {
        let keys = spec.ordering();
        let tiebreak = spec.is_paging_enabled();
        if keys.is_empty() && !tiebreak {
            return;
        }

        items.sort_by(|a, b| {
            for key in keys {
                let left = a.field(key.field).unwrap_or(super::FieldValue::Null);
                let right = b.field(key.field).unwrap_or(super::FieldValue::Null);
                let ordering = match key.direction {
                    SortDirection::Ascending => left.sort_cmp(&right),
                    SortDirection::Descending => right.sort_cmp(&left),
                };
                if ordering.is_ne() {
                    return ordering;
                }
            }
            if tiebreak {
                a.id().cmp(&b.id())
            } else {
                std::cmp::Ordering::Equal
            }
        });
    }

    /// Stage 4: skip, then take
    pub fn page<T>(items: Vec<T>, spec: &Specification<T>) -> Vec<T> {
        let skip = spec
            .skip_count()
            .map_or(0, |s| usize::try_from(s).unwrap_or(usize::MAX));
        let take = spec
            .take_count()
            .map_or(usize::MAX, |t| usize::try_from(t).unwrap_or(usize::MAX));
        items.into_iter().skip(skip).take(take).collect()
    }

    /// Stage 5: collapses duplicate keys unless tracking is fully off
    pub fn resolve_identity<T: Entity>(items: Vec<T>, spec: &Specification<T>) -> Vec<T> {
        if !spec.tracking().resolves_identity() {
            return items;
        }
        let mut seen = HashSet::with_capacity(items.len());
        items.into_iter().filter(|item| seen.insert(item.id())).collect()
    }
}
