//! `Specification<T>`: declarative query descriptor
//!
//! A specification carries criteria plus the directives a repository applies
//! after filtering: includes, ordering, paging and tracking. It never runs a
//! query itself. Repositories apply the stages in a fixed order:
//!
//! 1. filter by criteria
//! 2. load includes
//! 3. order
//! 4. skip/take
//! 5. tracking
//!
//! When paging is enabled the primary key is appended as a final sort key so
//! consecutive pages over unchanged data never overlap or skip rows.

use std::fmt;
use std::marker::PhantomData;

use thiserror::Error;

use super::criteria::{Criteria, FieldRef};
use crate::data::Entity;

/// Sort direction of one ordering key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// One ordering key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: &'static str,
    pub direction: SortDirection,
}

/// How loaded entities relate to each other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackingMode {
    /// Entities are tracked for change detection; rows with the same key
    /// resolve to a single instance
    #[default]
    Tracking,
    /// Read-only; every row yields its own instance
    NoTracking,
    /// Read-only, but rows with the same key still resolve to one instance
    NoTrackingWithIdentityResolution,
}

impl TrackingMode {
    /// Whether duplicate keys collapse to one instance
    pub fn resolves_identity(self) -> bool {
        !matches!(self, TrackingMode::NoTracking)
    }
}

/// Specification errors surfaced when a descriptor references something the
/// entity does not have
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecificationError {
    #[error("unknown field '{field}' on {entity}")]
    UnknownField { entity: &'static str, field: String },

    #[error("unknown include '{include}' on {entity}")]
    UnknownInclude { entity: &'static str, include: String },

    #[error("invalid paging: {0}")]
    InvalidPaging(&'static str),
}

/// Query descriptor over entities of type `T`
pub struct Specification<T> {
    criteria: Criteria,
    includes: Vec<&'static str>,
    ordering: Vec<SortKey>,
    skip: Option<u64>,
    take: Option<u64>,
    tracking: TrackingMode,
    _entity: PhantomData<fn() -> T>,
}

// Manual impls: derives would require `T: Clone`/`T: Debug`.
impl<T> Clone for Specification<T> {
    fn clone(&self) -> Self {
        Self {
            criteria: self.criteria.clone(),
            includes: self.includes.clone(),
            ordering: self.ordering.clone(),
            skip: self.skip,
            take: self.take,
            tracking: self.tracking,
            _entity: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Specification<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Specification")
            .field("criteria", &self.criteria)
            .field("includes", &self.includes)
            .field("ordering", &self.ordering)
            .field("skip", &self.skip)
            .field("take", &self.take)
            .field("tracking", &self.tracking)
            .finish()
    }
}

impl<T> Default for Specification<T> {
    fn default() -> Self {
        Self::with_criteria(Criteria::always())
    }
}

impl<T> Specification<T> {
    /// Matches every entity
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_criteria(criteria: Criteria) -> Self {
        Self {
            criteria,
            includes: Vec::new(),
            ordering: Vec::new(),
            skip: None,
            take: None,
            tracking: TrackingMode::default(),
            _entity: PhantomData,
        }
    }

    /// ANDs an additional condition into the criteria
    pub fn filter(mut self, criteria: Criteria) -> Self {
        self.criteria = self.criteria.and(criteria);
        self
    }

    /// Requests a related collection to be loaded
    pub fn include(mut self, relation: &'static str) -> Self {
        if !self.includes.contains(&relation) {
            self.includes.push(relation);
        }
        self
    }

    /// Replaces the ordering with a single ascending key
    pub fn order_by(self, field: FieldRef) -> Self {
        self.reorder(field.name(), SortDirection::Ascending)
    }

    /// Replaces the ordering with a single descending key
    pub fn order_by_descending(self, field: FieldRef) -> Self {
        self.reorder(field.name(), SortDirection::Descending)
    }

    /// Appends an ascending secondary key
    pub fn then_by(mut self, field: FieldRef) -> Self {
        self.ordering.push(SortKey {
            field: field.name(),
            direction: SortDirection::Ascending,
        });
        self
    }

    /// Appends a descending secondary key
    pub fn then_by_descending(mut self, field: FieldRef) -> Self {
        self.ordering.push(SortKey {
            field: field.name(),
            direction: SortDirection::Descending,
        });
        self
    }

    fn reorder(mut self, field: &'static str, direction: SortDirection) -> Self {
        self.ordering = vec![SortKey { field, direction }];
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn take(mut self, take: u64) -> Self {
        self.take = Some(take);
        self
    }

    /// Applies a 1-based page
    ///
    /// # Errors
    ///
    /// Fails when either argument is zero or the page lies beyond the
    /// addressable range.
    pub fn apply_page(self, page_number: u64, page_size: u64) -> Result<Self, SpecificationError> {
        if page_number == 0 {
            return Err(SpecificationError::InvalidPaging("page number starts at 1"));
        }
        if page_size == 0 {
            return Err(SpecificationError::InvalidPaging("page size must be positive"));
        }
        let skip = (page_number - 1)
            .checked_mul(page_size)
            .ok_or(SpecificationError::InvalidPaging("page is out of range"))?;
        Ok(self.skip(skip).take(page_size))
    }

    pub fn as_no_tracking(mut self) -> Self {
        self.tracking = TrackingMode::NoTracking;
        self
    }

    pub fn as_no_tracking_with_identity_resolution(mut self) -> Self {
        self.tracking = TrackingMode::NoTrackingWithIdentityResolution;
        self
    }

    /// Logical AND; directives of `self` are kept, includes are merged
    pub fn and(mut self, other: Specification<T>) -> Self {
        self.criteria = self.criteria.and(other.criteria);
        self.merge_includes(other.includes);
        self
    }

    /// Logical OR; directives of `self` are kept, includes are merged
    pub fn or(mut self, other: Specification<T>) -> Self {
        self.criteria = self.criteria.or(other.criteria);
        self.merge_includes(other.includes);
        self
    }

    /// Logical NOT of the criteria; directives are kept
    pub fn not(mut self) -> Self {
        self.criteria = self.criteria.negate();
        self
    }

    fn merge_includes(&mut self, includes: Vec<&'static str>) {
        for include in includes {
            if !self.includes.contains(&include) {
                self.includes.push(include);
            }
        }
    }

    pub fn criteria(&self) -> &Criteria {
        &self.criteria
    }

    pub fn includes(&self) -> &[&'static str] {
        &self.includes
    }

    pub fn ordering(&self) -> &[SortKey] {
        &self.ordering
    }

    pub fn skip_count(&self) -> Option<u64> {
        self.skip
    }

    pub fn take_count(&self) -> Option<u64> {
        self.take
    }

    pub fn tracking(&self) -> TrackingMode {
        self.tracking
    }

    pub fn is_paging_enabled(&self) -> bool {
        self.skip.is_some() || self.take.is_some()
    }

    /// Same criteria and includes, without ordering, paging or tracking
    ///
    /// Used for totals in paged queries.
    pub fn unpaged(&self) -> Self {
        Self {
            criteria: self.criteria.clone(),
            includes: Vec::new(),
            ordering: Vec::new(),
            skip: None,
            take: None,
            tracking: self.tracking,
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> Specification<T> {
    /// Appends an ordering key named at runtime, e.g. from a query string
    ///
    /// # Errors
    ///
    /// Returns [`SpecificationError::UnknownField`] for names the entity
    /// does not expose.
    pub fn then_by_name(mut self, name: &str, direction: SortDirection) -> Result<Self, SpecificationError> {
        let field = lookup(T::FIELDS, name).ok_or_else(|| SpecificationError::UnknownField {
            entity: T::NAME,
            field: name.to_string(),
        })?;
        self.ordering.push(SortKey { field, direction });
        Ok(self)
    }

    /// Adds an include named at runtime
    ///
    /// # Errors
    ///
    /// Returns [`SpecificationError::UnknownInclude`] for relations the
    /// entity does not have.
    pub fn include_named(self, name: &str) -> Result<Self, SpecificationError> {
        let relation = lookup(T::RELATIONS, name).ok_or_else(|| SpecificationError::UnknownInclude {
            entity: T::NAME,
            include: name.to_string(),
        })?;
        Ok(self.include(relation))
    }

    /// Checks every referenced field and include against the entity
    pub fn validate(&self) -> Result<(), SpecificationError> {
        let fields = self
            .criteria
            .referenced_fields()
            .into_iter()
            .chain(self.ordering.iter().map(|k| k.field));
        for field in fields {
            if !T::FIELDS.contains(&field) {
                return Err(SpecificationError::UnknownField {
                    entity: T::NAME,
                    field: field.to_string(),
                });
            }
        }
        for include in &self.includes {
            if !T::RELATIONS.contains(include) {
                return Err(SpecificationError::UnknownInclude {
                    entity: T::NAME,
                    include: include.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Evaluates only the criteria against one entity
    pub fn is_satisfied_by(&self, entity: &T) -> bool {
        self.criteria.evaluate(entity)
    }
}

fn lookup(names: &'static [&'static str], name: &str) -> Option<&'static str> {
    names.iter().copied().find(|candidate| *candidate == name)
}
