//! Specification composer
//!
//! A [`Specification`] describes a query declaratively: a criteria tree plus
//! ordering, paging, include and tracking directives. It does not execute
//! anything. Repositories interpret it, in memory through
//! [`SpecificationEvaluator`] or as SQL in the PostgreSQL backend, with the
//! same stage order: filter, includes, ordering, paging, tracking.

pub mod catalog;
mod criteria;
mod evaluator;
mod paging;
#[allow(clippy::module_inception)]
mod specification;
mod value;

pub use criteria::{field, Comparison, Condition, Criteria, FieldRef, Operand};
pub use evaluator::SpecificationEvaluator;
pub use paging::{Page, PageRequest, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use specification::{SortDirection, SortKey, Specification, SpecificationError, TrackingMode};
pub use value::FieldValue;
