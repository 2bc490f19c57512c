//! Data access errors

use thiserror::Error;

use crate::models::DomainError;
use crate::specification::SpecificationError;

use super::Entity;

/// PostgreSQL `unique_violation`
const UNIQUE_VIOLATION: &str = "23505";

/// Errors returned by repositories and units of work
#[derive(Debug, Error)]
pub enum DataError {
    /// Driver error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The specification referenced something the entity does not have
    #[error(transparent)]
    Specification(#[from] SpecificationError),

    /// A domain rule rejected the operation
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Entity with the given id does not exist
    #[error("{entity} {id} was not found")]
    NotFound { entity: &'static str, id: String },

    /// Entity with the given id already exists
    #[error("{entity} {id} already exists")]
    Conflict { entity: &'static str, id: String },

    /// `begin_transaction` while a transaction is open
    #[error("a transaction is already active")]
    TransactionAlreadyActive,

    /// `commit`/`rollback` without an open transaction
    #[error("no active transaction")]
    NoActiveTransaction,

    /// Tenant database could not be reached
    #[error("database of tenant {tenant} is unavailable: {reason}")]
    TenantDatabaseUnavailable { tenant: String, reason: String },

    /// Stored document could not be (de)serialized
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DataError {
    pub fn not_found<T: Entity>(id: impl ToString) -> Self {
        DataError::NotFound {
            entity: T::NAME,
            id: id.to_string(),
        }
    }

    pub fn unknown_include<T: Entity>(include: &str) -> Self {
        DataError::Specification(SpecificationError::UnknownInclude {
            entity: T::NAME,
            include: include.to_string(),
        })
    }

    /// Driver error of an insert or update of `T`
    ///
    /// A unique violation (`23505`) becomes [`DataError::Conflict`] naming
    /// the violated constraint, like a duplicate key in the in-memory store.
    pub fn from_write<T: Entity>(error: sqlx::Error) -> Self {
        let constraint = match &error {
            sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                Some(db.constraint().unwrap_or("unique key").to_string())
            }
            _ => None,
        };
        match constraint {
            Some(id) => DataError::Conflict {
                entity: T::NAME,
                id,
            },
            None => DataError::Database(error),
        }
    }

    /// The domain error inside, if any
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            DataError::Domain(e) => Some(e),
            _ => None,
        }
    }
}

/// Classifies errors worth retrying
///
/// Implemented by every error type an operation run through
/// [`execute_in_transaction`](super::execute_in_transaction) may return.
pub trait TransientError {
    fn is_transient(&self) -> bool;
}

impl TransientError for DataError {
    fn is_transient(&self) -> bool {
        match self {
            DataError::Database(e) => is_transient_sqlx(e),
            _ => false,
        }
    }
}

impl TransientError for sqlx::Error {
    fn is_transient(&self) -> bool {
        is_transient_sqlx(self)
    }
}

/// Whether a driver error is transient
///
/// Connection-level failures and the PostgreSQL error classes for
/// serialization failures, deadlocks, shutdowns and connection exceptions
/// are transient; everything else is not.
pub fn is_transient_sqlx(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db) => db.code().is_some_and(|code| {
            matches!(
                code.as_ref(),
                "40001" | "40P01" | "57P01" | "57P02" | "57P03" | "08000" | "08003" | "08006"
            )
        }),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_support::Widget;
    use std::io;

    #[test]
    fn test_transient_classification() {
        let io_error = DataError::Database(sqlx::Error::Io(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "reset",
        )));
        assert!(io_error.is_transient());
        assert!(DataError::Database(sqlx::Error::PoolTimedOut).is_transient());
        assert!(!DataError::Database(sqlx::Error::RowNotFound).is_transient());
        assert!(!DataError::NoActiveTransaction.is_transient());
        assert!(!DataError::Domain(DomainError::TenantAdminRequired).is_transient());
    }

    #[derive(Debug)]
    struct PgError {
        code: &'static str,
    }

    impl std::fmt::Display for PgError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "error {}", self.code)
        }
    }

    impl std::error::Error for PgError {}

    impl sqlx::error::DatabaseError for PgError {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint"
        }

        fn code(&self) -> Option<std::borrow::Cow<'_, str>> {
            Some(self.code.into())
        }

        fn constraint(&self) -> Option<&str> {
            Some("widgets_name_key")
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::Other
        }
    }

    fn database_error(code: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(PgError { code }))
    }

    #[test]
    fn test_unique_violation_on_write_is_a_conflict() {
        let err = DataError::from_write::<Widget>(database_error("23505"));
        match err {
            DataError::Conflict { entity, id } => {
                assert_eq!(entity, Widget::NAME);
                assert_eq!(id, "widgets_name_key");
            }
            other => panic!("expected conflict, got {other:?}"),
        }

        let err = DataError::from_write::<Widget>(database_error("40001"));
        assert!(matches!(err, DataError::Database(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn test_as_domain() {
        let err: DataError = DomainError::Required { field: "name" }.into();
        assert_eq!(err.as_domain(), Some(&DomainError::Required { field: "name" }));
        assert!(DataError::NoActiveTransaction.as_domain().is_none());
    }
}
