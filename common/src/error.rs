//! Error types for stores and the ranking engine.

use thiserror::Error;

/// Failures raised by a submission store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate entry: {0}")]
    Duplicate(String),

    #[error("Invalid value: {0}")]
    Validation(String),
}

/// Failures raised while computing rankings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RankingError {
    /// The store could not be read. No rankings were produced.
    #[error("Data access error: {0}")]
    DataAccess(#[from] StoreError),

    /// Rejected before the store was touched.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl RankingError {
    /// Whether running the same computation again could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RankingError::DataAccess(_))
    }
}

#[cfg(feature = "database")]
impl From<diesel::result::Error> for StoreError {
    fn from(err: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error};
        match err {
            Error::NotFound => StoreError::NotFound(err.to_string()),
            Error::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info) => {
                StoreError::Duplicate(info.message().to_string())
            }
            Error::DatabaseError(DatabaseErrorKind::ClosedConnection, ref info) => {
                StoreError::Unavailable(info.message().to_string())
            }
            _ => StoreError::Query(err.to_string()),
        }
    }
}

#[cfg(feature = "database")]
impl From<diesel::r2d2::PoolError> for StoreError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

#[cfg(feature = "database")]
impl From<diesel::result::ConnectionError> for StoreError {
    fn from(err: diesel::result::ConnectionError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}
