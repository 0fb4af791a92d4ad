//! Error types for planning and executing queries.

use burrowdb_core::CoreError;
use thiserror::Error;

use crate::storage::StorageError;

/// Errors that can occur while planning or evaluating a query.
///
/// Every error is fatal to the statement that raised it.
#[derive(Debug, Error)]
pub enum QueryError {
    /// A caller passed an argument that cannot be used, such as an empty table name.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An aggregate function appeared where aggregates are not allowed.
    #[error("illegal aggregate placement: {0}")]
    IllegalAggregatePlacement(String),

    /// The query uses a feature the planner does not support.
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// An error from the storage layer.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A plan node was built with a configuration it cannot run.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A plan node was driven out of order.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// An expression could not be evaluated.
    #[error("evaluation error: {0}")]
    Evaluation(String),
}

impl QueryError {
    /// Creates an evaluation error.
    #[must_use]
    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation(message.into())
    }

    /// Creates an invalid state error.
    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }
}

impl From<CoreError> for QueryError {
    fn from(err: CoreError) -> Self {
        Self::Evaluation(err.to_string())
    }
}

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = QueryError::IllegalAggregatePlacement("WHERE clause".to_string());
        assert!(err.to_string().contains("illegal aggregate placement"));
        assert!(err.to_string().contains("WHERE clause"));
    }

    #[test]
    fn core_errors_become_evaluation_errors() {
        let err: QueryError = CoreError::type_mismatch("INTEGER", "VARCHAR").into();
        assert!(matches!(err, QueryError::Evaluation(_)));
        assert!(err.to_string().contains("expected INTEGER"));
    }

    #[test]
    fn storage_errors_convert() {
        let err: QueryError = StorageError::TableNotFound("t".to_string()).into();
        assert!(matches!(err, QueryError::Storage(StorageError::TableNotFound(_))));
    }
}
