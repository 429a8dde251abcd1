//! Error types for the backstock-db crate.
//!
//! Provides a unified error type that wraps `SQLx` errors with additional context.

use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Failed to establish or acquire a database connection.
    ///
    /// This typically indicates network issues, invalid credentials,
    /// or the database server being unavailable.
    #[error("Database connection failed: {0}")]
    ConnectionFailed(#[source] sqlx::Error),

    /// A database migration failed to apply.
    ///
    /// Check the migration SQL for syntax errors or constraint violations.
    #[error("Migration failed: {0}")]
    MigrationFailed(#[source] sqlx::migrate::MigrateError),

    /// A database query failed to execute.
    ///
    /// This can indicate SQL syntax errors, constraint violations,
    /// or issues with the query parameters.
    #[error("Query failed: {0}")]
    QueryFailed(#[source] sqlx::Error),

    /// Creating or dropping a per-audit runtime namespace failed.
    #[error("Runtime namespace operation failed for {schema}: {source}")]
    NamespaceFailed {
        schema: String,
        #[source]
        source: sqlx::Error,
    },

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation failed.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

impl DbError {
    /// Check if this error indicates a connection problem.
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(self, DbError::ConnectionFailed(_))
    }

    /// Check if this error indicates a not-found condition.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound(_))
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DbError::ConnectionFailed(err)
            }
            sqlx::Error::RowNotFound => DbError::NotFound("row not found".to_string()),
            other => DbError::QueryFailed(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: DbError = sqlx::Error::RowNotFound.into();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_message_names_the_schema() {
        let err = DbError::NamespaceFailed {
            schema: "audit_runtime_abc".to_string(),
            source: sqlx::Error::PoolClosed,
        };
        assert!(err.to_string().contains("audit_runtime_abc"));
    }
}
