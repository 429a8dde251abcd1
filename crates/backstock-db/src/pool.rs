//! Database connection pool.
//!
//! Thin wrapper over `sqlx::PgPool` so callers depend on one connect path
//! and error type.

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::error::DbError;

/// Default maximum number of pooled connections.
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Default connection acquire timeout.
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Postgres connection pool handle.
#[derive(Debug, Clone)]
pub struct DbPool {
    inner: PgPool,
}

impl DbPool {
    /// Connect with default pool settings.
    ///
    /// # Errors
    ///
    /// Returns `DbError::ConnectionFailed` if the database is unreachable.
    pub async fn connect(database_url: &str) -> Result<Self, DbError> {
        Self::connect_with(database_url, DEFAULT_MAX_CONNECTIONS).await
    }

    /// Connect with an explicit connection cap.
    ///
    /// # Errors
    ///
    /// Returns `DbError::ConnectionFailed` if the database is unreachable.
    pub async fn connect_with(database_url: &str, max_connections: u32) -> Result<Self, DbError> {
        let inner = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(DEFAULT_ACQUIRE_TIMEOUT)
            .connect(database_url)
            .await
            .map_err(DbError::ConnectionFailed)?;
        Ok(Self { inner })
    }

    /// Wrap an existing pool (used by tests).
    #[must_use]
    pub fn from_pool(inner: PgPool) -> Self {
        Self { inner }
    }

    /// Access the underlying `sqlx` pool.
    #[must_use]
    pub fn inner(&self) -> &PgPool {
        &self.inner
    }

    /// Begin a transaction.
    ///
    /// # Errors
    ///
    /// Returns `DbError::ConnectionFailed` if a connection cannot be acquired.
    pub async fn begin(&self) -> Result<sqlx::Transaction<'_, sqlx::Postgres>, DbError> {
        self.inner.begin().await.map_err(DbError::ConnectionFailed)
    }
}
