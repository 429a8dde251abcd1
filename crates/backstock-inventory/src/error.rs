//! Error types for the inventory domain.
//!
//! Bulk uploads never abort on a bad row; those are skip-counted by the
//! ingestion services and reported in the returned tally. What surfaces here
//! is infrastructure failure: an unavailable store aborts the whole
//! operation, and a failed recompute never commits partially.

use backstock_db::DbError;
use thiserror::Error;

/// Result alias for inventory domain operations.
pub type Result<T> = std::result::Result<T, InventoryError>;

/// Inventory domain errors.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Underlying store failure.
    #[error(transparent)]
    Store(#[from] DbError),
}
