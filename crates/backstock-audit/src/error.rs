//! Error types for the audit domain.
//!
//! Every variant names the specific violated invariant so callers can show a
//! meaningful message instead of a generic failure. Validation problems in
//! bulk ingestion are skip-counted, not raised; single-record operations
//! abort on the first violated precondition.

use backstock_db::DbError;
use thiserror::Error;

/// Result alias for audit domain operations.
pub type Result<T> = std::result::Result<T, AuditError>;

/// Audit domain errors.
#[derive(Debug, Error)]
pub enum AuditError {
    /// An audit with this name already exists.
    #[error("An audit named '{0}' already exists")]
    NameExists(String),

    /// Runtime namespace provisioning failed; the audit was not created.
    #[error("Runtime store provisioning failed: {0}")]
    Provisioning(#[source] DbError),

    /// The audit was not found.
    #[error("Audit not found")]
    AuditNotFound,

    /// The audit has been purged; no further mutation is allowed.
    #[error("Audit is already purged")]
    AuditPurged,

    /// The operation requires an active audit.
    #[error("Audit is not active")]
    AuditNotActive,

    /// The outlet is not part of this audit.
    #[error("Outlet not part of this audit")]
    OutletNotInAudit,

    /// The outlet's stocktake has been submitted; further scans are locked out.
    #[error("Outlet audit already submitted")]
    OutletSubmitted,

    /// A barcode is required for scanning.
    #[error("Barcode is required for scanning")]
    EmptyBarcode,

    /// The user has no assignment for this outlet in this audit.
    #[error("User is not assigned to this outlet for the audit")]
    NotAssigned,

    /// The assignment was not found.
    #[error("Assignment not found")]
    AssignmentNotFound,

    /// The assignment was already submitted and is immutable.
    #[error("Assignment already submitted")]
    AssignmentSubmitted,

    /// Outlet submission requires every assignment to be submitted first.
    #[error("All assignments must be submitted before outlet submission ({open} still open)")]
    OpenAssignments { open: i64 },

    /// Underlying store failure.
    #[error(transparent)]
    Store(#[from] DbError),
}
