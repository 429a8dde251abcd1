//! Stocktake audit lifecycle models.
//!
//! Status transitions use guarded UPDATEs: the expected current status is part
//! of the WHERE clause, so a transition racing a concurrent submit or scan
//! re-verifies its precondition at commit time and reports back whether it
//! actually happened.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

/// Audit lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    /// Created; waiting for the first outlet to accept.
    PendingAcceptance,
    /// At least one outlet accepted; scanning allowed.
    Active,
    /// An outlet rejected; terminal.
    Rejected,
    /// Every outlet submitted; waiting on back-office review.
    AwaitingAdmin,
    /// Runtime data dropped; terminal.
    Purged,
}

impl std::fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditStatus::PendingAcceptance => write!(f, "pending_acceptance"),
            AuditStatus::Active => write!(f, "active"),
            AuditStatus::Rejected => write!(f, "rejected"),
            AuditStatus::AwaitingAdmin => write!(f, "awaiting_admin"),
            AuditStatus::Purged => write!(f, "purged"),
        }
    }
}

impl std::str::FromStr for AuditStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_acceptance" => Ok(AuditStatus::PendingAcceptance),
            "active" => Ok(AuditStatus::Active),
            "rejected" => Ok(AuditStatus::Rejected),
            "awaiting_admin" => Ok(AuditStatus::AwaitingAdmin),
            "purged" => Ok(AuditStatus::Purged),
            _ => Err(format!("Invalid audit status: {s}")),
        }
    }
}

/// Outlet acceptance decision state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AcceptanceStatus {
    Pending,
    Accepted,
    Rejected,
}

impl std::fmt::Display for AcceptanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AcceptanceStatus::Pending => write!(f, "pending"),
            AcceptanceStatus::Accepted => write!(f, "accepted"),
            AcceptanceStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// Outlet submission lock state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Open,
    Submitted,
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmissionStatus::Open => write!(f, "open"),
            SubmissionStatus::Submitted => write!(f, "submitted"),
        }
    }
}

/// Scan assignment state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    /// Created, no scan yet.
    Assigned,
    /// First scan recorded.
    Active,
    /// Submitted; immutable from here.
    Submitted,
}

impl std::fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssignmentStatus::Assigned => write!(f, "assigned"),
            AssignmentStatus::Active => write!(f, "active"),
            AssignmentStatus::Submitted => write!(f, "submitted"),
        }
    }
}

/// A stocktake audit.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Audit {
    /// Unique identifier.
    pub id: Uuid,
    /// Unique audit name.
    pub name: String,
    /// First day of the exercise.
    pub start_date: NaiveDate,
    /// Last day of the exercise.
    pub expiry_date: NaiveDate,
    /// Lifecycle status.
    pub status: AuditStatus,
    /// Name of the isolated runtime schema; stamped after provisioning.
    pub runtime_schema: Option<String>,
    /// Who created the audit.
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// When the runtime data was dropped.
    pub purged_at: Option<DateTime<Utc>>,
}

/// An (audit, outlet) link.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditOutlet {
    pub id: Uuid,
    pub audit_id: Uuid,
    pub outlet_id: Uuid,
    pub acceptance_status: AcceptanceStatus,
    pub accepted_by: Option<String>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub submission_status: SubmissionStatus,
    pub submitted_by: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// An (audit, outlet, user) scan assignment.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditAssignment {
    pub id: Uuid,
    pub audit_id: Uuid,
    pub audit_outlet_id: Option<Uuid>,
    pub outlet_id: Uuid,
    pub user_name: String,
    pub status: AssignmentStatus,
    pub assigned_by: Option<String>,
    pub assigned_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Immutable record of one expected-stock ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditUpload {
    pub id: Uuid,
    pub audit_id: Uuid,
    pub filename: String,
    pub rows_ingested: i32,
    pub rows_skipped: i32,
    pub uploaded_by: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

/// Input for creating an audit.
#[derive(Debug, Clone)]
pub struct NewAudit {
    pub name: String,
    pub start_date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub created_by: Option<String>,
}

/// Input for logging an expected-stock upload.
#[derive(Debug, Clone)]
pub struct NewAuditUpload {
    pub audit_id: Uuid,
    pub filename: String,
    pub rows_ingested: i32,
    pub rows_skipped: i32,
    pub uploaded_by: Option<String>,
}

const AUDIT_COLUMNS: &str = r"id, name, start_date, expiry_date, status, runtime_schema,
    created_by, created_at, updated_at, purged_at";

const OUTLET_COLUMNS: &str = r"id, audit_id, outlet_id, acceptance_status, accepted_by,
    accepted_at, submission_status, submitted_by, submitted_at";

const ASSIGNMENT_COLUMNS: &str = r"id, audit_id, audit_outlet_id, outlet_id, user_name,
    status, assigned_by, assigned_at, started_at, completed_at, submitted_at";

impl Audit {
    /// Create a new audit in `pending_acceptance`.
    pub async fn create<'e, E>(executor: E, input: NewAudit) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(&format!(
            r"
            INSERT INTO audits (name, start_date, expiry_date, created_by)
            VALUES ($1, $2, $3, $4)
            RETURNING {AUDIT_COLUMNS}
            "
        ))
        .bind(&input.name)
        .bind(input.start_date)
        .bind(input.expiry_date)
        .bind(&input.created_by)
        .fetch_one(executor)
        .await
    }

    /// Get an audit by ID.
    pub async fn get<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(&format!(
            r"SELECT {AUDIT_COLUMNS} FROM audits WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Find an audit by its unique name.
    pub async fn find_by_name<'e, E>(executor: E, name: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(&format!(
            r"SELECT {AUDIT_COLUMNS} FROM audits WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(executor)
        .await
    }

    /// Stamp the runtime schema name after provisioning succeeds.
    pub async fn set_runtime_schema<'e, E>(
        executor: E,
        id: Uuid,
        schema: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(&format!(
            r"
            UPDATE audits SET runtime_schema = $2, updated_at = now()
            WHERE id = $1
            RETURNING {AUDIT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(schema)
        .fetch_optional(executor)
        .await
    }

    /// Guarded status transition: only applies when the current status is in
    /// `from`. Returns the updated row, or `None` if the guard did not match.
    pub async fn transition_status<'e, E>(
        executor: E,
        id: Uuid,
        from: &[AuditStatus],
        to: AuditStatus,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let from: Vec<String> = from.iter().map(ToString::to_string).collect();
        sqlx::query_as::<_, Self>(&format!(
            r"
            UPDATE audits
            SET status = $2,
                updated_at = now(),
                purged_at = CASE WHEN $2 = 'purged' THEN now() ELSE purged_at END
            WHERE id = $1 AND status = ANY($3)
            RETURNING {AUDIT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(to)
        .bind(&from)
        .fetch_optional(executor)
        .await
    }

    /// Remove an audit row (provisioning-failure cleanup; children cascade).
    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(r"DELETE FROM audits WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

impl AuditOutlet {
    /// Link an outlet to an audit (acceptance pending, submission open).
    pub async fn create<'e, E>(
        executor: E,
        audit_id: Uuid,
        outlet_id: Uuid,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(&format!(
            r"
            INSERT INTO audit_outlets (audit_id, outlet_id)
            VALUES ($1, $2)
            RETURNING {OUTLET_COLUMNS}
            "
        ))
        .bind(audit_id)
        .bind(outlet_id)
        .fetch_one(executor)
        .await
    }

    /// Find the link row for (audit, outlet).
    pub async fn find<'e, E>(
        executor: E,
        audit_id: Uuid,
        outlet_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(&format!(
            r"
            SELECT {OUTLET_COLUMNS} FROM audit_outlets
            WHERE audit_id = $1 AND outlet_id = $2
            "
        ))
        .bind(audit_id)
        .bind(outlet_id)
        .fetch_optional(executor)
        .await
    }

    /// All outlet links of an audit.
    pub async fn list_for_audit<'e, E>(executor: E, audit_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(&format!(
            r"SELECT {OUTLET_COLUMNS} FROM audit_outlets WHERE audit_id = $1"
        ))
        .bind(audit_id)
        .fetch_all(executor)
        .await
    }

    /// Record an acceptance decision.
    pub async fn set_acceptance<'e, E>(
        executor: E,
        id: Uuid,
        decision: AcceptanceStatus,
        actor: Option<&str>,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(&format!(
            r"
            UPDATE audit_outlets
            SET acceptance_status = $2, accepted_by = $3, accepted_at = now()
            WHERE id = $1
            RETURNING {OUTLET_COLUMNS}
            "
        ))
        .bind(id)
        .bind(decision)
        .bind(actor)
        .fetch_optional(executor)
        .await
    }

    /// Mark the outlet submitted, only if it is still open.
    pub async fn mark_submitted_if_open<'e, E>(
        executor: E,
        id: Uuid,
        submitted_by: Option<&str>,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(&format!(
            r"
            UPDATE audit_outlets
            SET submission_status = 'submitted', submitted_by = $2, submitted_at = now()
            WHERE id = $1 AND submission_status = 'open'
            RETURNING {OUTLET_COLUMNS}
            "
        ))
        .bind(id)
        .bind(submitted_by)
        .fetch_optional(executor)
        .await
    }

    /// Number of outlets of the audit not yet submitted.
    pub async fn count_unsubmitted<'e, E>(executor: E, audit_id: Uuid) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let row: (i64,) = sqlx::query_as(
            r"
            SELECT COUNT(*) FROM audit_outlets
            WHERE audit_id = $1 AND submission_status <> 'submitted'
            ",
        )
        .bind(audit_id)
        .fetch_one(executor)
        .await?;
        Ok(row.0)
    }
}

impl AuditAssignment {
    /// Create an assignment in `assigned`.
    pub async fn create<'e, E>(
        executor: E,
        audit_id: Uuid,
        audit_outlet_id: Uuid,
        outlet_id: Uuid,
        user_name: &str,
        assigned_by: Option<&str>,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(&format!(
            r"
            INSERT INTO audit_assignments
                (audit_id, audit_outlet_id, outlet_id, user_name, assigned_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ASSIGNMENT_COLUMNS}
            "
        ))
        .bind(audit_id)
        .bind(audit_outlet_id)
        .bind(outlet_id)
        .bind(user_name)
        .bind(assigned_by)
        .fetch_one(executor)
        .await
    }

    /// Get an assignment by ID within an audit.
    pub async fn get<'e, E>(
        executor: E,
        audit_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(&format!(
            r"
            SELECT {ASSIGNMENT_COLUMNS} FROM audit_assignments
            WHERE audit_id = $1 AND id = $2
            "
        ))
        .bind(audit_id)
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Resolve the assignment a scan belongs to: (audit, outlet, user), and
    /// optionally pinned to a specific assignment id.
    pub async fn find_for_scan<'e, E>(
        executor: E,
        audit_id: Uuid,
        outlet_id: Uuid,
        user_name: &str,
        assignment_id: Option<Uuid>,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(&format!(
            r"
            SELECT {ASSIGNMENT_COLUMNS} FROM audit_assignments
            WHERE audit_id = $1 AND outlet_id = $2 AND user_name = $3
              AND ($4::uuid IS NULL OR id = $4)
            ORDER BY assigned_at
            LIMIT 1
            "
        ))
        .bind(audit_id)
        .bind(outlet_id)
        .bind(user_name)
        .bind(assignment_id)
        .fetch_optional(executor)
        .await
    }

    /// First-scan transition: `assigned` -> `active`, stamping `started_at`.
    /// No-op when the assignment is already active or submitted.
    pub async fn mark_active_if_assigned<'e, E>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(&format!(
            r"
            UPDATE audit_assignments
            SET status = 'active', started_at = now()
            WHERE id = $1 AND status = 'assigned'
            RETURNING {ASSIGNMENT_COLUMNS}
            "
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Submit the assignment unless it is already submitted.
    pub async fn mark_submitted<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(&format!(
            r"
            UPDATE audit_assignments
            SET status = 'submitted',
                submitted_at = now(),
                completed_at = COALESCE(completed_at, now())
            WHERE id = $1 AND status <> 'submitted'
            RETURNING {ASSIGNMENT_COLUMNS}
            "
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Number of non-submitted assignments for an outlet of the audit.
    pub async fn count_open_for_outlet<'e, E>(
        executor: E,
        audit_id: Uuid,
        outlet_id: Uuid,
    ) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let row: (i64,) = sqlx::query_as(
            r"
            SELECT COUNT(*) FROM audit_assignments
            WHERE audit_id = $1 AND outlet_id = $2 AND status <> 'submitted'
            ",
        )
        .bind(audit_id)
        .bind(outlet_id)
        .fetch_one(executor)
        .await?;
        Ok(row.0)
    }
}

impl AuditUpload {
    /// Record one expected-stock ingestion event. Never mutated afterwards.
    pub async fn create<'e, E>(executor: E, input: NewAuditUpload) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            INSERT INTO audit_uploads (audit_id, filename, rows_ingested, rows_skipped, uploaded_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, audit_id, filename, rows_ingested, rows_skipped, uploaded_by, uploaded_at
            ",
        )
        .bind(input.audit_id)
        .bind(&input.filename)
        .bind(input.rows_ingested)
        .bind(input.rows_skipped)
        .bind(&input.uploaded_by)
        .fetch_one(executor)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display_roundtrip() {
        for status in [
            AuditStatus::PendingAcceptance,
            AuditStatus::Active,
            AuditStatus::Rejected,
            AuditStatus::AwaitingAdmin,
            AuditStatus::Purged,
        ] {
            let parsed: AuditStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        assert!("archived".parse::<AuditStatus>().is_err());
    }
}
