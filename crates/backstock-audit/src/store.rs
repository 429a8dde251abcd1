//! Audit lifecycle storage.
//!
//! The trait's mutating transitions are conditional: each carries its
//! precondition (expected current status) and reports whether it actually
//! applied. A submission racing a concurrent scan therefore serializes on the
//! guarded update instead of an explicit lock, and either ordering leaves the
//! rows consistent.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use backstock_core::{AssignmentId, AuditId, AuditOutletId, OutletId};
use backstock_db::models::{
    AcceptanceStatus, AssignmentStatus, Audit, AuditAssignment, AuditOutlet, AuditStatus,
    AuditUpload, NewAudit, NewAuditUpload, SubmissionStatus,
};

use crate::error::Result;

/// Storage backend for audits, outlet links, assignments and the upload log.
#[async_trait::async_trait]
pub trait AuditStore: Send + Sync {
    /// Create an audit in `pending_acceptance`.
    async fn create_audit(&self, input: NewAudit) -> Result<Audit>;

    /// Get an audit by ID.
    async fn get_audit(&self, id: AuditId) -> Result<Option<Audit>>;

    /// Find an audit by its unique name.
    async fn find_by_name(&self, name: &str) -> Result<Option<Audit>>;

    /// Stamp the runtime schema name after provisioning.
    async fn set_runtime_schema(&self, id: AuditId, schema: &str) -> Result<()>;

    /// Guarded status transition; `None` when the current status was not in
    /// `from`. A transition to `Purged` stamps `purged_at`.
    async fn transition_status(
        &self,
        id: AuditId,
        from: &[AuditStatus],
        to: AuditStatus,
    ) -> Result<Option<Audit>>;

    /// Remove an audit and its children (provisioning-failure cleanup).
    async fn delete_audit(&self, id: AuditId) -> Result<bool>;

    /// Link an outlet to an audit.
    async fn add_outlet(&self, audit_id: AuditId, outlet_id: OutletId) -> Result<AuditOutlet>;

    /// Find the (audit, outlet) link.
    async fn find_outlet(
        &self,
        audit_id: AuditId,
        outlet_id: OutletId,
    ) -> Result<Option<AuditOutlet>>;

    /// All outlet links of an audit.
    async fn list_outlets(&self, audit_id: AuditId) -> Result<Vec<AuditOutlet>>;

    /// Record an acceptance decision on a link row.
    async fn set_acceptance(
        &self,
        link_id: AuditOutletId,
        decision: AcceptanceStatus,
        actor: Option<&str>,
    ) -> Result<Option<AuditOutlet>>;

    /// Mark an outlet submitted only if it is still open.
    async fn mark_outlet_submitted_if_open(
        &self,
        link_id: AuditOutletId,
        submitted_by: Option<&str>,
    ) -> Result<Option<AuditOutlet>>;

    /// Outlets of the audit not yet submitted.
    async fn count_unsubmitted_outlets(&self, audit_id: AuditId) -> Result<i64>;

    /// Create an assignment in `assigned`.
    async fn create_assignment(
        &self,
        audit_id: AuditId,
        link_id: AuditOutletId,
        outlet_id: OutletId,
        user_name: &str,
        assigned_by: Option<&str>,
    ) -> Result<AuditAssignment>;

    /// Get an assignment by ID within an audit.
    async fn get_assignment(
        &self,
        audit_id: AuditId,
        id: AssignmentId,
    ) -> Result<Option<AuditAssignment>>;

    /// Resolve the assignment a scan belongs to.
    async fn find_assignment_for_scan(
        &self,
        audit_id: AuditId,
        outlet_id: OutletId,
        user_name: &str,
        assignment_id: Option<AssignmentId>,
    ) -> Result<Option<AuditAssignment>>;

    /// First-scan transition `assigned` -> `active`; `None` when already
    /// active or submitted.
    async fn mark_assignment_active_if_assigned(
        &self,
        id: AssignmentId,
    ) -> Result<Option<AuditAssignment>>;

    /// Submit the assignment unless already submitted.
    async fn mark_assignment_submitted(&self, id: AssignmentId)
        -> Result<Option<AuditAssignment>>;

    /// Non-submitted assignments for an outlet of the audit.
    async fn count_open_assignments(&self, audit_id: AuditId, outlet_id: OutletId) -> Result<i64>;

    /// Append one immutable upload log entry.
    async fn record_upload(&self, input: NewAuditUpload) -> Result<AuditUpload>;
}

/// In-memory audit store for testing.
#[derive(Debug, Default)]
pub struct InMemoryAuditStore {
    audits: Arc<RwLock<HashMap<Uuid, Audit>>>,
    outlets: Arc<RwLock<HashMap<Uuid, AuditOutlet>>>,
    assignments: Arc<RwLock<HashMap<Uuid, AuditAssignment>>>,
    uploads: Arc<RwLock<Vec<AuditUpload>>>,
}

impl InMemoryAuditStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded upload log entries (test inspection).
    pub async fn uploads(&self) -> Vec<AuditUpload> {
        self.uploads.read().await.clone()
    }
}

#[async_trait::async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn create_audit(&self, input: NewAudit) -> Result<Audit> {
        let now = Utc::now();
        let audit = Audit {
            id: Uuid::new_v4(),
            name: input.name,
            start_date: input.start_date,
            expiry_date: input.expiry_date,
            status: AuditStatus::PendingAcceptance,
            runtime_schema: None,
            created_by: input.created_by,
            created_at: now,
            updated_at: now,
            purged_at: None,
        };
        self.audits.write().await.insert(audit.id, audit.clone());
        Ok(audit)
    }

    async fn get_audit(&self, id: AuditId) -> Result<Option<Audit>> {
        Ok(self.audits.read().await.get(id.as_uuid()).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Audit>> {
        Ok(self
            .audits
            .read()
            .await
            .values()
            .find(|a| a.name == name)
            .cloned())
    }

    async fn set_runtime_schema(&self, id: AuditId, schema: &str) -> Result<()> {
        if let Some(audit) = self.audits.write().await.get_mut(id.as_uuid()) {
            audit.runtime_schema = Some(schema.to_string());
            audit.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn transition_status(
        &self,
        id: AuditId,
        from: &[AuditStatus],
        to: AuditStatus,
    ) -> Result<Option<Audit>> {
        let mut audits = self.audits.write().await;
        match audits.get_mut(id.as_uuid()) {
            Some(audit) if from.contains(&audit.status) => {
                audit.status = to;
                audit.updated_at = Utc::now();
                if to == AuditStatus::Purged {
                    audit.purged_at = Some(audit.updated_at);
                }
                Ok(Some(audit.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_audit(&self, id: AuditId) -> Result<bool> {
        let removed = self.audits.write().await.remove(id.as_uuid()).is_some();
        self.outlets
            .write()
            .await
            .retain(|_, o| o.audit_id != id.into_uuid());
        self.assignments
            .write()
            .await
            .retain(|_, a| a.audit_id != id.into_uuid());
        Ok(removed)
    }

    async fn add_outlet(&self, audit_id: AuditId, outlet_id: OutletId) -> Result<AuditOutlet> {
        let link = AuditOutlet {
            id: Uuid::new_v4(),
            audit_id: audit_id.into_uuid(),
            outlet_id: outlet_id.into_uuid(),
            acceptance_status: AcceptanceStatus::Pending,
            accepted_by: None,
            accepted_at: None,
            submission_status: SubmissionStatus::Open,
            submitted_by: None,
            submitted_at: None,
        };
        self.outlets.write().await.insert(link.id, link.clone());
        Ok(link)
    }

    async fn find_outlet(
        &self,
        audit_id: AuditId,
        outlet_id: OutletId,
    ) -> Result<Option<AuditOutlet>> {
        Ok(self
            .outlets
            .read()
            .await
            .values()
            .find(|o| o.audit_id == audit_id.into_uuid() && o.outlet_id == outlet_id.into_uuid())
            .cloned())
    }

    async fn list_outlets(&self, audit_id: AuditId) -> Result<Vec<AuditOutlet>> {
        Ok(self
            .outlets
            .read()
            .await
            .values()
            .filter(|o| o.audit_id == audit_id.into_uuid())
            .cloned()
            .collect())
    }

    async fn set_acceptance(
        &self,
        link_id: AuditOutletId,
        decision: AcceptanceStatus,
        actor: Option<&str>,
    ) -> Result<Option<AuditOutlet>> {
        let mut outlets = self.outlets.write().await;
        Ok(outlets.get_mut(link_id.as_uuid()).map(|link| {
            link.acceptance_status = decision;
            link.accepted_by = actor.map(str::to_string);
            link.accepted_at = Some(Utc::now());
            link.clone()
        }))
    }

    async fn mark_outlet_submitted_if_open(
        &self,
        link_id: AuditOutletId,
        submitted_by: Option<&str>,
    ) -> Result<Option<AuditOutlet>> {
        let mut outlets = self.outlets.write().await;
        match outlets.get_mut(link_id.as_uuid()) {
            Some(link) if link.submission_status == SubmissionStatus::Open => {
                link.submission_status = SubmissionStatus::Submitted;
                link.submitted_by = submitted_by.map(str::to_string);
                link.submitted_at = Some(Utc::now());
                Ok(Some(link.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn count_unsubmitted_outlets(&self, audit_id: AuditId) -> Result<i64> {
        Ok(self
            .outlets
            .read()
            .await
            .values()
            .filter(|o| {
                o.audit_id == audit_id.into_uuid()
                    && o.submission_status != SubmissionStatus::Submitted
            })
            .count() as i64)
    }

    async fn create_assignment(
        &self,
        audit_id: AuditId,
        link_id: AuditOutletId,
        outlet_id: OutletId,
        user_name: &str,
        assigned_by: Option<&str>,
    ) -> Result<AuditAssignment> {
        let assignment = AuditAssignment {
            id: Uuid::new_v4(),
            audit_id: audit_id.into_uuid(),
            audit_outlet_id: Some(link_id.into_uuid()),
            outlet_id: outlet_id.into_uuid(),
            user_name: user_name.to_string(),
            status: AssignmentStatus::Assigned,
            assigned_by: assigned_by.map(str::to_string),
            assigned_at: Utc::now(),
            started_at: None,
            completed_at: None,
            submitted_at: None,
        };
        self.assignments
            .write()
            .await
            .insert(assignment.id, assignment.clone());
        Ok(assignment)
    }

    async fn get_assignment(
        &self,
        audit_id: AuditId,
        id: AssignmentId,
    ) -> Result<Option<AuditAssignment>> {
        Ok(self
            .assignments
            .read()
            .await
            .get(id.as_uuid())
            .filter(|a| a.audit_id == audit_id.into_uuid())
            .cloned())
    }

    async fn find_assignment_for_scan(
        &self,
        audit_id: AuditId,
        outlet_id: OutletId,
        user_name: &str,
        assignment_id: Option<AssignmentId>,
    ) -> Result<Option<AuditAssignment>> {
        let assignments = self.assignments.read().await;
        let mut matches: Vec<_> = assignments
            .values()
            .filter(|a| {
                a.audit_id == audit_id.into_uuid()
                    && a.outlet_id == outlet_id.into_uuid()
                    && a.user_name == user_name
                    && assignment_id.is_none_or(|id| a.id == id.into_uuid())
            })
            .cloned()
            .collect();
        matches.sort_by_key(|a| a.assigned_at);
        Ok(matches.into_iter().next())
    }

    async fn mark_assignment_active_if_assigned(
        &self,
        id: AssignmentId,
    ) -> Result<Option<AuditAssignment>> {
        let mut assignments = self.assignments.write().await;
        match assignments.get_mut(id.as_uuid()) {
            Some(a) if a.status == AssignmentStatus::Assigned => {
                a.status = AssignmentStatus::Active;
                a.started_at = Some(Utc::now());
                Ok(Some(a.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn mark_assignment_submitted(
        &self,
        id: AssignmentId,
    ) -> Result<Option<AuditAssignment>> {
        let mut assignments = self.assignments.write().await;
        match assignments.get_mut(id.as_uuid()) {
            Some(a) if a.status != AssignmentStatus::Submitted => {
                a.status = AssignmentStatus::Submitted;
                let now = Utc::now();
                a.submitted_at = Some(now);
                a.completed_at = a.completed_at.or(Some(now));
                Ok(Some(a.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn count_open_assignments(&self, audit_id: AuditId, outlet_id: OutletId) -> Result<i64> {
        Ok(self
            .assignments
            .read()
            .await
            .values()
            .filter(|a| {
                a.audit_id == audit_id.into_uuid()
                    && a.outlet_id == outlet_id.into_uuid()
                    && a.status != AssignmentStatus::Submitted
            })
            .count() as i64)
    }

    async fn record_upload(&self, input: NewAuditUpload) -> Result<AuditUpload> {
        let upload = AuditUpload {
            id: Uuid::new_v4(),
            audit_id: input.audit_id,
            filename: input.filename,
            rows_ingested: input.rows_ingested,
            rows_skipped: input.rows_skipped,
            uploaded_by: input.uploaded_by,
            uploaded_at: Utc::now(),
        };
        self.uploads.write().await.push(upload.clone());
        Ok(upload)
    }
}
