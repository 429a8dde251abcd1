//! Scan ledger operations.
//!
//! Scans are independent appends: many devices write concurrently without
//! coordinating. Correctness comes from the precondition chain (audit active,
//! outlet open, assignment not submitted) plus the guarded transitions in the
//! store, so a scan racing a submission either lands before the lock or is
//! rejected, never half-applied.

use std::sync::Arc;

use rust_decimal::Decimal;

use backstock_core::text::normalize_barcode;
use backstock_core::{AssignmentId, AuditId, AuditOutletId, OutletId};
use backstock_db::models::{
    Audit, AuditAssignment, AuditOutlet, AuditStatus, AssignmentStatus, SubmissionStatus,
};
use backstock_db::runtime::NewScanEvent;

use crate::error::{AuditError, Result};
use crate::runtime_store::RuntimeStore;
use crate::store::AuditStore;

/// One field scan to record.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub barcode: String,
    pub outlet_id: OutletId,
    /// Defaults to 1 when the device sends no quantity.
    pub qty: Option<Decimal>,
    pub user_name: String,
    pub assignment_id: Option<AssignmentId>,
    pub device_ref: Option<String>,
}

/// Result of submitting an outlet's stocktake.
#[derive(Debug, Clone)]
pub struct SubmitOutletOutcome {
    pub outlet: AuditOutlet,
    /// Audit after the submission, `awaiting_admin` when this was the last
    /// open outlet.
    pub audit: Audit,
}

/// Scan recording and submission operations.
#[derive(Clone)]
pub struct ScanService {
    audits: Arc<dyn AuditStore>,
    runtime: Arc<dyn RuntimeStore>,
}

impl ScanService {
    #[must_use]
    pub fn new(audits: Arc<dyn AuditStore>, runtime: Arc<dyn RuntimeStore>) -> Self {
        Self { audits, runtime }
    }

    /// Record one scan event.
    ///
    /// The first scan of an assignment flips it `assigned` -> `active`;
    /// subsequent scans leave it untouched.
    pub async fn record_scan(
        &self,
        audit_id: AuditId,
        request: ScanRequest,
    ) -> Result<AuditAssignment> {
        self.require_active(audit_id).await?;

        let barcode = normalize_barcode(&request.barcode);
        if barcode.is_empty() {
            return Err(AuditError::EmptyBarcode);
        }

        let link = self
            .audits
            .find_outlet(audit_id, request.outlet_id)
            .await?
            .ok_or(AuditError::OutletNotInAudit)?;
        if link.submission_status == SubmissionStatus::Submitted {
            return Err(AuditError::OutletSubmitted);
        }

        let assignment = self
            .audits
            .find_assignment_for_scan(
                audit_id,
                request.outlet_id,
                &request.user_name,
                request.assignment_id,
            )
            .await?
            .ok_or(AuditError::NotAssigned)?;
        if assignment.status == AssignmentStatus::Submitted {
            return Err(AuditError::AssignmentSubmitted);
        }

        self.runtime
            .append_scan(
                audit_id,
                &NewScanEvent {
                    barcode,
                    outlet_id: request.outlet_id.into_uuid(),
                    qty: request.qty.unwrap_or(Decimal::ONE),
                    user_name: request.user_name.clone(),
                    assignment_id: Some(assignment.id),
                    device_ref: request.device_ref,
                },
            )
            .await?;

        let assignment = self
            .audits
            .mark_assignment_active_if_assigned(AssignmentId::from_uuid(assignment.id))
            .await?
            .unwrap_or(assignment);

        Ok(assignment)
    }

    /// Submit one assignment, freezing it.
    pub async fn submit_assignment(
        &self,
        audit_id: AuditId,
        assignment_id: AssignmentId,
    ) -> Result<AuditAssignment> {
        self.require_active(audit_id).await?;

        let assignment = self
            .audits
            .get_assignment(audit_id, assignment_id)
            .await?
            .ok_or(AuditError::AssignmentNotFound)?;

        let link = self
            .audits
            .find_outlet(audit_id, OutletId::from_uuid(assignment.outlet_id))
            .await?
            .ok_or(AuditError::OutletNotInAudit)?;
        if link.submission_status == SubmissionStatus::Submitted {
            return Err(AuditError::OutletSubmitted);
        }

        self.audits
            .mark_assignment_submitted(assignment_id)
            .await?
            .ok_or(AuditError::AssignmentSubmitted)
    }

    /// Submit an outlet's stocktake, locking out further scans.
    ///
    /// Requires every assignment of the outlet to be submitted first. When
    /// this was the audit's last open outlet, the audit moves to
    /// `awaiting_admin`.
    pub async fn submit_outlet(
        &self,
        audit_id: AuditId,
        outlet_id: OutletId,
        submitted_by: Option<&str>,
    ) -> Result<SubmitOutletOutcome> {
        self.require_active(audit_id).await?;

        let link = self
            .audits
            .find_outlet(audit_id, outlet_id)
            .await?
            .ok_or(AuditError::OutletNotInAudit)?;

        let open = self
            .audits
            .count_open_assignments(audit_id, outlet_id)
            .await?;
        if open > 0 {
            return Err(AuditError::OpenAssignments { open });
        }

        let outlet = self
            .audits
            .mark_outlet_submitted_if_open(AuditOutletId::from_uuid(link.id), submitted_by)
            .await?
            .ok_or(AuditError::OutletSubmitted)?;

        // Cheap derived check; outlet counts per audit are small.
        if self.audits.count_unsubmitted_outlets(audit_id).await? == 0 {
            self.audits
                .transition_status(audit_id, &[AuditStatus::Active], AuditStatus::AwaitingAdmin)
                .await?;
        }

        let audit = self
            .audits
            .get_audit(audit_id)
            .await?
            .ok_or(AuditError::AuditNotFound)?;
        tracing::info!(audit_id = %audit_id, outlet_id = %outlet_id, status = %audit.status, "outlet submitted");
        Ok(SubmitOutletOutcome { outlet, audit })
    }

    async fn require_active(&self, audit_id: AuditId) -> Result<Audit> {
        let audit = self
            .audits
            .get_audit(audit_id)
            .await?
            .ok_or(AuditError::AuditNotFound)?;
        if audit.status != AuditStatus::Active {
            return Err(AuditError::AuditNotActive);
        }
        Ok(audit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    use backstock_db::models::NewAudit;

    use crate::runtime_store::InMemoryRuntimeStore;
    use crate::store::InMemoryAuditStore;

    struct Fixture {
        service: ScanService,
        audits: Arc<InMemoryAuditStore>,
        runtime: Arc<InMemoryRuntimeStore>,
        audit_id: AuditId,
        outlet_id: OutletId,
    }

    impl Fixture {
        async fn assign(&self, user: &str) -> AuditAssignment {
            let link = self
                .audits
                .find_outlet(self.audit_id, self.outlet_id)
                .await
                .unwrap()
                .unwrap();
            self.audits
                .create_assignment(
                    self.audit_id,
                    AuditOutletId::from_uuid(link.id),
                    self.outlet_id,
                    user,
                    None,
                )
                .await
                .unwrap()
        }

        fn scan(&self, barcode: &str, qty: Decimal, user: &str) -> ScanRequest {
            ScanRequest {
                barcode: barcode.to_string(),
                outlet_id: self.outlet_id,
                qty: Some(qty),
                user_name: user.to_string(),
                assignment_id: None,
                device_ref: None,
            }
        }
    }

    async fn fixture() -> Fixture {
        let audits = Arc::new(InMemoryAuditStore::new());
        let runtime = Arc::new(InMemoryRuntimeStore::new());
        let audit = audits
            .create_audit(NewAudit {
                name: "Q1 stocktake".to_string(),
                start_date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
                expiry_date: NaiveDate::from_ymd_opt(2025, 4, 7).unwrap(),
                created_by: None,
            })
            .await
            .unwrap();
        let audit_id = AuditId::from_uuid(audit.id);
        let outlet_id = OutletId::new();
        audits.add_outlet(audit_id, outlet_id).await.unwrap();
        audits
            .transition_status(
                audit_id,
                &[AuditStatus::PendingAcceptance],
                AuditStatus::Active,
            )
            .await
            .unwrap();
        runtime.ensure(audit_id).await.unwrap();
        Fixture {
            service: ScanService::new(audits.clone(), runtime.clone()),
            audits,
            runtime,
            audit_id,
            outlet_id,
        }
    }

    #[tokio::test]
    async fn test_first_scan_activates_assignment() {
        let f = fixture().await;
        let assignment = f.assign("ravi").await;
        assert_eq!(assignment.status, AssignmentStatus::Assigned);

        let after = f
            .service
            .record_scan(f.audit_id, f.scan("123", dec!(5), "ravi"))
            .await
            .unwrap();
        assert_eq!(after.status, AssignmentStatus::Active);
        assert!(after.started_at.is_some());

        // Second scan is a no-op on the assignment status.
        let again = f
            .service
            .record_scan(f.audit_id, f.scan("123", dec!(2), "ravi"))
            .await
            .unwrap();
        assert_eq!(again.status, AssignmentStatus::Active);

        let totals = f.runtime.scanned_totals(f.audit_id, None).await.unwrap();
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].scanned_qty, dec!(7));
    }

    #[tokio::test]
    async fn test_scan_preconditions() {
        let f = fixture().await;
        f.assign("ravi").await;

        let err = f
            .service
            .record_scan(f.audit_id, f.scan("  ", dec!(1), "ravi"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::EmptyBarcode));

        let err = f
            .service
            .record_scan(
                f.audit_id,
                ScanRequest {
                    outlet_id: OutletId::new(),
                    ..f.scan("123", dec!(1), "ravi")
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::OutletNotInAudit));

        let err = f
            .service
            .record_scan(f.audit_id, f.scan("123", dec!(1), "priya"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::NotAssigned));
    }

    #[tokio::test]
    async fn test_scan_rejected_when_audit_not_active() {
        let f = fixture().await;
        f.assign("ravi").await;
        f.audits
            .transition_status(f.audit_id, &[AuditStatus::Active], AuditStatus::Rejected)
            .await
            .unwrap();

        let err = f
            .service
            .record_scan(f.audit_id, f.scan("123", dec!(1), "ravi"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::AuditNotActive));
    }

    #[tokio::test]
    async fn test_submit_outlet_requires_all_assignments_submitted() {
        let f = fixture().await;
        let a1 = f.assign("ravi").await;
        let a2 = f.assign("priya").await;

        f.service
            .submit_assignment(f.audit_id, AssignmentId::from_uuid(a1.id))
            .await
            .unwrap();

        let err = f
            .service
            .submit_outlet(f.audit_id, f.outlet_id, Some("manager"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::OpenAssignments { open: 1 }));

        f.service
            .submit_assignment(f.audit_id, AssignmentId::from_uuid(a2.id))
            .await
            .unwrap();
        let outcome = f
            .service
            .submit_outlet(f.audit_id, f.outlet_id, Some("manager"))
            .await
            .unwrap();
        assert_eq!(outcome.outlet.submission_status, SubmissionStatus::Submitted);
    }

    #[tokio::test]
    async fn test_scans_locked_out_after_outlet_submission() {
        let f = fixture().await;
        // A second open outlet keeps the audit active after this one submits.
        f.audits
            .add_outlet(f.audit_id, OutletId::new())
            .await
            .unwrap();
        let a = f.assign("ravi").await;
        f.service
            .submit_assignment(f.audit_id, AssignmentId::from_uuid(a.id))
            .await
            .unwrap();
        f.service
            .submit_outlet(f.audit_id, f.outlet_id, None)
            .await
            .unwrap();

        let err = f
            .service
            .record_scan(f.audit_id, f.scan("123", dec!(1), "ravi"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::OutletSubmitted));
    }

    #[tokio::test]
    async fn test_last_outlet_submission_moves_audit_to_awaiting_admin() {
        let f = fixture().await;
        let other_outlet = OutletId::new();
        f.audits.add_outlet(f.audit_id, other_outlet).await.unwrap();

        let a = f.assign("ravi").await;
        f.service
            .submit_assignment(f.audit_id, AssignmentId::from_uuid(a.id))
            .await
            .unwrap();
        let outcome = f
            .service
            .submit_outlet(f.audit_id, f.outlet_id, None)
            .await
            .unwrap();
        assert_eq!(outcome.audit.status, AuditStatus::Active);

        let outcome = f
            .service
            .submit_outlet(f.audit_id, other_outlet, None)
            .await
            .unwrap();
        assert_eq!(outcome.audit.status, AuditStatus::AwaitingAdmin);
    }

    #[tokio::test]
    async fn test_submitted_assignment_cannot_be_resubmitted() {
        let f = fixture().await;
        let a = f.assign("ravi").await;
        let id = AssignmentId::from_uuid(a.id);
        f.service.submit_assignment(f.audit_id, id).await.unwrap();

        let err = f.service.submit_assignment(f.audit_id, id).await.unwrap_err();
        assert!(matches!(err, AuditError::AssignmentSubmitted));

        let err = f
            .service
            .record_scan(f.audit_id, f.scan("123", dec!(1), "ravi"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::AssignmentSubmitted));
    }
}
