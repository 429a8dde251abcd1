//! Audit lifecycle service.
//!
//! Owns the audit state machine: creation with synchronous runtime
//! provisioning, outlet acceptance (first accept activates the audit, any
//! rejection vetoes it outright), user assignment, and the irreversible purge.

use std::sync::Arc;

use chrono::NaiveDate;

use backstock_core::{AuditId, AuditOutletId, OutletId};
use backstock_db::models::{AcceptanceStatus, Audit, AuditAssignment, AuditStatus, NewAudit};
use backstock_db::schema_name;

use crate::error::{AuditError, Result};
use crate::runtime_store::RuntimeStore;
use crate::store::AuditStore;

/// Parameters for creating an audit.
#[derive(Debug, Clone)]
pub struct CreateAudit {
    pub name: String,
    pub start_date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub outlet_ids: Vec<OutletId>,
    pub created_by: Option<String>,
}

/// Audit lifecycle operations.
#[derive(Clone)]
pub struct LifecycleService {
    audits: Arc<dyn AuditStore>,
    runtime: Arc<dyn RuntimeStore>,
}

impl LifecycleService {
    #[must_use]
    pub fn new(audits: Arc<dyn AuditStore>, runtime: Arc<dyn RuntimeStore>) -> Self {
        Self { audits, runtime }
    }

    /// Create an audit with its outlet links and runtime namespace.
    ///
    /// Provisioning is synchronous: if the namespace cannot be created the
    /// audit row is removed again and no orphan survives.
    pub async fn create(&self, input: CreateAudit) -> Result<Audit> {
        if self.audits.find_by_name(&input.name).await?.is_some() {
            return Err(AuditError::NameExists(input.name));
        }

        let audit = self
            .audits
            .create_audit(NewAudit {
                name: input.name,
                start_date: input.start_date,
                expiry_date: input.expiry_date,
                created_by: input.created_by,
            })
            .await?;
        let audit_id = AuditId::from_uuid(audit.id);

        for outlet_id in &input.outlet_ids {
            self.audits.add_outlet(audit_id, *outlet_id).await?;
        }

        if let Err(err) = self.runtime.ensure(audit_id).await {
            self.audits.delete_audit(audit_id).await?;
            return Err(match err {
                AuditError::Store(db) => AuditError::Provisioning(db),
                other => other,
            });
        }

        let schema = schema_name(audit_id);
        self.audits.set_runtime_schema(audit_id, &schema).await?;

        tracing::info!(audit = %audit.name, schema = %schema, "audit created");
        self.require(audit_id).await
    }

    /// Record an outlet's acceptance decision.
    ///
    /// The first `accepted` while the audit is pending activates it. Any
    /// `rejected` flips the whole audit to `rejected`: one outlet's veto
    /// aborts the exercise for everyone.
    pub async fn accept_or_reject(
        &self,
        audit_id: AuditId,
        outlet_id: OutletId,
        actor: Option<&str>,
        decision: AcceptanceStatus,
    ) -> Result<Audit> {
        let audit = self.require(audit_id).await?;
        if audit.status == AuditStatus::Purged {
            return Err(AuditError::AuditPurged);
        }

        let link = self
            .audits
            .find_outlet(audit_id, outlet_id)
            .await?
            .ok_or(AuditError::OutletNotInAudit)?;

        self.audits
            .set_acceptance(AuditOutletId::from_uuid(link.id), decision, actor)
            .await?;

        match decision {
            AcceptanceStatus::Accepted => {
                // No-op after the first acceptance already activated the audit.
                self.audits
                    .transition_status(
                        audit_id,
                        &[AuditStatus::PendingAcceptance],
                        AuditStatus::Active,
                    )
                    .await?;
            }
            AcceptanceStatus::Rejected => {
                self.audits
                    .transition_status(
                        audit_id,
                        &[
                            AuditStatus::PendingAcceptance,
                            AuditStatus::Active,
                            AuditStatus::AwaitingAdmin,
                        ],
                        AuditStatus::Rejected,
                    )
                    .await?;
            }
            AcceptanceStatus::Pending => {}
        }

        self.require(audit_id).await
    }

    /// Assign a user to scan an outlet of the audit.
    pub async fn assign_user(
        &self,
        audit_id: AuditId,
        outlet_id: OutletId,
        user_name: &str,
        assigned_by: Option<&str>,
    ) -> Result<AuditAssignment> {
        let audit = self.require(audit_id).await?;
        if audit.status == AuditStatus::Purged {
            return Err(AuditError::AuditPurged);
        }

        let link = self
            .audits
            .find_outlet(audit_id, outlet_id)
            .await?
            .ok_or(AuditError::OutletNotInAudit)?;

        self.audits
            .create_assignment(
                audit_id,
                AuditOutletId::from_uuid(link.id),
                outlet_id,
                user_name,
                assigned_by,
            )
            .await
    }

    /// Drop the audit's runtime namespace and mark the audit purged.
    ///
    /// The drop is idempotent, the status change is not: a purged audit can
    /// never be mutated again.
    pub async fn purge(&self, audit_id: AuditId) -> Result<Audit> {
        let audit = self.require(audit_id).await?;
        if audit.status == AuditStatus::Purged {
            return Err(AuditError::AuditPurged);
        }

        self.runtime.drop_namespace(audit_id).await?;

        self.audits
            .transition_status(
                audit_id,
                &[
                    AuditStatus::PendingAcceptance,
                    AuditStatus::Active,
                    AuditStatus::Rejected,
                    AuditStatus::AwaitingAdmin,
                ],
                AuditStatus::Purged,
            )
            .await?
            .ok_or(AuditError::AuditPurged)
    }

    async fn require(&self, audit_id: AuditId) -> Result<Audit> {
        self.audits
            .get_audit(audit_id)
            .await?
            .ok_or(AuditError::AuditNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime_store::InMemoryRuntimeStore;
    use crate::store::InMemoryAuditStore;

    fn service() -> (
        LifecycleService,
        Arc<InMemoryAuditStore>,
        Arc<InMemoryRuntimeStore>,
    ) {
        let audits = Arc::new(InMemoryAuditStore::new());
        let runtime = Arc::new(InMemoryRuntimeStore::new());
        (
            LifecycleService::new(audits.clone(), runtime.clone()),
            audits,
            runtime,
        )
    }

    fn create_input(name: &str, outlets: Vec<OutletId>) -> CreateAudit {
        CreateAudit {
            name: name.to_string(),
            start_date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            expiry_date: NaiveDate::from_ymd_opt(2025, 4, 7).unwrap(),
            outlet_ids: outlets,
            created_by: Some("admin".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_provisions_runtime_and_links_outlets() {
        let (service, audits, runtime) = service();
        let outlet_a = OutletId::new();
        let outlet_b = OutletId::new();

        let audit = service
            .create(create_input("Q1 stocktake", vec![outlet_a, outlet_b]))
            .await
            .unwrap();

        assert_eq!(audit.status, AuditStatus::PendingAcceptance);
        let audit_id = AuditId::from_uuid(audit.id);
        assert!(runtime.exists(audit_id).await);
        assert_eq!(audit.runtime_schema, Some(schema_name(audit_id)));
        assert_eq!(audits.list_outlets(audit_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_name_is_rejected() {
        let (service, _, _) = service();
        service
            .create(create_input("Q1 stocktake", vec![OutletId::new()]))
            .await
            .unwrap();

        let err = service
            .create(create_input("Q1 stocktake", vec![OutletId::new()]))
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::NameExists(_)));
    }

    #[tokio::test]
    async fn test_first_accept_activates_audit() {
        let (service, _, _) = service();
        let outlet = OutletId::new();
        let audit = service
            .create(create_input("Q1 stocktake", vec![outlet]))
            .await
            .unwrap();

        let audit = service
            .accept_or_reject(
                AuditId::from_uuid(audit.id),
                outlet,
                Some("manager"),
                AcceptanceStatus::Accepted,
            )
            .await
            .unwrap();
        assert_eq!(audit.status, AuditStatus::Active);
    }

    #[tokio::test]
    async fn test_single_outlet_rejection_vetoes_whole_audit() {
        let (service, _, _) = service();
        let outlet_a = OutletId::new();
        let outlet_b = OutletId::new();
        let audit = service
            .create(create_input("Q1 stocktake", vec![outlet_a, outlet_b]))
            .await
            .unwrap();
        let audit_id = AuditId::from_uuid(audit.id);

        service
            .accept_or_reject(audit_id, outlet_a, None, AcceptanceStatus::Accepted)
            .await
            .unwrap();
        let audit = service
            .accept_or_reject(audit_id, outlet_b, None, AcceptanceStatus::Rejected)
            .await
            .unwrap();

        assert_eq!(audit.status, AuditStatus::Rejected);
    }

    #[tokio::test]
    async fn test_decision_for_unlinked_outlet_fails() {
        let (service, _, _) = service();
        let audit = service
            .create(create_input("Q1 stocktake", vec![OutletId::new()]))
            .await
            .unwrap();

        let err = service
            .accept_or_reject(
                AuditId::from_uuid(audit.id),
                OutletId::new(),
                None,
                AcceptanceStatus::Accepted,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::OutletNotInAudit));
    }

    #[tokio::test]
    async fn test_purge_drops_namespace_and_is_terminal() {
        let (service, _, runtime) = service();
        let outlet = OutletId::new();
        let audit = service
            .create(create_input("Q1 stocktake", vec![outlet]))
            .await
            .unwrap();
        let audit_id = AuditId::from_uuid(audit.id);

        let purged = service.purge(audit_id).await.unwrap();
        assert_eq!(purged.status, AuditStatus::Purged);
        assert!(purged.purged_at.is_some());
        assert!(!runtime.exists(audit_id).await);

        let err = service.purge(audit_id).await.unwrap_err();
        assert!(matches!(err, AuditError::AuditPurged));

        let err = service
            .accept_or_reject(audit_id, outlet, None, AcceptanceStatus::Accepted)
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::AuditPurged));
    }

    #[tokio::test]
    async fn test_assign_user_requires_linked_outlet() {
        let (service, _, _) = service();
        let outlet = OutletId::new();
        let audit = service
            .create(create_input("Q1 stocktake", vec![outlet]))
            .await
            .unwrap();
        let audit_id = AuditId::from_uuid(audit.id);

        let assignment = service
            .assign_user(audit_id, outlet, "ravi", Some("admin"))
            .await
            .unwrap();
        assert_eq!(assignment.user_name, "ravi");

        let err = service
            .assign_user(audit_id, OutletId::new(), "ravi", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::OutletNotInAudit));
    }
}
