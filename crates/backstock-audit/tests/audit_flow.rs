//! End-to-end audit flow over in-memory stores: creation with provisioning,
//! acceptance, scanning, submission chain, summaries and purge.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal_macros::dec;

use backstock_audit::{
    AuditError, CatalogProduct, CreateAudit, InMemoryAuditStore, InMemoryDirectory,
    InMemoryRuntimeStore, IngestService, LifecycleService, ScanRequest, ScanService,
    SummaryService,
};
use backstock_core::{AssignmentId, AuditId, NormalizedRow, OutletId, ProductId};
use backstock_db::models::{AcceptanceStatus, AssignmentStatus, AuditStatus};

struct Harness {
    lifecycle: LifecycleService,
    ingest: IngestService,
    scans: ScanService,
    summaries: SummaryService,
    directory: Arc<InMemoryDirectory>,
    runtime: Arc<InMemoryRuntimeStore>,
}

fn harness() -> Harness {
    let audits = Arc::new(InMemoryAuditStore::new());
    let runtime = Arc::new(InMemoryRuntimeStore::new());
    let directory = Arc::new(InMemoryDirectory::new());
    Harness {
        lifecycle: LifecycleService::new(audits.clone(), runtime.clone()),
        ingest: IngestService::new(audits.clone(), runtime.clone(), directory.clone()),
        scans: ScanService::new(audits.clone(), runtime.clone()),
        summaries: SummaryService::new(runtime.clone()),
        directory,
        runtime,
    }
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

fn scan(outlet: OutletId, barcode: &str, qty: rust_decimal::Decimal, user: &str) -> ScanRequest {
    ScanRequest {
        barcode: barcode.to_string(),
        outlet_id: outlet,
        qty: Some(qty),
        user_name: user.to_string(),
        assignment_id: None,
        device_ref: Some("HHT-01".to_string()),
    }
}

#[tokio::test]
async fn test_full_stocktake_round_trip() {
    let h = harness();
    let outlet_a = OutletId::new();
    let outlet_b = OutletId::new();
    h.directory.add_outlet(outlet_a, "Store A").await;
    h.directory.add_outlet(outlet_b, "Store B").await;
    h.directory
        .add_product(CatalogProduct {
            id: ProductId::new(),
            barcode: "999".to_string(),
            article_name: Some("Blue Shirt 40".to_string()),
            division: Some("Apparel".to_string()),
            ..CatalogProduct::default()
        })
        .await;

    // Create and activate.
    let audit = h
        .lifecycle
        .create(create_input("April cycle count", vec![outlet_a, outlet_b]))
        .await
        .unwrap();
    let audit_id = AuditId::from_uuid(audit.id);
    let audit = h
        .lifecycle
        .accept_or_reject(audit_id, outlet_a, Some("mgr-a"), AcceptanceStatus::Accepted)
        .await
        .unwrap();
    assert_eq!(audit.status, AuditStatus::Active);

    // Baseline: book qty 10 for barcode 999 at outlet A.
    let rows = vec![NormalizedRow::new()
        .with("barcode", "999")
        .with("outlet_name", "store a")
        .with("book_qty", dec!(10))];
    let outcome = h
        .ingest
        .ingest(audit_id, &rows, Some("admin"), "baseline.xlsx")
        .await
        .unwrap();
    assert_eq!(outcome.rows_ingested, 1);

    // Assign and scan 4 + 3.
    let assignment = h
        .lifecycle
        .assign_user(audit_id, outlet_a, "ravi", Some("admin"))
        .await
        .unwrap();
    assert_eq!(assignment.status, AssignmentStatus::Assigned);

    let after = h
        .scans
        .record_scan(audit_id, scan(outlet_a, "999", dec!(4), "ravi"))
        .await
        .unwrap();
    assert_eq!(after.status, AssignmentStatus::Active);
    h.scans
        .record_scan(audit_id, scan(outlet_a, "999", dec!(3), "ravi"))
        .await
        .unwrap();

    // Summary: scanned 7 against book 10.
    let lines = h.summaries.per_barcode(audit_id, None).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].scanned_qty, dec!(7));
    assert_eq!(lines[0].variance, dec!(-3));
    assert_eq!(lines[0].remaining, dec!(3));
    assert_eq!(lines[0].article_name.as_deref(), Some("Blue Shirt 40"));

    // Submission chain for outlet A.
    h.scans
        .submit_assignment(audit_id, AssignmentId::from_uuid(assignment.id))
        .await
        .unwrap();
    let outcome = h
        .scans
        .submit_outlet(audit_id, outlet_a, Some("mgr-a"))
        .await
        .unwrap();
    // Outlet B is still open, audit stays active.
    assert_eq!(outcome.audit.status, AuditStatus::Active);

    // Scans on the submitted outlet are locked out.
    let err = h
        .scans
        .record_scan(audit_id, scan(outlet_a, "999", dec!(1), "ravi"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuditError::OutletSubmitted));

    // Outlet B's rejection vetoes the whole audit.
    let audit = h
        .lifecycle
        .accept_or_reject(audit_id, outlet_b, Some("mgr-b"), AcceptanceStatus::Rejected)
        .await
        .unwrap();
    assert_eq!(audit.status, AuditStatus::Rejected);

    // Purge drops the runtime data; other audits are untouched.
    let other = h
        .lifecycle
        .create(create_input("May cycle count", vec![outlet_a]))
        .await
        .unwrap();
    let other_id = AuditId::from_uuid(other.id);

    let purged = h.lifecycle.purge(audit_id).await.unwrap();
    assert_eq!(purged.status, AuditStatus::Purged);
    assert!(h.summaries.per_barcode(audit_id, None).await.unwrap().is_empty());
    assert!(h.runtime.exists(other_id).await);
}
