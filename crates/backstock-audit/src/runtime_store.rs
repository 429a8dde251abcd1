//! Runtime namespace storage.
//!
//! Wraps the per-audit isolated namespace (expected-stock baseline plus the
//! append-only scan ledger) behind a trait so services can run against an
//! in-memory double. Row types are shared with the database layer.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use backstock_core::AuditId;
use backstock_db::runtime::{
    ExpectedStockRow, NewScanEvent, ScanEvent, ScannedTotal, UserScanTotal,
};

use crate::error::Result;

/// Storage backend for per-audit runtime namespaces.
#[async_trait::async_trait]
pub trait RuntimeStore: Send + Sync {
    /// Provision the audit's namespace. Idempotent.
    async fn ensure(&self, audit_id: AuditId) -> Result<()>;

    /// Drop the audit's namespace and all data in it. Idempotent.
    async fn drop_namespace(&self, audit_id: AuditId) -> Result<()>;

    /// Replace the expected-stock baseline wholesale, all-or-nothing.
    async fn replace_expected(&self, audit_id: AuditId, rows: &[ExpectedStockRow]) -> Result<()>;

    /// Append one scan event.
    async fn append_scan(&self, audit_id: AuditId, event: &NewScanEvent) -> Result<()>;

    /// Expected-stock rows, optionally filtered to one outlet.
    async fn expected_rows(
        &self,
        audit_id: AuditId,
        outlet_id: Option<Uuid>,
    ) -> Result<Vec<ExpectedStockRow>>;

    /// Scanned-quantity sums per (barcode, outlet).
    async fn scanned_totals(
        &self,
        audit_id: AuditId,
        outlet_id: Option<Uuid>,
    ) -> Result<Vec<ScannedTotal>>;

    /// Scan activity per (user, outlet).
    async fn user_totals(
        &self,
        audit_id: AuditId,
        outlet_id: Option<Uuid>,
    ) -> Result<Vec<UserScanTotal>>;
}

#[derive(Debug, Default)]
struct Namespace {
    expected: Vec<ExpectedStockRow>,
    scans: Vec<ScanEvent>,
}

/// In-memory runtime store for testing. A dropped namespace reads back empty,
/// matching the database behavior of `DROP SCHEMA ... CASCADE`.
#[derive(Debug, Default)]
pub struct InMemoryRuntimeStore {
    namespaces: Arc<RwLock<HashMap<Uuid, Namespace>>>,
}

impl InMemoryRuntimeStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the audit's namespace currently exists (test inspection).
    pub async fn exists(&self, audit_id: AuditId) -> bool {
        self.namespaces
            .read()
            .await
            .contains_key(audit_id.as_uuid())
    }
}

#[async_trait::async_trait]
impl RuntimeStore for InMemoryRuntimeStore {
    async fn ensure(&self, audit_id: AuditId) -> Result<()> {
        self.namespaces
            .write()
            .await
            .entry(audit_id.into_uuid())
            .or_default();
        Ok(())
    }

    async fn drop_namespace(&self, audit_id: AuditId) -> Result<()> {
        self.namespaces.write().await.remove(audit_id.as_uuid());
        Ok(())
    }

    async fn replace_expected(&self, audit_id: AuditId, rows: &[ExpectedStockRow]) -> Result<()> {
        let mut namespaces = self.namespaces.write().await;
        let ns = namespaces.entry(audit_id.into_uuid()).or_default();
        ns.expected = rows.to_vec();
        Ok(())
    }

    async fn append_scan(&self, audit_id: AuditId, event: &NewScanEvent) -> Result<()> {
        let mut namespaces = self.namespaces.write().await;
        let ns = namespaces.entry(audit_id.into_uuid()).or_default();
        ns.scans.push(ScanEvent {
            id: Uuid::new_v4(),
            barcode: event.barcode.clone(),
            outlet_id: event.outlet_id,
            qty: event.qty,
            user_name: event.user_name.clone(),
            assignment_id: event.assignment_id,
            device_ref: event.device_ref.clone(),
            scanned_at: Utc::now(),
        });
        Ok(())
    }

    async fn expected_rows(
        &self,
        audit_id: AuditId,
        outlet_id: Option<Uuid>,
    ) -> Result<Vec<ExpectedStockRow>> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces
            .get(audit_id.as_uuid())
            .map(|ns| {
                ns.expected
                    .iter()
                    .filter(|r| outlet_id.is_none_or(|id| r.outlet_id == id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn scanned_totals(
        &self,
        audit_id: AuditId,
        outlet_id: Option<Uuid>,
    ) -> Result<Vec<ScannedTotal>> {
        let namespaces = self.namespaces.read().await;
        let Some(ns) = namespaces.get(audit_id.as_uuid()) else {
            return Ok(Vec::new());
        };
        let mut totals: HashMap<(String, Uuid), ScannedTotal> = HashMap::new();
        for scan in ns
            .scans
            .iter()
            .filter(|s| outlet_id.is_none_or(|id| s.outlet_id == id))
        {
            totals
                .entry((scan.barcode.clone(), scan.outlet_id))
                .and_modify(|t| t.scanned_qty += scan.qty)
                .or_insert_with(|| ScannedTotal {
                    barcode: scan.barcode.clone(),
                    outlet_id: scan.outlet_id,
                    scanned_qty: scan.qty,
                });
        }
        Ok(totals.into_values().collect())
    }

    async fn user_totals(
        &self,
        audit_id: AuditId,
        outlet_id: Option<Uuid>,
    ) -> Result<Vec<UserScanTotal>> {
        let namespaces = self.namespaces.read().await;
        let Some(ns) = namespaces.get(audit_id.as_uuid()) else {
            return Ok(Vec::new());
        };
        let mut totals: HashMap<(String, Uuid), UserScanTotal> = HashMap::new();
        for scan in ns
            .scans
            .iter()
            .filter(|s| outlet_id.is_none_or(|id| s.outlet_id == id))
        {
            totals
                .entry((scan.user_name.clone(), scan.outlet_id))
                .and_modify(|t| {
                    t.scan_count += 1;
                    t.total_qty += scan.qty;
                })
                .or_insert_with(|| UserScanTotal {
                    user_name: scan.user_name.clone(),
                    outlet_id: scan.outlet_id,
                    scan_count: 1,
                    total_qty: scan.qty,
                });
        }
        let mut rows: Vec<_> = totals.into_values().collect();
        rows.sort_by(|a, b| {
            a.user_name
                .cmp(&b.user_name)
                .then(a.outlet_id.cmp(&b.outlet_id))
        });
        Ok(rows)
    }
}
