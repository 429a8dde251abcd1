//! Book-vs-scanned summaries.
//!
//! Pure reads over one audit's runtime namespace. A purged audit simply
//! yields empty summaries since its namespace no longer exists.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use backstock_core::{AuditId, OutletId};
use backstock_db::runtime::UserScanTotal;

use crate::error::Result;
use crate::runtime_store::RuntimeStore;

/// Variance line for one (barcode, outlet) of the baseline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarcodeSummary {
    pub barcode: String,
    pub outlet_id: Uuid,
    pub article_name: Option<String>,
    pub division: Option<String>,
    pub section: Option<String>,
    pub department: Option<String>,
    pub category_6: Option<String>,
    pub book_qty: Decimal,
    pub scanned_qty: Decimal,
    /// `scanned - book`; negative means stock is missing.
    pub variance: Decimal,
    /// `book - scanned`; what is still left to scan.
    pub remaining: Decimal,
}

/// Variance rollup over one product hierarchy group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    pub division: Option<String>,
    pub section: Option<String>,
    pub department: Option<String>,
    pub category_6: Option<String>,
    pub book_qty: Decimal,
    pub scanned_qty: Decimal,
    pub variance: Decimal,
    pub remaining: Decimal,
}

/// Summary reads over an audit's runtime namespace.
#[derive(Clone)]
pub struct SummaryService {
    runtime: Arc<dyn RuntimeStore>,
}

impl SummaryService {
    #[must_use]
    pub fn new(runtime: Arc<dyn RuntimeStore>) -> Self {
        Self { runtime }
    }

    /// Per-barcode variance lines, optionally for one outlet.
    pub async fn per_barcode(
        &self,
        audit_id: AuditId,
        outlet_id: Option<OutletId>,
    ) -> Result<Vec<BarcodeSummary>> {
        let filter = outlet_id.map(OutletId::into_uuid);
        let expected = self.runtime.expected_rows(audit_id, filter).await?;
        let scanned = self.scanned_by_key(audit_id, filter).await?;

        let mut lines: Vec<BarcodeSummary> = expected
            .into_iter()
            .map(|row| {
                let scanned_qty = scanned
                    .get(&(row.barcode.clone(), row.outlet_id))
                    .copied()
                    .unwrap_or(Decimal::ZERO);
                BarcodeSummary {
                    variance: scanned_qty - row.book_qty,
                    remaining: row.book_qty - scanned_qty,
                    barcode: row.barcode,
                    outlet_id: row.outlet_id,
                    article_name: row.article_name,
                    division: row.division,
                    section: row.section,
                    department: row.department,
                    category_6: row.category_6,
                    book_qty: row.book_qty,
                    scanned_qty,
                }
            })
            .collect();
        lines.sort_by(|a, b| a.barcode.cmp(&b.barcode).then(a.outlet_id.cmp(&b.outlet_id)));
        Ok(lines)
    }

    /// Scan activity per (user, outlet).
    pub async fn per_user(
        &self,
        audit_id: AuditId,
        outlet_id: Option<OutletId>,
    ) -> Result<Vec<UserScanTotal>> {
        self.runtime
            .user_totals(audit_id, outlet_id.map(OutletId::into_uuid))
            .await
    }

    /// Variance rollups per (division, section, department, category).
    ///
    /// Scanned quantity only counts barcodes present in the baseline; stray
    /// scans of unknown barcodes never land in a category.
    pub async fn per_category(
        &self,
        audit_id: AuditId,
        outlet_id: Option<OutletId>,
    ) -> Result<Vec<CategorySummary>> {
        let filter = outlet_id.map(OutletId::into_uuid);
        let expected = self.runtime.expected_rows(audit_id, filter).await?;
        let scanned = self.scanned_by_key(audit_id, filter).await?;

        type GroupKey = (Option<String>, Option<String>, Option<String>, Option<String>);
        let mut groups: HashMap<GroupKey, (Decimal, Decimal)> = HashMap::new();
        for row in expected {
            let scanned_qty = scanned
                .get(&(row.barcode.clone(), row.outlet_id))
                .copied()
                .unwrap_or(Decimal::ZERO);
            let entry = groups
                .entry((row.division, row.section, row.department, row.category_6))
                .or_insert((Decimal::ZERO, Decimal::ZERO));
            entry.0 += row.book_qty;
            entry.1 += scanned_qty;
        }

        let mut rollups: Vec<CategorySummary> = groups
            .into_iter()
            .map(
                |((division, section, department, category_6), (book_qty, scanned_qty))| {
                    CategorySummary {
                        division,
                        section,
                        department,
                        category_6,
                        book_qty,
                        scanned_qty,
                        variance: scanned_qty - book_qty,
                        remaining: book_qty - scanned_qty,
                    }
                },
            )
            .collect();
        rollups.sort_by(|a, b| {
            (&a.division, &a.section, &a.department, &a.category_6).cmp(&(
                &b.division,
                &b.section,
                &b.department,
                &b.category_6,
            ))
        });
        Ok(rollups)
    }

    async fn scanned_by_key(
        &self,
        audit_id: AuditId,
        outlet_id: Option<Uuid>,
    ) -> Result<HashMap<(String, Uuid), Decimal>> {
        Ok(self
            .runtime
            .scanned_totals(audit_id, outlet_id)
            .await?
            .into_iter()
            .map(|t| ((t.barcode, t.outlet_id), t.scanned_qty))
            .collect())
    }
}
