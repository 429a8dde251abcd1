//! Expected-stock ingestion.
//!
//! Each upload replaces the audit's baseline wholesale: the latest spreadsheet
//! is authoritative. Bad rows never abort the batch; they are skip-counted and
//! the tally is returned to the caller and logged on the audit.

use std::sync::Arc;

use rust_decimal::Decimal;

use backstock_core::text::normalize_barcode;
use backstock_core::{AuditId, NormalizedRow};
use backstock_db::models::{AuditStatus, NewAuditUpload};
use backstock_db::runtime::ExpectedStockRow;

use crate::directory::Directory;
use crate::error::{AuditError, Result};
use crate::runtime_store::RuntimeStore;
use crate::store::AuditStore;

/// Canonical field names produced by the spreadsheet normalizer.
pub mod fields {
    pub const BARCODE: &str = "barcode";
    pub const OUTLET_NAME: &str = "outlet_name";
    pub const ARTICLE_NAME: &str = "article_name";
    pub const BOOK_QTY: &str = "book_qty";
}

/// Tally of one ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOutcome {
    pub rows_ingested: i32,
    pub rows_skipped: i32,
}

/// Expected-stock ingestion operations.
#[derive(Clone)]
pub struct IngestService {
    audits: Arc<dyn AuditStore>,
    runtime: Arc<dyn RuntimeStore>,
    directory: Arc<dyn Directory>,
}

impl IngestService {
    #[must_use]
    pub fn new(
        audits: Arc<dyn AuditStore>,
        runtime: Arc<dyn RuntimeStore>,
        directory: Arc<dyn Directory>,
    ) -> Self {
        Self {
            audits,
            runtime,
            directory,
        }
    }

    /// Replace the audit's expected-stock baseline with the rows of one
    /// upload.
    ///
    /// Rows with an empty barcode or an unresolvable outlet are skipped, not
    /// fatal. Book quantity falls back to zero when missing or unparseable.
    /// The replace is all-or-nothing; a failed ingestion leaves the previous
    /// baseline intact.
    pub async fn ingest(
        &self,
        audit_id: AuditId,
        rows: &[NormalizedRow],
        uploaded_by: Option<&str>,
        filename: &str,
    ) -> Result<IngestOutcome> {
        let audit = self
            .audits
            .get_audit(audit_id)
            .await?
            .ok_or(AuditError::AuditNotFound)?;
        if audit.status == AuditStatus::Purged {
            return Err(AuditError::AuditPurged);
        }

        let mut expected = Vec::with_capacity(rows.len());
        let mut skipped = 0i32;

        for row in rows {
            let barcode = normalize_barcode(row.text(fields::BARCODE).unwrap_or_default());
            if barcode.is_empty() {
                skipped += 1;
                continue;
            }

            let outlet_name = row.text(fields::OUTLET_NAME).unwrap_or_default();
            let Some(outlet) = self.directory.resolve_outlet(outlet_name).await? else {
                skipped += 1;
                continue;
            };

            let product = self.directory.latest_active_product(&barcode).await?;

            let book_qty = row
                .decimal(fields::BOOK_QTY)
                .filter(|qty| *qty >= Decimal::ZERO)
                .unwrap_or(Decimal::ZERO);

            // Catalog attributes win; the row's article name is the fallback
            // for barcodes the catalog has never seen.
            let (article_name, division, section, department, category_6, product_id) =
                match product {
                    Some(p) => (
                        p.display_name()
                            .map(str::to_string)
                            .or_else(|| row.text(fields::ARTICLE_NAME).map(str::to_string)),
                        p.division.clone(),
                        p.section.clone(),
                        p.department.clone(),
                        p.category_6.clone(),
                        Some(p.id.into_uuid()),
                    ),
                    None => (
                        row.text(fields::ARTICLE_NAME).map(str::to_string),
                        None,
                        None,
                        None,
                        None,
                        None,
                    ),
                };

            expected.push(ExpectedStockRow {
                barcode,
                outlet_id: outlet.id.into_uuid(),
                article_name,
                division,
                section,
                department,
                category_6,
                product_id,
                book_qty,
                uploaded_by: uploaded_by.map(str::to_string),
            });
        }

        let ingested = expected.len() as i32;
        self.runtime.replace_expected(audit_id, &expected).await?;

        self.audits
            .record_upload(NewAuditUpload {
                audit_id: audit_id.into_uuid(),
                filename: filename.to_string(),
                rows_ingested: ingested,
                rows_skipped: skipped,
                uploaded_by: uploaded_by.map(str::to_string),
            })
            .await?;

        tracing::info!(
            audit_id = %audit_id,
            filename = %filename,
            ingested,
            skipped,
            "expected stock ingested"
        );
        Ok(IngestOutcome {
            rows_ingested: ingested,
            rows_skipped: skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    use backstock_core::{OutletId, ProductId};
    use backstock_db::models::NewAudit;

    use crate::directory::{CatalogProduct, InMemoryDirectory};
    use crate::runtime_store::InMemoryRuntimeStore;
    use crate::store::InMemoryAuditStore;

    struct Fixture {
        service: IngestService,
        audits: Arc<InMemoryAuditStore>,
        runtime: Arc<InMemoryRuntimeStore>,
        directory: Arc<InMemoryDirectory>,
        audit_id: AuditId,
    }

    async fn fixture() -> Fixture {
        let audits = Arc::new(InMemoryAuditStore::new());
        let runtime = Arc::new(InMemoryRuntimeStore::new());
        let directory = Arc::new(InMemoryDirectory::new());
        let audit = audits
            .create_audit(NewAudit {
                name: "Q1 stocktake".to_string(),
                start_date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
                expiry_date: NaiveDate::from_ymd_opt(2025, 4, 7).unwrap(),
                created_by: None,
            })
            .await
            .unwrap();
        Fixture {
            service: IngestService::new(audits.clone(), runtime.clone(), directory.clone()),
            audits,
            runtime,
            directory,
            audit_id: AuditId::from_uuid(audit.id),
        }
    }

    fn stock_row(barcode: &str, outlet: &str, qty: Decimal) -> NormalizedRow {
        NormalizedRow::new()
            .with(fields::BARCODE, barcode)
            .with(fields::OUTLET_NAME, outlet)
            .with(fields::BOOK_QTY, qty)
    }

    #[tokio::test]
    async fn test_skips_empty_barcode_and_unknown_outlet() {
        let f = fixture().await;
        f.directory.add_outlet(OutletId::new(), "Store A").await;

        let rows = vec![
            stock_row("8901", "Store A", dec!(10)),
            stock_row("", "Store A", dec!(5)),
            stock_row("8902", "Nowhere", dec!(5)),
        ];
        let outcome = f
            .service
            .ingest(f.audit_id, &rows, Some("admin"), "stock.xlsx")
            .await
            .unwrap();

        assert_eq!(outcome.rows_ingested, 1);
        assert_eq!(outcome.rows_skipped, 2);

        let uploads = f.audits.uploads().await;
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].filename, "stock.xlsx");
        assert_eq!(uploads[0].rows_ingested, 1);
        assert_eq!(uploads[0].rows_skipped, 2);
    }

    #[tokio::test]
    async fn test_second_upload_fully_replaces_first() {
        let f = fixture().await;
        f.directory.add_outlet(OutletId::new(), "Store A").await;

        f.service
            .ingest(
                f.audit_id,
                &[
                    stock_row("1111", "Store A", dec!(10)),
                    stock_row("2222", "Store A", dec!(20)),
                ],
                None,
                "first.xlsx",
            )
            .await
            .unwrap();
        f.service
            .ingest(
                f.audit_id,
                &[stock_row("3333", "Store A", dec!(7))],
                None,
                "second.xlsx",
            )
            .await
            .unwrap();

        let rows = f.runtime.expected_rows(f.audit_id, None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].barcode, "3333");
        assert_eq!(rows[0].book_qty, dec!(7));
    }

    #[tokio::test]
    async fn test_catalog_attributes_are_denormalized() {
        let f = fixture().await;
        f.directory.add_outlet(OutletId::new(), "Store A").await;
        f.directory
            .add_product(CatalogProduct {
                id: ProductId::new(),
                barcode: "8901".to_string(),
                article_name: Some("Blue Shirt 40".to_string()),
                division: Some("Apparel".to_string()),
                section: Some("Menswear".to_string()),
                department: Some("Shirts".to_string()),
                category_6: Some("Formal".to_string()),
                ..CatalogProduct::default()
            })
            .await;

        f.service
            .ingest(
                f.audit_id,
                &[stock_row("89 01", "store a", dec!(3))],
                None,
                "stock.xlsx",
            )
            .await
            .unwrap();

        let rows = f.runtime.expected_rows(f.audit_id, None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].barcode, "8901");
        assert_eq!(rows[0].article_name.as_deref(), Some("Blue Shirt 40"));
        assert_eq!(rows[0].division.as_deref(), Some("Apparel"));
        assert!(rows[0].product_id.is_some());
    }

    #[tokio::test]
    async fn test_unparseable_book_qty_defaults_to_zero() {
        let f = fixture().await;
        f.directory.add_outlet(OutletId::new(), "Store A").await;

        let row = NormalizedRow::new()
            .with(fields::BARCODE, "8901")
            .with(fields::OUTLET_NAME, "Store A")
            .with(fields::BOOK_QTY, "n/a");
        f.service
            .ingest(f.audit_id, &[row], None, "stock.xlsx")
            .await
            .unwrap();

        let rows = f.runtime.expected_rows(f.audit_id, None).await.unwrap();
        assert_eq!(rows[0].book_qty, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_purged_audit_refuses_ingestion() {
        let f = fixture().await;
        f.audits
            .transition_status(
                f.audit_id,
                &[AuditStatus::PendingAcceptance],
                AuditStatus::Purged,
            )
            .await
            .unwrap();

        let err = f
            .service
            .ingest(f.audit_id, &[], None, "stock.xlsx")
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::AuditPurged));
    }
}
