//! Ledger ingestion.
//!
//! Uploads append facts; nothing here mutates history. Bad rows are counted
//! and skipped so one malformed line never sinks a whole spreadsheet. Raw
//! purchase rows are always preserved as uploaded; the processed purchase is
//! derived by joining against the outlet directory and product catalog.

use std::sync::Arc;

use rust_decimal::Decimal;

use backstock_core::text::normalize_barcode;
use backstock_core::NormalizedRow;
use backstock_db::models::{
    NewClosingStock, NewPurchase, NewPurchaseRaw, NewPurchaseReturn, NewSale,
};

use crate::error::Result;
use crate::store::{CatalogStore, LedgerStore, OutletResolver};

/// Canonical field names produced by the spreadsheet normalizer.
pub mod fields {
    pub const BARCODE: &str = "barcode";
    pub const OUTLET_NAME: &str = "outlet_name";
    pub const QTY: &str = "qty";
    pub const AS_OF_DATE: &str = "as_of_date";

    pub const SALE_AMOUNT: &str = "sale_amount";
    pub const SALE_DATE: &str = "sale_date";

    pub const ARTICLE_NAME: &str = "article_name";
    pub const INVOICE_NO: &str = "invoice_no";
    pub const ENTRY_NO: &str = "entry_no";
    pub const ENTRY_DATE: &str = "entry_date";
    pub const SUPPLIER_NAME: &str = "supplier_name";
    pub const CATEGORY_6: &str = "category_6";
    pub const AMOUNT: &str = "amount";

    pub const SITE_NAME: &str = "site_name";
    pub const HSN_CODE: &str = "hsn_code";
    pub const DIVISION: &str = "division";
    pub const SECTION: &str = "section";
    pub const DEPARTMENT: &str = "department";
    pub const ITEM_NAME: &str = "item_name";
    pub const PRODUCT_NAME: &str = "product_name";
    pub const BRAND_NAME: &str = "brand_name";
    pub const SIZE: &str = "size";
    pub const NET_AMOUNT: &str = "net_amount";
    pub const RSP: &str = "rsp";
    pub const MRP: &str = "mrp";
}

/// Tally of one ledger upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestTally {
    pub rows_ingested: i32,
    pub rows_skipped: i32,
}

/// Tally of one purchase upload. Raw rows are kept even when the processed
/// join fails, so the two counts differ.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurchaseTally {
    pub raw_rows: i32,
    pub processed_rows: i32,
    pub rows_skipped: i32,
}

/// Ledger upload operations.
#[derive(Clone)]
pub struct LedgerIngestService {
    ledgers: Arc<dyn LedgerStore>,
    catalog: Arc<dyn CatalogStore>,
    outlets: Arc<dyn OutletResolver>,
}

impl LedgerIngestService {
    #[must_use]
    pub fn new(
        ledgers: Arc<dyn LedgerStore>,
        catalog: Arc<dyn CatalogStore>,
        outlets: Arc<dyn OutletResolver>,
    ) -> Self {
        Self {
            ledgers,
            catalog,
            outlets,
        }
    }

    /// Append closing-stock snapshot rows. Quantity falls back to zero when
    /// unparseable; rows without barcode or a resolvable outlet are skipped.
    pub async fn ingest_closing_stock(
        &self,
        rows: &[NormalizedRow],
        uploaded_by: Option<&str>,
    ) -> Result<IngestTally> {
        let mut tally = IngestTally::default();
        for row in rows {
            let barcode = normalize_barcode(row.text(fields::BARCODE).unwrap_or_default());
            if barcode.is_empty() {
                tally.rows_skipped += 1;
                continue;
            }
            let Some(outlet_id) = self
                .outlets
                .resolve(row.text(fields::OUTLET_NAME).unwrap_or_default())
                .await?
            else {
                tally.rows_skipped += 1;
                continue;
            };

            self.ledgers
                .add_closing_stock(NewClosingStock {
                    outlet_id: outlet_id.into_uuid(),
                    barcode,
                    qty: row.decimal(fields::QTY).unwrap_or(Decimal::ZERO),
                    as_of_date: row.date(fields::AS_OF_DATE),
                    uploaded_by: uploaded_by.map(str::to_string),
                })
                .await?;
            tally.rows_ingested += 1;
        }
        tracing::info!(
            ingested = tally.rows_ingested,
            skipped = tally.rows_skipped,
            "closing stock ingested"
        );
        Ok(tally)
    }

    /// Append sales rows. Sale returns arrive as negative quantities and are
    /// stored as-is. Rows without a sale date are skipped.
    pub async fn ingest_sales(
        &self,
        rows: &[NormalizedRow],
        uploaded_by: Option<&str>,
    ) -> Result<IngestTally> {
        let mut tally = IngestTally::default();
        for row in rows {
            let barcode = normalize_barcode(row.text(fields::BARCODE).unwrap_or_default());
            let Some(sale_date) = row.date(fields::SALE_DATE) else {
                tally.rows_skipped += 1;
                continue;
            };
            if barcode.is_empty() {
                tally.rows_skipped += 1;
                continue;
            }
            let Some(outlet_id) = self
                .outlets
                .resolve(row.text(fields::OUTLET_NAME).unwrap_or_default())
                .await?
            else {
                tally.rows_skipped += 1;
                continue;
            };

            self.ledgers
                .add_sale(NewSale {
                    outlet_id: outlet_id.into_uuid(),
                    barcode,
                    qty: row.decimal(fields::QTY).unwrap_or(Decimal::ZERO),
                    sale_amount: row.decimal(fields::SALE_AMOUNT).unwrap_or(Decimal::ZERO),
                    sale_date,
                    uploaded_by: uploaded_by.map(str::to_string),
                })
                .await?;
            tally.rows_ingested += 1;
        }
        tracing::info!(
            ingested = tally.rows_ingested,
            skipped = tally.rows_skipped,
            "sales ingested"
        );
        Ok(tally)
    }

    /// Append purchase-return rows. Entry number, entry date and supplier are
    /// mandatory on the goods-return voucher; rows missing them are skipped.
    pub async fn ingest_purchase_returns(
        &self,
        rows: &[NormalizedRow],
        uploaded_by: Option<&str>,
    ) -> Result<IngestTally> {
        let mut tally = IngestTally::default();
        for row in rows {
            let barcode = normalize_barcode(row.text(fields::BARCODE).unwrap_or_default());
            let entry_no = row.text(fields::ENTRY_NO).unwrap_or_default().trim();
            let supplier = row.text(fields::SUPPLIER_NAME).unwrap_or_default().trim();
            let entry_date = row.date(fields::ENTRY_DATE);
            if barcode.is_empty() || entry_no.is_empty() || supplier.is_empty() {
                tally.rows_skipped += 1;
                continue;
            }
            let Some(entry_date) = entry_date else {
                tally.rows_skipped += 1;
                continue;
            };
            let Some(outlet_id) = self
                .outlets
                .resolve(row.text(fields::OUTLET_NAME).unwrap_or_default())
                .await?
            else {
                tally.rows_skipped += 1;
                continue;
            };

            self.ledgers
                .add_purchase_return(NewPurchaseReturn {
                    outlet_id: outlet_id.into_uuid(),
                    barcode,
                    article_name: row.text(fields::ARTICLE_NAME).map(str::to_string),
                    invoice_no: row.text(fields::INVOICE_NO).map(str::to_string),
                    entry_no: entry_no.to_string(),
                    entry_date,
                    supplier_name: supplier.to_string(),
                    category_6: row.text(fields::CATEGORY_6).map(str::to_string),
                    qty: row.decimal(fields::QTY).unwrap_or(Decimal::ZERO),
                    amount: row.decimal(fields::AMOUNT).unwrap_or(Decimal::ZERO),
                    uploaded_by: uploaded_by.map(str::to_string),
                })
                .await?;
            tally.rows_ingested += 1;
        }
        tracing::info!(
            ingested = tally.rows_ingested,
            skipped = tally.rows_skipped,
            "purchase returns ingested"
        );
        Ok(tally)
    }

    /// Append purchase rows: every well-formed row lands in the raw table
    /// exactly as uploaded; the processed row is only derived when the site
    /// resolves to an outlet and the barcode to an active catalog product.
    pub async fn ingest_purchases(
        &self,
        rows: &[NormalizedRow],
        uploaded_by: Option<&str>,
    ) -> Result<PurchaseTally> {
        let mut tally = PurchaseTally::default();
        for row in rows {
            let barcode = normalize_barcode(row.text(fields::BARCODE).unwrap_or_default());
            if barcode.is_empty() {
                tally.rows_skipped += 1;
                continue;
            }
            let site_name = row.text(fields::SITE_NAME).unwrap_or_default().trim();

            let raw = self
                .ledgers
                .add_purchase_raw(NewPurchaseRaw {
                    site_name: site_name.to_string(),
                    barcode: barcode.clone(),
                    supplier_name: text_or_empty(row, fields::SUPPLIER_NAME),
                    hsn_code: text_or_empty(row, fields::HSN_CODE),
                    division: text_or_empty(row, fields::DIVISION),
                    section: text_or_empty(row, fields::SECTION),
                    department: text_or_empty(row, fields::DEPARTMENT),
                    article_name_raw: text_or_empty(row, fields::ARTICLE_NAME),
                    item_name_raw: text_or_empty(row, fields::ITEM_NAME),
                    name_raw: text_or_empty(row, fields::PRODUCT_NAME),
                    brand_name_raw: text_or_empty(row, fields::BRAND_NAME),
                    size_raw: text_or_empty(row, fields::SIZE),
                    qty: row.decimal(fields::QTY).unwrap_or(Decimal::ZERO),
                    net_amount: row.decimal(fields::NET_AMOUNT).unwrap_or(Decimal::ZERO),
                    rsp_raw: row.decimal(fields::RSP).unwrap_or(Decimal::ZERO),
                    mrp_raw: row.decimal(fields::MRP).unwrap_or(Decimal::ZERO),
                    uploaded_by: uploaded_by.map(str::to_string),
                })
                .await?;
            tally.raw_rows += 1;

            let Some(outlet_id) = self.outlets.resolve(site_name).await? else {
                tally.rows_skipped += 1;
                continue;
            };
            let Some(product) = self.catalog.latest_active(&barcode).await? else {
                tally.rows_skipped += 1;
                continue;
            };

            // Catalog attributes are authoritative for the processed row; the
            // raw spreadsheet text stays available on the raw row.
            self.ledgers
                .add_purchase(NewPurchase {
                    raw_id: Some(raw.id),
                    outlet_id: outlet_id.into_uuid(),
                    product_id: product.id,
                    barcode: barcode.clone(),
                    article_name: product.article_name.clone().unwrap_or_default(),
                    item_name: product.item_name.clone().unwrap_or_default(),
                    product_name: product.product_name.clone().unwrap_or_default(),
                    brand_name: product.brand_name.clone().unwrap_or_default(),
                    size: product.size.clone().unwrap_or_default(),
                    division: product.division.clone().unwrap_or_default(),
                    section: product.section.clone().unwrap_or_default(),
                    department: product.department.clone().unwrap_or_default(),
                    qty: raw.qty,
                    net_amount: raw.net_amount,
                    rsp: product.rsp.unwrap_or(raw.rsp_raw),
                    mrp: product.mrp.unwrap_or(raw.mrp_raw),
                    cgst: product.cgst,
                    sgst: product.sgst,
                    cess: product.cess,
                    igst: product.igst,
                    tax: product.tax,
                    processed_by: uploaded_by.map(str::to_string),
                })
                .await?;
            tally.processed_rows += 1;
        }
        tracing::info!(
            raw = tally.raw_rows,
            processed = tally.processed_rows,
            skipped = tally.rows_skipped,
            "purchases ingested"
        );
        Ok(tally)
    }
}

fn text_or_empty(row: &NormalizedRow, field: &str) -> String {
    row.text(field).unwrap_or_default().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    use backstock_core::OutletId;
    use backstock_db::models::NewProduct;

    use crate::store::{InMemoryCatalogStore, InMemoryLedgerStore, InMemoryOutletResolver};

    struct Fixture {
        service: LedgerIngestService,
        ledgers: Arc<InMemoryLedgerStore>,
        catalog: Arc<InMemoryCatalogStore>,
        outlets: Arc<InMemoryOutletResolver>,
    }

    async fn fixture() -> Fixture {
        let ledgers = Arc::new(InMemoryLedgerStore::new());
        let catalog = Arc::new(InMemoryCatalogStore::new());
        let outlets = Arc::new(InMemoryOutletResolver::new());
        outlets.add("Store A", OutletId::new()).await;
        Fixture {
            service: LedgerIngestService::new(ledgers.clone(), catalog.clone(), outlets.clone()),
            ledgers,
            catalog,
            outlets,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_closing_stock_skips_bad_rows() {
        let f = fixture().await;
        let rows = vec![
            NormalizedRow::new()
                .with(fields::BARCODE, "111")
                .with(fields::OUTLET_NAME, "Store A")
                .with(fields::QTY, dec!(10))
                .with(fields::AS_OF_DATE, date(2025, 3, 31)),
            NormalizedRow::new()
                .with(fields::BARCODE, "")
                .with(fields::OUTLET_NAME, "Store A"),
            NormalizedRow::new()
                .with(fields::BARCODE, "222")
                .with(fields::OUTLET_NAME, "Unknown"),
        ];

        let tally = f
            .service
            .ingest_closing_stock(&rows, Some("admin"))
            .await
            .unwrap();
        assert_eq!(tally.rows_ingested, 1);
        assert_eq!(tally.rows_skipped, 2);

        let stored = f.ledgers.closing_stock_rows().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].qty, dec!(10));
        assert_eq!(stored[0].as_of_date, Some(date(2025, 3, 31)));
    }

    #[tokio::test]
    async fn test_sales_require_a_sale_date() {
        let f = fixture().await;
        let rows = vec![
            NormalizedRow::new()
                .with(fields::BARCODE, "111")
                .with(fields::OUTLET_NAME, "Store A")
                .with(fields::QTY, dec!(-2))
                .with(fields::SALE_AMOUNT, dec!(-598))
                .with(fields::SALE_DATE, date(2025, 4, 2)),
            NormalizedRow::new()
                .with(fields::BARCODE, "111")
                .with(fields::OUTLET_NAME, "Store A")
                .with(fields::QTY, dec!(1)),
        ];

        let tally = f.service.ingest_sales(&rows, None).await.unwrap();
        assert_eq!(tally.rows_ingested, 1);
        assert_eq!(tally.rows_skipped, 1);

        // Negative quantity (a sale return) is stored as-is.
        let totals = f.ledgers.sale_totals().await.unwrap();
        assert_eq!(totals[0].qty, dec!(-2));
    }

    #[tokio::test]
    async fn test_purchase_returns_require_voucher_fields() {
        let f = fixture().await;
        let complete = NormalizedRow::new()
            .with(fields::BARCODE, "111")
            .with(fields::OUTLET_NAME, "Store A")
            .with(fields::ENTRY_NO, "GRV-42")
            .with(fields::ENTRY_DATE, date(2025, 4, 3))
            .with(fields::SUPPLIER_NAME, "Acme Textiles")
            .with(fields::QTY, dec!(3))
            .with(fields::AMOUNT, dec!(897));
        let missing_entry_no = NormalizedRow::new()
            .with(fields::BARCODE, "111")
            .with(fields::OUTLET_NAME, "Store A")
            .with(fields::ENTRY_DATE, date(2025, 4, 3))
            .with(fields::SUPPLIER_NAME, "Acme Textiles");

        let tally = f
            .service
            .ingest_purchase_returns(&[complete, missing_entry_no], None)
            .await
            .unwrap();
        assert_eq!(tally.rows_ingested, 1);
        assert_eq!(tally.rows_skipped, 1);
    }

    #[tokio::test]
    async fn test_purchases_keep_raw_even_when_join_fails() {
        let f = fixture().await;
        let row = NormalizedRow::new()
            .with(fields::BARCODE, "111")
            .with(fields::SITE_NAME, "Store A")
            .with(fields::QTY, dec!(5))
            .with(fields::NET_AMOUNT, dec!(1000));

        // No catalog product yet: raw row lands, processed does not.
        let tally = f.service.ingest_purchases(&[row.clone()], None).await.unwrap();
        assert_eq!(tally.raw_rows, 1);
        assert_eq!(tally.processed_rows, 0);
        assert_eq!(tally.rows_skipped, 1);

        f.catalog
            .insert_version(
                &NewProduct {
                    barcode: "111".to_string(),
                    article_name: Some("Blue Shirt 40".to_string()),
                    rsp: Some(dec!(299)),
                    ..NewProduct::default()
                },
                1,
            )
            .await
            .unwrap();

        let tally = f.service.ingest_purchases(&[row], None).await.unwrap();
        assert_eq!(tally.processed_rows, 1);

        let totals = f.ledgers.purchase_totals().await.unwrap();
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].qty, dec!(5));
    }

    #[tokio::test]
    async fn test_processed_purchase_prefers_catalog_pricing() {
        let f = fixture().await;
        f.outlets.add("STORE B", OutletId::new()).await;
        f.catalog
            .insert_version(
                &NewProduct {
                    barcode: "222".to_string(),
                    article_name: Some("Black Jeans 32".to_string()),
                    rsp: Some(dec!(1499)),
                    mrp: Some(dec!(1999)),
                    ..NewProduct::default()
                },
                1,
            )
            .await
            .unwrap();

        let row = NormalizedRow::new()
            .with(fields::BARCODE, "222")
            .with(fields::SITE_NAME, "store b")
            .with(fields::QTY, dec!(2))
            .with(fields::RSP, dec!(999))
            .with(fields::MRP, dec!(999));
        f.service.ingest_purchases(&[row], None).await.unwrap();

        let purchases = f.ledgers.purchases().await;
        assert_eq!(purchases.len(), 1);
        assert_eq!(purchases[0].article_name, "Black Jeans 32");
        assert_eq!(purchases[0].rsp, dec!(1499));
        assert_eq!(purchases[0].mrp, dec!(1999));
        assert!(purchases[0].raw_id.is_some());
    }
}
