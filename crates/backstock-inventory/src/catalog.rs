//! Product catalog upserts.
//!
//! The catalog is an append-only version chain: a changed record never
//! mutates in place. Instead every active row of the barcode is deactivated
//! and a new row with the next version number becomes the current one, so
//! historical purchases keep pointing at the exact attributes they were
//! processed with.

use std::sync::Arc;

use backstock_core::text::normalize_barcode;
use backstock_db::models::{NewProduct, Product};

use crate::error::Result;
use crate::store::CatalogStore;

/// Tally of one catalog upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogTally {
    /// Barcodes seen for the first time.
    pub created: i32,
    /// Barcodes whose attributes changed, bumping the version.
    pub versioned: i32,
    /// Rows identical to the current version.
    pub unchanged: i32,
    /// Rows without a usable barcode.
    pub skipped: i32,
}

/// Catalog upsert operations.
#[derive(Clone)]
pub struct CatalogService {
    catalog: Arc<dyn CatalogStore>,
}

impl CatalogService {
    #[must_use]
    pub fn new(catalog: Arc<dyn CatalogStore>) -> Self {
        Self { catalog }
    }

    /// Upsert one product record into its barcode's version chain.
    pub async fn upsert(&self, mut input: NewProduct) -> Result<UpsertOutcome> {
        input.barcode = normalize_barcode(&input.barcode);
        if input.barcode.is_empty() {
            return Ok(UpsertOutcome::Skipped);
        }

        let Some(current) = self.catalog.latest_version(&input.barcode).await? else {
            let product = self.catalog.insert_version(&input, 1).await?;
            return Ok(UpsertOutcome::Created(product));
        };

        if as_input(&current) == input {
            if current.is_active {
                return Ok(UpsertOutcome::Unchanged(current));
            }
            // An identical record revives a deactivated chain in place; the
            // version number does not move.
            self.catalog.reactivate(current.id).await?;
            tracing::debug!(barcode = %current.barcode, version = current.version, "product re-activated");
            let product = self
                .catalog
                .latest_active(&input.barcode)
                .await?
                .unwrap_or(current);
            return Ok(UpsertOutcome::Unchanged(product));
        }

        self.catalog.deactivate_versions(&input.barcode).await?;
        let product = self
            .catalog
            .insert_version(&input, current.version + 1)
            .await?;
        tracing::debug!(barcode = %product.barcode, version = product.version, "product versioned");
        Ok(UpsertOutcome::Versioned(product))
    }

    /// Upsert a batch, tallying per-row outcomes.
    pub async fn upsert_batch(&self, inputs: Vec<NewProduct>) -> Result<CatalogTally> {
        let mut tally = CatalogTally::default();
        for input in inputs {
            match self.upsert(input).await? {
                UpsertOutcome::Created(_) => tally.created += 1,
                UpsertOutcome::Versioned(_) => tally.versioned += 1,
                UpsertOutcome::Unchanged(_) => tally.unchanged += 1,
                UpsertOutcome::Skipped => tally.skipped += 1,
            }
        }
        tracing::info!(
            created = tally.created,
            versioned = tally.versioned,
            unchanged = tally.unchanged,
            skipped = tally.skipped,
            "catalog upload applied"
        );
        Ok(tally)
    }
}

/// Result of upserting one product record.
#[derive(Debug, Clone)]
pub enum UpsertOutcome {
    Created(Product),
    Versioned(Product),
    Unchanged(Product),
    Skipped,
}

/// A version row reduced to its comparable attributes.
fn as_input(product: &Product) -> NewProduct {
    NewProduct {
        barcode: product.barcode.clone(),
        remarks: product.remarks.clone(),
        category_6: product.category_6.clone(),
        category_group: product.category_group.clone(),
        supplier_name: product.supplier_name.clone(),
        hsn_code: product.hsn_code.clone(),
        division: product.division.clone(),
        section: product.section.clone(),
        department: product.department.clone(),
        article_name: product.article_name.clone(),
        item_name: product.item_name.clone(),
        product_name: product.product_name.clone(),
        brand_name: product.brand_name.clone(),
        size: product.size.clone(),
        weight: product.weight.clone(),
        rsp: product.rsp,
        mrp: product.mrp,
        cgst: product.cgst,
        sgst: product.sgst,
        cess: product.cess,
        igst: product.igst,
        tax: product.tax,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    use crate::store::InMemoryCatalogStore;

    fn shirt(rsp: rust_decimal::Decimal) -> NewProduct {
        NewProduct {
            barcode: "8901".to_string(),
            article_name: Some("Blue Shirt 40".to_string()),
            division: Some("Apparel".to_string()),
            rsp: Some(rsp),
            ..NewProduct::default()
        }
    }

    #[tokio::test]
    async fn test_first_upsert_creates_version_one() {
        let store = Arc::new(InMemoryCatalogStore::new());
        let service = CatalogService::new(store.clone());

        let outcome = service.upsert(shirt(dec!(299))).await.unwrap();
        let UpsertOutcome::Created(product) = outcome else {
            panic!("expected Created");
        };
        assert_eq!(product.version, 1);
        assert!(product.is_active);
    }

    #[tokio::test]
    async fn test_changed_attributes_bump_the_version() {
        let store = Arc::new(InMemoryCatalogStore::new());
        let service = CatalogService::new(store.clone());

        service.upsert(shirt(dec!(299))).await.unwrap();
        let outcome = service.upsert(shirt(dec!(349))).await.unwrap();

        let UpsertOutcome::Versioned(product) = outcome else {
            panic!("expected Versioned");
        };
        assert_eq!(product.version, 2);
        assert!(product.is_active);

        // The old version survives, deactivated.
        let latest = store.latest_active("8901").await.unwrap().unwrap();
        assert_eq!(latest.version, 2);
        assert_eq!(latest.rsp, Some(dec!(349)));
    }

    #[tokio::test]
    async fn test_identical_record_is_unchanged() {
        let store = Arc::new(InMemoryCatalogStore::new());
        let service = CatalogService::new(store);

        service.upsert(shirt(dec!(299))).await.unwrap();
        let outcome = service.upsert(shirt(dec!(299))).await.unwrap();
        assert!(matches!(outcome, UpsertOutcome::Unchanged(p) if p.version == 1));
    }

    #[tokio::test]
    async fn test_identical_record_reactivates_deactivated_chain() {
        let store = Arc::new(InMemoryCatalogStore::new());
        let service = CatalogService::new(store.clone());

        service.upsert(shirt(dec!(299))).await.unwrap();
        store.deactivate_versions("8901").await.unwrap();
        assert!(store.latest_active("8901").await.unwrap().is_none());

        let outcome = service.upsert(shirt(dec!(299))).await.unwrap();
        let UpsertOutcome::Unchanged(product) = outcome else {
            panic!("expected Unchanged");
        };
        assert_eq!(product.version, 1);
        assert!(product.is_active);

        // No extra version row appeared.
        let latest = store.latest_version("8901").await.unwrap().unwrap();
        assert_eq!(latest.version, 1);
        assert!(latest.is_active);
    }

    #[tokio::test]
    async fn test_batch_tally() {
        let store = Arc::new(InMemoryCatalogStore::new());
        let service = CatalogService::new(store);

        service.upsert(shirt(dec!(299))).await.unwrap();
        let tally = service
            .upsert_batch(vec![
                shirt(dec!(299)),
                shirt(dec!(349)),
                NewProduct {
                    barcode: "  ".to_string(),
                    ..NewProduct::default()
                },
                NewProduct {
                    barcode: "777".to_string(),
                    ..NewProduct::default()
                },
            ])
            .await
            .unwrap();

        assert_eq!(tally.unchanged, 1);
        assert_eq!(tally.versioned, 1);
        assert_eq!(tally.skipped, 1);
        assert_eq!(tally.created, 1);
    }
}
