//! Inventory storage traits and in-memory doubles.
//!
//! The ledger tables are append-only facts; aggregation happens at read time
//! so the recompute always sees the full history. The catalog is an
//! append-only version chain per barcode with one active row.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use backstock_core::text::normalize_name;
use backstock_core::OutletId;
use backstock_db::models::{
    ClosingStock, KeyQty, KeyQtyDate, NewClosingStock, NewPerpetualClosing, NewProduct,
    NewPurchase, NewPurchaseRaw, NewPurchaseReturn, NewSale, PerpetualClosing, Product, Purchase,
    PurchaseRaw, PurchaseReturn, Sale,
};

use crate::error::Result;

/// Storage backend for the ledger fact tables and the derived
/// perpetual-closing view.
#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
    async fn add_closing_stock(&self, input: NewClosingStock) -> Result<ClosingStock>;
    async fn add_sale(&self, input: NewSale) -> Result<Sale>;
    async fn add_purchase_return(&self, input: NewPurchaseReturn) -> Result<PurchaseReturn>;
    async fn add_purchase_raw(&self, input: NewPurchaseRaw) -> Result<PurchaseRaw>;
    async fn add_purchase(&self, input: NewPurchase) -> Result<Purchase>;

    /// Every closing-stock snapshot row; the recompute engine picks the
    /// latest per key itself.
    async fn closing_stock_rows(&self) -> Result<Vec<ClosingStock>>;

    /// Summed sale quantity and latest sale date per (outlet, barcode).
    async fn sale_totals(&self) -> Result<Vec<KeyQtyDate>>;

    /// Summed return quantity and latest entry date per (outlet, barcode).
    async fn purchase_return_totals(&self) -> Result<Vec<KeyQtyDate>>;

    /// Summed processed-purchase quantity per (outlet, barcode).
    async fn purchase_totals(&self) -> Result<Vec<KeyQty>>;

    /// Replace the derived table atomically. Returns rows inserted.
    async fn replace_perpetual_closing(
        &self,
        rows: &[NewPerpetualClosing],
        computed_by: Option<&str>,
    ) -> Result<u64>;

    /// Current derived rows, ordered by (outlet, barcode).
    async fn perpetual_closing(&self) -> Result<Vec<PerpetualClosing>>;
}

/// Storage backend for the product catalog version chain.
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    /// Latest version for a barcode regardless of active flag.
    async fn latest_version(&self, barcode: &str) -> Result<Option<Product>>;

    /// Latest active version for a barcode.
    async fn latest_active(&self, barcode: &str) -> Result<Option<Product>>;

    /// Clear the active flag on every version of a barcode.
    async fn deactivate_versions(&self, barcode: &str) -> Result<u64>;

    /// Re-flag a specific version row as active.
    async fn reactivate(&self, id: Uuid) -> Result<()>;

    /// Append a new active version row.
    async fn insert_version(&self, input: &NewProduct, version: i32) -> Result<Product>;
}

/// Outlet name resolution consumed by ledger ingestion.
#[async_trait::async_trait]
pub trait OutletResolver: Send + Sync {
    /// Resolve a free-text outlet name (canonical name or alias).
    async fn resolve(&self, name: &str) -> Result<Option<OutletId>>;
}

/// In-memory ledger store for testing.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    closing: Arc<RwLock<Vec<ClosingStock>>>,
    sales: Arc<RwLock<Vec<Sale>>>,
    returns: Arc<RwLock<Vec<PurchaseReturn>>>,
    purchases_raw: Arc<RwLock<Vec<PurchaseRaw>>>,
    purchases: Arc<RwLock<Vec<Purchase>>>,
    perpetual: Arc<RwLock<Vec<PerpetualClosing>>>,
    next_seq: Arc<RwLock<i64>>,
}

impl InMemoryLedgerStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All processed purchase rows (test inspection).
    pub async fn purchases(&self) -> Vec<Purchase> {
        self.purchases.read().await.clone()
    }
}

#[async_trait::async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn add_closing_stock(&self, input: NewClosingStock) -> Result<ClosingStock> {
        let mut seq = self.next_seq.write().await;
        *seq += 1;
        let row = ClosingStock {
            id: Uuid::new_v4(),
            seq: *seq,
            outlet_id: input.outlet_id,
            barcode: input.barcode,
            qty: input.qty,
            as_of_date: input.as_of_date,
            uploaded_by: input.uploaded_by,
            uploaded_at: Utc::now(),
        };
        self.closing.write().await.push(row.clone());
        Ok(row)
    }

    async fn add_sale(&self, input: NewSale) -> Result<Sale> {
        let row = Sale {
            id: Uuid::new_v4(),
            outlet_id: input.outlet_id,
            barcode: input.barcode,
            qty: input.qty,
            sale_amount: input.sale_amount,
            sale_date: input.sale_date,
            uploaded_by: input.uploaded_by,
            uploaded_at: Utc::now(),
        };
        self.sales.write().await.push(row.clone());
        Ok(row)
    }

    async fn add_purchase_return(&self, input: NewPurchaseReturn) -> Result<PurchaseReturn> {
        let row = PurchaseReturn {
            id: Uuid::new_v4(),
            outlet_id: input.outlet_id,
            barcode: input.barcode,
            article_name: input.article_name,
            invoice_no: input.invoice_no,
            entry_no: input.entry_no,
            entry_date: input.entry_date,
            supplier_name: input.supplier_name,
            category_6: input.category_6,
            qty: input.qty,
            amount: input.amount,
            uploaded_by: input.uploaded_by,
            uploaded_at: Utc::now(),
        };
        self.returns.write().await.push(row.clone());
        Ok(row)
    }

    async fn add_purchase_raw(&self, input: NewPurchaseRaw) -> Result<PurchaseRaw> {
        let row = PurchaseRaw {
            id: Uuid::new_v4(),
            site_name: input.site_name,
            barcode: input.barcode,
            supplier_name: input.supplier_name,
            hsn_code: input.hsn_code,
            division: input.division,
            section: input.section,
            department: input.department,
            article_name_raw: input.article_name_raw,
            item_name_raw: input.item_name_raw,
            name_raw: input.name_raw,
            brand_name_raw: input.brand_name_raw,
            size_raw: input.size_raw,
            qty: input.qty,
            net_amount: input.net_amount,
            rsp_raw: input.rsp_raw,
            mrp_raw: input.mrp_raw,
            uploaded_by: input.uploaded_by,
            uploaded_at: Utc::now(),
        };
        self.purchases_raw.write().await.push(row.clone());
        Ok(row)
    }

    async fn add_purchase(&self, input: NewPurchase) -> Result<Purchase> {
        let row = Purchase {
            id: Uuid::new_v4(),
            raw_id: input.raw_id,
            outlet_id: input.outlet_id,
            product_id: input.product_id,
            barcode: input.barcode,
            article_name: input.article_name,
            item_name: input.item_name,
            product_name: input.product_name,
            brand_name: input.brand_name,
            size: input.size,
            division: input.division,
            section: input.section,
            department: input.department,
            qty: input.qty,
            net_amount: input.net_amount,
            rsp: input.rsp,
            mrp: input.mrp,
            cgst: input.cgst,
            sgst: input.sgst,
            cess: input.cess,
            igst: input.igst,
            tax: input.tax,
            processed_by: input.processed_by,
            processed_at: Utc::now(),
        };
        self.purchases.write().await.push(row.clone());
        Ok(row)
    }

    async fn closing_stock_rows(&self) -> Result<Vec<ClosingStock>> {
        Ok(self.closing.read().await.clone())
    }

    async fn sale_totals(&self) -> Result<Vec<KeyQtyDate>> {
        let sales = self.sales.read().await;
        let mut totals: HashMap<(Uuid, String), KeyQtyDate> = HashMap::new();
        for sale in sales.iter() {
            totals
                .entry((sale.outlet_id, sale.barcode.clone()))
                .and_modify(|t| {
                    t.qty += sale.qty;
                    t.latest_date = t.latest_date.max(Some(sale.sale_date));
                })
                .or_insert_with(|| KeyQtyDate {
                    outlet_id: sale.outlet_id,
                    barcode: sale.barcode.clone(),
                    qty: sale.qty,
                    latest_date: Some(sale.sale_date),
                });
        }
        Ok(totals.into_values().collect())
    }

    async fn purchase_return_totals(&self) -> Result<Vec<KeyQtyDate>> {
        let returns = self.returns.read().await;
        let mut totals: HashMap<(Uuid, String), KeyQtyDate> = HashMap::new();
        for ret in returns.iter() {
            totals
                .entry((ret.outlet_id, ret.barcode.clone()))
                .and_modify(|t| {
                    t.qty += ret.qty;
                    t.latest_date = t.latest_date.max(Some(ret.entry_date));
                })
                .or_insert_with(|| KeyQtyDate {
                    outlet_id: ret.outlet_id,
                    barcode: ret.barcode.clone(),
                    qty: ret.qty,
                    latest_date: Some(ret.entry_date),
                });
        }
        Ok(totals.into_values().collect())
    }

    async fn purchase_totals(&self) -> Result<Vec<KeyQty>> {
        let purchases = self.purchases.read().await;
        let mut totals: HashMap<(Uuid, String), KeyQty> = HashMap::new();
        for purchase in purchases.iter() {
            totals
                .entry((purchase.outlet_id, purchase.barcode.clone()))
                .and_modify(|t| t.qty += purchase.qty)
                .or_insert_with(|| KeyQty {
                    outlet_id: purchase.outlet_id,
                    barcode: purchase.barcode.clone(),
                    qty: purchase.qty,
                });
        }
        Ok(totals.into_values().collect())
    }

    async fn replace_perpetual_closing(
        &self,
        rows: &[NewPerpetualClosing],
        computed_by: Option<&str>,
    ) -> Result<u64> {
        let now = Utc::now();
        let mut perpetual = self.perpetual.write().await;
        *perpetual = rows
            .iter()
            .map(|row| PerpetualClosing {
                id: Uuid::new_v4(),
                outlet_id: row.outlet_id,
                barcode: row.barcode.clone(),
                qty: row.qty,
                as_of_date: row.as_of_date,
                computed_by: computed_by.map(str::to_string),
                computed_at: now,
            })
            .collect();
        Ok(perpetual.len() as u64)
    }

    async fn perpetual_closing(&self) -> Result<Vec<PerpetualClosing>> {
        let mut rows = self.perpetual.read().await.clone();
        rows.sort_by(|a, b| a.outlet_id.cmp(&b.outlet_id).then(a.barcode.cmp(&b.barcode)));
        Ok(rows)
    }
}

/// In-memory catalog store for testing.
#[derive(Debug, Default)]
pub struct InMemoryCatalogStore {
    versions: Arc<RwLock<HashMap<String, Vec<Product>>>>,
}

impl InMemoryCatalogStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn latest_version(&self, barcode: &str) -> Result<Option<Product>> {
        Ok(self
            .versions
            .read()
            .await
            .get(barcode)
            .and_then(|chain| chain.iter().max_by_key(|p| p.version))
            .cloned())
    }

    async fn latest_active(&self, barcode: &str) -> Result<Option<Product>> {
        Ok(self
            .versions
            .read()
            .await
            .get(barcode)
            .and_then(|chain| chain.iter().filter(|p| p.is_active).max_by_key(|p| p.version))
            .cloned())
    }

    async fn deactivate_versions(&self, barcode: &str) -> Result<u64> {
        let mut versions = self.versions.write().await;
        let Some(chain) = versions.get_mut(barcode) else {
            return Ok(0);
        };
        let mut touched = 0;
        for product in chain.iter_mut().filter(|p| p.is_active) {
            product.is_active = false;
            product.updated_at = Utc::now();
            touched += 1;
        }
        Ok(touched)
    }

    async fn reactivate(&self, id: Uuid) -> Result<()> {
        let mut versions = self.versions.write().await;
        for chain in versions.values_mut() {
            if let Some(product) = chain.iter_mut().find(|p| p.id == id) {
                product.is_active = true;
                product.updated_at = Utc::now();
                break;
            }
        }
        Ok(())
    }

    async fn insert_version(&self, input: &NewProduct, version: i32) -> Result<Product> {
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            barcode: input.barcode.clone(),
            version,
            is_active: true,
            remarks: input.remarks.clone(),
            category_6: input.category_6.clone(),
            category_group: input.category_group.clone(),
            supplier_name: input.supplier_name.clone(),
            hsn_code: input.hsn_code.clone(),
            division: input.division.clone(),
            section: input.section.clone(),
            department: input.department.clone(),
            article_name: input.article_name.clone(),
            item_name: input.item_name.clone(),
            product_name: input.product_name.clone(),
            brand_name: input.brand_name.clone(),
            size: input.size.clone(),
            weight: input.weight.clone(),
            rsp: input.rsp,
            mrp: input.mrp,
            cgst: input.cgst,
            sgst: input.sgst,
            cess: input.cess,
            igst: input.igst,
            tax: input.tax,
            created_at: now,
            updated_at: now,
        };
        self.versions
            .write()
            .await
            .entry(input.barcode.clone())
            .or_default()
            .push(product.clone());
        Ok(product)
    }
}

/// In-memory outlet resolver for testing, keyed by normalized name.
#[derive(Debug, Default)]
pub struct InMemoryOutletResolver {
    outlets: Arc<RwLock<HashMap<String, OutletId>>>,
}

impl InMemoryOutletResolver {
    /// Create an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a name or alias for an outlet.
    pub async fn add(&self, name: &str, outlet_id: OutletId) {
        self.outlets
            .write()
            .await
            .insert(normalize_name(name), outlet_id);
    }
}

#[async_trait::async_trait]
impl OutletResolver for InMemoryOutletResolver {
    async fn resolve(&self, name: &str) -> Result<Option<OutletId>> {
        Ok(self.outlets.read().await.get(&normalize_name(name)).copied())
    }
}
