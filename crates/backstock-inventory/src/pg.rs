//! Postgres-backed store implementations.

use std::sync::Arc;

use backstock_core::OutletId;
use backstock_db::models::{
    ClosingStock, KeyQty, KeyQtyDate, NewClosingStock, NewPerpetualClosing, NewProduct,
    NewPurchase, NewPurchaseRaw, NewPurchaseReturn, NewSale, Outlet, PerpetualClosing, Product,
    Purchase, PurchaseRaw, PurchaseReturn, Sale,
};
use backstock_db::{DbError, DbPool};
use uuid::Uuid;

use crate::error::Result;
use crate::store::{CatalogStore, LedgerStore, OutletResolver};

/// Ledger store over a shared Postgres pool.
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: Arc<DbPool>,
}

impl PgLedgerStore {
    #[must_use]
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl LedgerStore for PgLedgerStore {
    async fn add_closing_stock(&self, input: NewClosingStock) -> Result<ClosingStock> {
        Ok(ClosingStock::create(self.pool.inner(), input)
            .await
            .map_err(DbError::from)?)
    }

    async fn add_sale(&self, input: NewSale) -> Result<Sale> {
        Ok(Sale::create(self.pool.inner(), input)
            .await
            .map_err(DbError::from)?)
    }

    async fn add_purchase_return(&self, input: NewPurchaseReturn) -> Result<PurchaseReturn> {
        Ok(PurchaseReturn::create(self.pool.inner(), input)
            .await
            .map_err(DbError::from)?)
    }

    async fn add_purchase_raw(&self, input: NewPurchaseRaw) -> Result<PurchaseRaw> {
        Ok(PurchaseRaw::create(self.pool.inner(), input)
            .await
            .map_err(DbError::from)?)
    }

    async fn add_purchase(&self, input: NewPurchase) -> Result<Purchase> {
        Ok(Purchase::create(self.pool.inner(), input)
            .await
            .map_err(DbError::from)?)
    }

    async fn closing_stock_rows(&self) -> Result<Vec<ClosingStock>> {
        Ok(ClosingStock::fetch_all(self.pool.inner())
            .await
            .map_err(DbError::from)?)
    }

    async fn sale_totals(&self) -> Result<Vec<KeyQtyDate>> {
        Ok(Sale::totals_by_key(self.pool.inner())
            .await
            .map_err(DbError::from)?)
    }

    async fn purchase_return_totals(&self) -> Result<Vec<KeyQtyDate>> {
        Ok(PurchaseReturn::totals_by_key(self.pool.inner())
            .await
            .map_err(DbError::from)?)
    }

    async fn purchase_totals(&self) -> Result<Vec<KeyQty>> {
        Ok(Purchase::totals_by_key(self.pool.inner())
            .await
            .map_err(DbError::from)?)
    }

    async fn replace_perpetual_closing(
        &self,
        rows: &[NewPerpetualClosing],
        computed_by: Option<&str>,
    ) -> Result<u64> {
        Ok(
            PerpetualClosing::replace_all(self.pool.inner(), rows, computed_by)
                .await
                .map_err(DbError::from)?,
        )
    }

    async fn perpetual_closing(&self) -> Result<Vec<PerpetualClosing>> {
        Ok(PerpetualClosing::fetch_all(self.pool.inner())
            .await
            .map_err(DbError::from)?)
    }
}

/// Catalog store over a shared Postgres pool.
#[derive(Clone)]
pub struct PgCatalogStore {
    pool: Arc<DbPool>,
}

impl PgCatalogStore {
    #[must_use]
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CatalogStore for PgCatalogStore {
    async fn latest_version(&self, barcode: &str) -> Result<Option<Product>> {
        Ok(Product::latest_by_barcode(self.pool.inner(), barcode)
            .await
            .map_err(DbError::from)?)
    }

    async fn latest_active(&self, barcode: &str) -> Result<Option<Product>> {
        Ok(Product::latest_active_by_barcode(self.pool.inner(), barcode)
            .await
            .map_err(DbError::from)?)
    }

    async fn deactivate_versions(&self, barcode: &str) -> Result<u64> {
        Ok(Product::deactivate_versions(self.pool.inner(), barcode)
            .await
            .map_err(DbError::from)?)
    }

    async fn reactivate(&self, id: Uuid) -> Result<()> {
        Ok(Product::reactivate(self.pool.inner(), id)
            .await
            .map_err(DbError::from)?)
    }

    async fn insert_version(&self, input: &NewProduct, version: i32) -> Result<Product> {
        Ok(Product::insert_version(self.pool.inner(), input, version)
            .await
            .map_err(DbError::from)?)
    }
}

/// Outlet resolver over the shared outlet tables.
#[derive(Clone)]
pub struct PgOutletResolver {
    pool: Arc<DbPool>,
}

impl PgOutletResolver {
    #[must_use]
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl OutletResolver for PgOutletResolver {
    async fn resolve(&self, name: &str) -> Result<Option<OutletId>> {
        let outlet = Outlet::resolve(self.pool.inner(), name)
            .await
            .map_err(DbError::from)?;
        Ok(outlet.map(|o| OutletId::from_uuid(o.id)))
    }
}
