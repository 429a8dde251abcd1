//! Inventory ledger models.
//!
//! The fact tables (closing stock, sales, purchase returns, purchases) are
//! append-only: one row per uploaded record, never updated. `perpetual_closing`
//! is derived and fully replaced by each recompute inside one transaction.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;

/// One closing-stock snapshot row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ClosingStock {
    pub id: Uuid,
    /// Monotonic insert order; tie-break when `uploaded_at` collides.
    pub seq: i64,
    pub outlet_id: Uuid,
    pub barcode: String,
    pub qty: Decimal,
    pub as_of_date: Option<NaiveDate>,
    pub uploaded_by: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

/// One sales fact row. Sale returns arrive as negative quantities upstream.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Sale {
    pub id: Uuid,
    pub outlet_id: Uuid,
    pub barcode: String,
    pub qty: Decimal,
    pub sale_amount: Decimal,
    pub sale_date: NaiveDate,
    pub uploaded_by: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

/// One goods-return-to-supplier row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PurchaseReturn {
    pub id: Uuid,
    pub outlet_id: Uuid,
    pub barcode: String,
    pub article_name: Option<String>,
    pub invoice_no: Option<String>,
    pub entry_no: String,
    pub entry_date: NaiveDate,
    pub supplier_name: String,
    pub category_6: Option<String>,
    pub qty: Decimal,
    pub amount: Decimal,
    pub uploaded_by: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

/// Raw purchase row, stored exactly as uploaded.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PurchaseRaw {
    pub id: Uuid,
    pub site_name: String,
    pub barcode: String,
    pub supplier_name: String,
    pub hsn_code: String,
    pub division: String,
    pub section: String,
    pub department: String,
    pub article_name_raw: String,
    pub item_name_raw: String,
    pub name_raw: String,
    pub brand_name_raw: String,
    pub size_raw: String,
    pub qty: Decimal,
    pub net_amount: Decimal,
    pub rsp_raw: Decimal,
    pub mrp_raw: Decimal,
    pub uploaded_by: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

/// Processed purchase row: raw joined against outlet directory and catalog.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Purchase {
    pub id: Uuid,
    pub raw_id: Option<Uuid>,
    pub outlet_id: Uuid,
    pub product_id: Uuid,
    pub barcode: String,
    pub article_name: String,
    pub item_name: String,
    pub product_name: String,
    pub brand_name: String,
    pub size: String,
    pub division: String,
    pub section: String,
    pub department: String,
    pub qty: Decimal,
    pub net_amount: Decimal,
    pub rsp: Decimal,
    pub mrp: Decimal,
    pub cgst: Option<Decimal>,
    pub sgst: Option<Decimal>,
    pub cess: Option<Decimal>,
    pub igst: Option<Decimal>,
    pub tax: Option<Decimal>,
    pub processed_by: Option<String>,
    pub processed_at: DateTime<Utc>,
}

/// One reconciled on-hand quantity row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PerpetualClosing {
    pub id: Uuid,
    pub outlet_id: Uuid,
    pub barcode: String,
    pub qty: Decimal,
    pub as_of_date: Option<NaiveDate>,
    pub computed_by: Option<String>,
    pub computed_at: DateTime<Utc>,
}

/// Per-(outlet, barcode) quantity aggregate.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct KeyQty {
    pub outlet_id: Uuid,
    pub barcode: String,
    pub qty: Decimal,
}

/// Per-(outlet, barcode) quantity aggregate with a freshness date.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct KeyQtyDate {
    pub outlet_id: Uuid,
    pub barcode: String,
    pub qty: Decimal,
    pub latest_date: Option<NaiveDate>,
}

/// Input for a closing-stock row.
#[derive(Debug, Clone)]
pub struct NewClosingStock {
    pub outlet_id: Uuid,
    pub barcode: String,
    pub qty: Decimal,
    pub as_of_date: Option<NaiveDate>,
    pub uploaded_by: Option<String>,
}

/// Input for a sales row.
#[derive(Debug, Clone)]
pub struct NewSale {
    pub outlet_id: Uuid,
    pub barcode: String,
    pub qty: Decimal,
    pub sale_amount: Decimal,
    pub sale_date: NaiveDate,
    pub uploaded_by: Option<String>,
}

/// Input for a purchase-return row.
#[derive(Debug, Clone)]
pub struct NewPurchaseReturn {
    pub outlet_id: Uuid,
    pub barcode: String,
    pub article_name: Option<String>,
    pub invoice_no: Option<String>,
    pub entry_no: String,
    pub entry_date: NaiveDate,
    pub supplier_name: String,
    pub category_6: Option<String>,
    pub qty: Decimal,
    pub amount: Decimal,
    pub uploaded_by: Option<String>,
}

/// Input for a raw purchase row.
#[derive(Debug, Clone)]
pub struct NewPurchaseRaw {
    pub site_name: String,
    pub barcode: String,
    pub supplier_name: String,
    pub hsn_code: String,
    pub division: String,
    pub section: String,
    pub department: String,
    pub article_name_raw: String,
    pub item_name_raw: String,
    pub name_raw: String,
    pub brand_name_raw: String,
    pub size_raw: String,
    pub qty: Decimal,
    pub net_amount: Decimal,
    pub rsp_raw: Decimal,
    pub mrp_raw: Decimal,
    pub uploaded_by: Option<String>,
}

/// Input for a processed purchase row.
#[derive(Debug, Clone)]
pub struct NewPurchase {
    pub raw_id: Option<Uuid>,
    pub outlet_id: Uuid,
    pub product_id: Uuid,
    pub barcode: String,
    pub article_name: String,
    pub item_name: String,
    pub product_name: String,
    pub brand_name: String,
    pub size: String,
    pub division: String,
    pub section: String,
    pub department: String,
    pub qty: Decimal,
    pub net_amount: Decimal,
    pub rsp: Decimal,
    pub mrp: Decimal,
    pub cgst: Option<Decimal>,
    pub sgst: Option<Decimal>,
    pub cess: Option<Decimal>,
    pub igst: Option<Decimal>,
    pub tax: Option<Decimal>,
    pub processed_by: Option<String>,
}

/// Input for one recomputed perpetual-closing row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPerpetualClosing {
    pub outlet_id: Uuid,
    pub barcode: String,
    pub qty: Decimal,
    pub as_of_date: Option<NaiveDate>,
}

impl ClosingStock {
    /// Append one snapshot row.
    pub async fn create<'e, E>(executor: E, input: NewClosingStock) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            INSERT INTO closing_stock (outlet_id, barcode, qty, as_of_date, uploaded_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, seq, outlet_id, barcode, qty, as_of_date, uploaded_by, uploaded_at
            ",
        )
        .bind(input.outlet_id)
        .bind(&input.barcode)
        .bind(input.qty)
        .bind(input.as_of_date)
        .bind(&input.uploaded_by)
        .fetch_one(executor)
        .await
    }

    /// Every snapshot row. The recompute engine selects the latest per key
    /// itself so the tie-break rule lives in one place.
    pub async fn fetch_all<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            SELECT id, seq, outlet_id, barcode, qty, as_of_date, uploaded_by, uploaded_at
            FROM closing_stock
            ",
        )
        .fetch_all(executor)
        .await
    }
}

impl Sale {
    /// Append one sales row.
    pub async fn create<'e, E>(executor: E, input: NewSale) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            INSERT INTO sales (outlet_id, barcode, qty, sale_amount, sale_date, uploaded_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, outlet_id, barcode, qty, sale_amount, sale_date, uploaded_by, uploaded_at
            ",
        )
        .bind(input.outlet_id)
        .bind(&input.barcode)
        .bind(input.qty)
        .bind(input.sale_amount)
        .bind(input.sale_date)
        .bind(&input.uploaded_by)
        .fetch_one(executor)
        .await
    }

    /// Summed quantity and latest sale date per (outlet, barcode).
    pub async fn totals_by_key<'e, E>(executor: E) -> Result<Vec<KeyQtyDate>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, KeyQtyDate>(
            r"
            SELECT outlet_id, barcode,
                   COALESCE(SUM(qty), 0) AS qty,
                   MAX(sale_date) AS latest_date
            FROM sales
            GROUP BY outlet_id, barcode
            ",
        )
        .fetch_all(executor)
        .await
    }
}

impl PurchaseReturn {
    /// Append one return row.
    pub async fn create<'e, E>(executor: E, input: NewPurchaseReturn) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            INSERT INTO purchase_returns
                (outlet_id, barcode, article_name, invoice_no, entry_no, entry_date,
                 supplier_name, category_6, qty, amount, uploaded_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id, outlet_id, barcode, article_name, invoice_no, entry_no, entry_date,
                      supplier_name, category_6, qty, amount, uploaded_by, uploaded_at
            ",
        )
        .bind(input.outlet_id)
        .bind(&input.barcode)
        .bind(&input.article_name)
        .bind(&input.invoice_no)
        .bind(&input.entry_no)
        .bind(input.entry_date)
        .bind(&input.supplier_name)
        .bind(&input.category_6)
        .bind(input.qty)
        .bind(input.amount)
        .bind(&input.uploaded_by)
        .fetch_one(executor)
        .await
    }

    /// Summed quantity and latest entry date per (outlet, barcode).
    pub async fn totals_by_key<'e, E>(executor: E) -> Result<Vec<KeyQtyDate>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, KeyQtyDate>(
            r"
            SELECT outlet_id, barcode,
                   COALESCE(SUM(qty), 0) AS qty,
                   MAX(entry_date) AS latest_date
            FROM purchase_returns
            GROUP BY outlet_id, barcode
            ",
        )
        .fetch_all(executor)
        .await
    }
}

impl PurchaseRaw {
    /// Append one raw purchase row.
    pub async fn create<'e, E>(executor: E, input: NewPurchaseRaw) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            INSERT INTO purchases_raw
                (site_name, barcode, supplier_name, hsn_code, division, section, department,
                 article_name_raw, item_name_raw, name_raw, brand_name_raw, size_raw,
                 qty, net_amount, rsp_raw, mrp_raw, uploaded_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING id, site_name, barcode, supplier_name, hsn_code, division, section,
                      department, article_name_raw, item_name_raw, name_raw, brand_name_raw,
                      size_raw, qty, net_amount, rsp_raw, mrp_raw, uploaded_by, uploaded_at
            ",
        )
        .bind(&input.site_name)
        .bind(&input.barcode)
        .bind(&input.supplier_name)
        .bind(&input.hsn_code)
        .bind(&input.division)
        .bind(&input.section)
        .bind(&input.department)
        .bind(&input.article_name_raw)
        .bind(&input.item_name_raw)
        .bind(&input.name_raw)
        .bind(&input.brand_name_raw)
        .bind(&input.size_raw)
        .bind(input.qty)
        .bind(input.net_amount)
        .bind(input.rsp_raw)
        .bind(input.mrp_raw)
        .bind(&input.uploaded_by)
        .fetch_one(executor)
        .await
    }
}

impl Purchase {
    /// Append one processed purchase row.
    pub async fn create<'e, E>(executor: E, input: NewPurchase) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            INSERT INTO purchases
                (raw_id, outlet_id, product_id, barcode, article_name, item_name, product_name,
                 brand_name, size, division, section, department, qty, net_amount, rsp, mrp,
                 cgst, sgst, cess, igst, tax, processed_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21, $22)
            RETURNING id, raw_id, outlet_id, product_id, barcode, article_name, item_name,
                      product_name, brand_name, size, division, section, department, qty,
                      net_amount, rsp, mrp, cgst, sgst, cess, igst, tax, processed_by, processed_at
            ",
        )
        .bind(input.raw_id)
        .bind(input.outlet_id)
        .bind(input.product_id)
        .bind(&input.barcode)
        .bind(&input.article_name)
        .bind(&input.item_name)
        .bind(&input.product_name)
        .bind(&input.brand_name)
        .bind(&input.size)
        .bind(&input.division)
        .bind(&input.section)
        .bind(&input.department)
        .bind(input.qty)
        .bind(input.net_amount)
        .bind(input.rsp)
        .bind(input.mrp)
        .bind(input.cgst)
        .bind(input.sgst)
        .bind(input.cess)
        .bind(input.igst)
        .bind(input.tax)
        .bind(&input.processed_by)
        .fetch_one(executor)
        .await
    }

    /// Summed purchased quantity per (outlet, barcode).
    pub async fn totals_by_key<'e, E>(executor: E) -> Result<Vec<KeyQty>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, KeyQty>(
            r"
            SELECT outlet_id, barcode, COALESCE(SUM(qty), 0) AS qty
            FROM purchases
            GROUP BY outlet_id, barcode
            ",
        )
        .fetch_all(executor)
        .await
    }
}

impl PerpetualClosing {
    /// Replace the whole derived table with a freshly computed set, inside
    /// one transaction so readers never observe a partially replaced table.
    pub async fn replace_all(
        pool: &PgPool,
        rows: &[NewPerpetualClosing],
        computed_by: Option<&str>,
    ) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query(r"DELETE FROM perpetual_closing")
            .execute(&mut *tx)
            .await?;

        let mut inserted = 0u64;
        for row in rows {
            sqlx::query(
                r"
                INSERT INTO perpetual_closing (outlet_id, barcode, qty, as_of_date, computed_by)
                VALUES ($1, $2, $3, $4, $5)
                ",
            )
            .bind(row.outlet_id)
            .bind(&row.barcode)
            .bind(row.qty)
            .bind(row.as_of_date)
            .bind(computed_by)
            .execute(&mut *tx)
            .await?;
            inserted += 1;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// Current derived rows, ordered for stable paging.
    pub async fn fetch_all<'e, E>(executor: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            SELECT id, outlet_id, barcode, qty, as_of_date, computed_by, computed_at
            FROM perpetual_closing
            ORDER BY outlet_id, barcode
            ",
        )
        .fetch_all(executor)
        .await
    }
}
