//! Product catalog model.
//!
//! Products form an append-only version chain per barcode: each revision is a
//! new row with an incremented version, and exactly one row per barcode
//! carries the active flag. The current record is always the max-version row.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

/// One version of a catalog product.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    /// Unique identifier of this version row.
    pub id: Uuid,
    /// Barcode shared by all versions of the product.
    pub barcode: String,
    /// 1-based version within the barcode's chain.
    pub version: i32,
    /// Whether this is the current version.
    pub is_active: bool,

    pub remarks: Option<String>,
    pub category_6: Option<String>,
    pub category_group: Option<String>,
    pub supplier_name: Option<String>,
    pub hsn_code: Option<String>,

    pub division: Option<String>,
    pub section: Option<String>,
    pub department: Option<String>,

    pub article_name: Option<String>,
    pub item_name: Option<String>,
    pub product_name: Option<String>,
    pub brand_name: Option<String>,
    pub size: Option<String>,
    pub weight: Option<String>,

    pub rsp: Option<Decimal>,
    pub mrp: Option<Decimal>,
    pub cgst: Option<Decimal>,
    pub sgst: Option<Decimal>,
    pub cess: Option<Decimal>,
    pub igst: Option<Decimal>,
    pub tax: Option<Decimal>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Attributes for a new product version.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewProduct {
    pub barcode: String,
    pub remarks: Option<String>,
    pub category_6: Option<String>,
    pub category_group: Option<String>,
    pub supplier_name: Option<String>,
    pub hsn_code: Option<String>,
    pub division: Option<String>,
    pub section: Option<String>,
    pub department: Option<String>,
    pub article_name: Option<String>,
    pub item_name: Option<String>,
    pub product_name: Option<String>,
    pub brand_name: Option<String>,
    pub size: Option<String>,
    pub weight: Option<String>,
    pub rsp: Option<Decimal>,
    pub mrp: Option<Decimal>,
    pub cgst: Option<Decimal>,
    pub sgst: Option<Decimal>,
    pub cess: Option<Decimal>,
    pub igst: Option<Decimal>,
    pub tax: Option<Decimal>,
}

const PRODUCT_COLUMNS: &str = r"id, barcode, version, is_active, remarks, category_6,
    category_group, supplier_name, hsn_code, division, section, department,
    article_name, item_name, product_name, brand_name, size, weight,
    rsp, mrp, cgst, sgst, cess, igst, tax, created_at, updated_at";

impl Product {
    /// Latest version for a barcode regardless of active flag.
    pub async fn latest_by_barcode<'e, E>(
        executor: E,
        barcode: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE barcode = $1
            ORDER BY version DESC
            LIMIT 1
            "
        ))
        .bind(barcode)
        .fetch_optional(executor)
        .await
    }

    /// Latest active version for a barcode.
    pub async fn latest_active_by_barcode<'e, E>(
        executor: E,
        barcode: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(&format!(
            r"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE barcode = $1 AND is_active
            ORDER BY version DESC
            LIMIT 1
            "
        ))
        .bind(barcode)
        .fetch_optional(executor)
        .await
    }

    /// Clear the active flag on every version of a barcode. Returns the
    /// number of rows touched.
    pub async fn deactivate_versions<'e, E>(executor: E, barcode: &str) -> Result<u64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            r"
            UPDATE products SET is_active = FALSE, updated_at = now()
            WHERE barcode = $1 AND is_active
            ",
        )
        .bind(barcode)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// Re-flag a specific version row as active.
    pub async fn reactivate<'e, E>(executor: E, id: Uuid) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query(
            r"
            UPDATE products SET is_active = TRUE, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Append a new version row for a barcode.
    pub async fn insert_version<'e, E>(
        executor: E,
        input: &NewProduct,
        version: i32,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(&format!(
            r"
            INSERT INTO products
                (barcode, version, is_active, remarks, category_6, category_group,
                 supplier_name, hsn_code, division, section, department,
                 article_name, item_name, product_name, brand_name, size, weight,
                 rsp, mrp, cgst, sgst, cess, igst, tax)
            VALUES ($1, $2, TRUE, $3, $4, $5, $6, $7, $8, $9, $10,
                    $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(&input.barcode)
        .bind(version)
        .bind(&input.remarks)
        .bind(&input.category_6)
        .bind(&input.category_group)
        .bind(&input.supplier_name)
        .bind(&input.hsn_code)
        .bind(&input.division)
        .bind(&input.section)
        .bind(&input.department)
        .bind(&input.article_name)
        .bind(&input.item_name)
        .bind(&input.product_name)
        .bind(&input.brand_name)
        .bind(&input.size)
        .bind(&input.weight)
        .bind(input.rsp)
        .bind(input.mrp)
        .bind(input.cgst)
        .bind(input.sgst)
        .bind(input.cess)
        .bind(input.igst)
        .bind(input.tax)
        .fetch_one(executor)
        .await
    }

    /// Best display name: article, else item, else product name.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.article_name
            .as_deref()
            .or(self.item_name.as_deref())
            .or(self.product_name.as_deref())
    }
}
