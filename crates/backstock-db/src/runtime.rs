//! Per-audit runtime namespaces.
//!
//! Each audit gets an isolated Postgres schema holding exactly two tables:
//! `expected_stock` (the book baseline, replaced wholesale per upload) and
//! `scan_events` (append-only field scans). Isolation guarantees summaries for
//! different audits never collide and a purge drops the whole namespace in one
//! statement without touching shared tables.
//!
//! The schema name is a pure function of the audit id, so crash recovery can
//! recompute it without consulting the audit row. All identifiers are derived
//! from uuid hex only; nothing user-controlled reaches the DDL strings.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use backstock_core::AuditId;

use crate::error::DbError;

/// Prefix shared by every runtime schema.
const SCHEMA_PREFIX: &str = "audit_runtime_";

/// Deterministic, collision-free schema name for an audit.
#[must_use]
pub fn schema_name(audit_id: AuditId) -> String {
    format!("{SCHEMA_PREFIX}{}", audit_id.as_uuid().simple())
}

/// One expected-stock baseline row inside a runtime namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ExpectedStockRow {
    pub barcode: String,
    pub outlet_id: Uuid,
    pub article_name: Option<String>,
    pub division: Option<String>,
    pub section: Option<String>,
    pub department: Option<String>,
    pub category_6: Option<String>,
    pub product_id: Option<Uuid>,
    pub book_qty: Decimal,
    pub uploaded_by: Option<String>,
}

/// One append-only scan event inside a runtime namespace.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScanEvent {
    pub id: Uuid,
    pub barcode: String,
    pub outlet_id: Uuid,
    pub qty: Decimal,
    pub user_name: String,
    pub assignment_id: Option<Uuid>,
    pub device_ref: Option<String>,
    pub scanned_at: DateTime<Utc>,
}

/// Input for appending a scan event.
#[derive(Debug, Clone)]
pub struct NewScanEvent {
    pub barcode: String,
    pub outlet_id: Uuid,
    pub qty: Decimal,
    pub user_name: String,
    pub assignment_id: Option<Uuid>,
    pub device_ref: Option<String>,
}

/// Scanned-quantity sum per (barcode, outlet).
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ScannedTotal {
    pub barcode: String,
    pub outlet_id: Uuid,
    pub scanned_qty: Decimal,
}

/// Scan activity rollup per (user, outlet).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UserScanTotal {
    pub user_name: String,
    pub outlet_id: Uuid,
    pub scan_count: i64,
    pub total_qty: Decimal,
}

/// Handle to one audit's runtime namespace.
///
/// The table template is declared here once and instantiated per key;
/// `ensure` is idempotent and safe under concurrent first use.
#[derive(Debug, Clone)]
pub struct RuntimeNamespace {
    schema: String,
}

impl RuntimeNamespace {
    /// Handle for an audit's namespace. Does not touch the database.
    #[must_use]
    pub fn for_audit(audit_id: AuditId) -> Self {
        Self {
            schema: schema_name(audit_id),
        }
    }

    /// The schema name backing this namespace.
    #[must_use]
    pub fn schema(&self) -> &str {
        &self.schema
    }

    fn wrap(&self, source: sqlx::Error) -> DbError {
        DbError::NamespaceFailed {
            schema: self.schema.clone(),
            source,
        }
    }

    /// Create the schema and both tables if absent. Safe to call repeatedly
    /// and concurrently.
    pub async fn ensure(&self, pool: &PgPool) -> Result<(), DbError> {
        let schema = &self.schema;
        let mut tx = pool.begin().await.map_err(|e| self.wrap(e))?;

        sqlx::query(&format!(r#"CREATE SCHEMA IF NOT EXISTS "{schema}""#))
            .execute(&mut *tx)
            .await
            .map_err(|e| self.wrap(e))?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{schema}".expected_stock (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                barcode VARCHAR(50) NOT NULL,
                outlet_id UUID NOT NULL,
                article_name VARCHAR(255),
                division VARCHAR(150),
                section VARCHAR(150),
                department VARCHAR(150),
                category_6 VARCHAR(150),
                product_id UUID,
                book_qty NUMERIC(12, 3) NOT NULL,
                uploaded_by VARCHAR(150),
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#
        ))
        .execute(&mut *tx)
        .await
        .map_err(|e| self.wrap(e))?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{schema}".scan_events (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                barcode VARCHAR(50) NOT NULL,
                outlet_id UUID NOT NULL,
                qty NUMERIC(12, 3) NOT NULL DEFAULT 1,
                user_name VARCHAR(150) NOT NULL,
                assignment_id UUID,
                device_ref VARCHAR(150),
                scanned_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#
        ))
        .execute(&mut *tx)
        .await
        .map_err(|e| self.wrap(e))?;

        tx.commit().await.map_err(|e| self.wrap(e))?;
        tracing::debug!(schema = %schema, "runtime namespace ensured");
        Ok(())
    }

    /// Drop the whole namespace and everything in it. Idempotent: dropping an
    /// absent namespace is not an error.
    pub async fn drop_namespace(&self, pool: &PgPool) -> Result<(), DbError> {
        sqlx::query(&format!(
            r#"DROP SCHEMA IF EXISTS "{}" CASCADE"#,
            self.schema
        ))
        .execute(pool)
        .await
        .map_err(|e| self.wrap(e))?;
        tracing::info!(schema = %self.schema, "runtime namespace dropped");
        Ok(())
    }

    /// Replace the expected-stock baseline with a new upload, all-or-nothing:
    /// a failed ingestion never leaves a half-replaced baseline.
    pub async fn replace_expected(
        &self,
        pool: &PgPool,
        rows: &[ExpectedStockRow],
    ) -> Result<(), DbError> {
        let schema = &self.schema;
        let mut tx = pool.begin().await.map_err(|e| self.wrap(e))?;

        sqlx::query(&format!(r#"DELETE FROM "{schema}".expected_stock"#))
            .execute(&mut *tx)
            .await
            .map_err(|e| self.wrap(e))?;

        for row in rows {
            sqlx::query(&format!(
                r#"
                INSERT INTO "{schema}".expected_stock
                    (barcode, outlet_id, article_name, division, section, department,
                     category_6, product_id, book_qty, uploaded_by)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#
            ))
            .bind(&row.barcode)
            .bind(row.outlet_id)
            .bind(&row.article_name)
            .bind(&row.division)
            .bind(&row.section)
            .bind(&row.department)
            .bind(&row.category_6)
            .bind(row.product_id)
            .bind(row.book_qty)
            .bind(&row.uploaded_by)
            .execute(&mut *tx)
            .await
            .map_err(|e| self.wrap(e))?;
        }

        tx.commit().await.map_err(|e| self.wrap(e))?;
        Ok(())
    }

    /// Append one scan event. Rows are independent; concurrent scans from
    /// other users or devices never conflict with this insert.
    pub async fn append_scan(&self, pool: &PgPool, event: &NewScanEvent) -> Result<(), DbError> {
        sqlx::query(&format!(
            r#"
            INSERT INTO "{}".scan_events
                (barcode, outlet_id, qty, user_name, assignment_id, device_ref)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
            self.schema
        ))
        .bind(&event.barcode)
        .bind(event.outlet_id)
        .bind(event.qty)
        .bind(&event.user_name)
        .bind(event.assignment_id)
        .bind(&event.device_ref)
        .execute(pool)
        .await
        .map_err(|e| self.wrap(e))?;
        Ok(())
    }

    /// Expected-stock rows, optionally filtered to one outlet.
    pub async fn expected_rows(
        &self,
        pool: &PgPool,
        outlet_id: Option<Uuid>,
    ) -> Result<Vec<ExpectedStockRow>, DbError> {
        sqlx::query_as::<_, ExpectedStockRow>(&format!(
            r#"
            SELECT barcode, outlet_id, article_name, division, section, department,
                   category_6, product_id, book_qty, uploaded_by
            FROM "{}".expected_stock
            WHERE $1::uuid IS NULL OR outlet_id = $1
            "#,
            self.schema
        ))
        .bind(outlet_id)
        .fetch_all(pool)
        .await
        .map_err(|e| self.wrap(e))
    }

    /// Scanned-quantity sums per (barcode, outlet), optionally one outlet.
    pub async fn scanned_totals(
        &self,
        pool: &PgPool,
        outlet_id: Option<Uuid>,
    ) -> Result<Vec<ScannedTotal>, DbError> {
        sqlx::query_as::<_, ScannedTotal>(&format!(
            r#"
            SELECT barcode, outlet_id, COALESCE(SUM(qty), 0) AS scanned_qty
            FROM "{}".scan_events
            WHERE $1::uuid IS NULL OR outlet_id = $1
            GROUP BY barcode, outlet_id
            "#,
            self.schema
        ))
        .bind(outlet_id)
        .fetch_all(pool)
        .await
        .map_err(|e| self.wrap(e))
    }

    /// Scan activity per (user, outlet), optionally one outlet.
    pub async fn user_totals(
        &self,
        pool: &PgPool,
        outlet_id: Option<Uuid>,
    ) -> Result<Vec<UserScanTotal>, DbError> {
        sqlx::query_as::<_, UserScanTotal>(&format!(
            r#"
            SELECT user_name, outlet_id,
                   COUNT(id) AS scan_count,
                   COALESCE(SUM(qty), 0) AS total_qty
            FROM "{}".scan_events
            WHERE $1::uuid IS NULL OR outlet_id = $1
            GROUP BY user_name, outlet_id
            ORDER BY user_name, outlet_id
            "#,
            self.schema
        ))
        .bind(outlet_id)
        .fetch_all(pool)
        .await
        .map_err(|e| self.wrap(e))
    }
}
