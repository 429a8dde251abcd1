//! Postgres-backed store implementations.
//!
//! Thin adapters: each method delegates to the matching model or namespace
//! query in `backstock-db` and lifts ids/errors across the crate boundary.

use std::sync::Arc;

use uuid::Uuid;

use backstock_core::{AssignmentId, AuditId, AuditOutletId, OutletId, ProductId};
use backstock_db::models::{
    AcceptanceStatus, Audit, AuditAssignment, AuditOutlet, AuditStatus, AuditUpload, NewAudit,
    NewAuditUpload, Outlet, Product,
};
use backstock_db::runtime::{
    ExpectedStockRow, NewScanEvent, RuntimeNamespace, ScannedTotal, UserScanTotal,
};
use backstock_db::{DbError, DbPool};

use crate::directory::{CatalogProduct, Directory, ResolvedOutlet};
use crate::error::Result;
use crate::runtime_store::RuntimeStore;
use crate::store::AuditStore;

/// Audit store over a shared Postgres pool.
#[derive(Clone)]
pub struct PgAuditStore {
    pool: Arc<DbPool>,
}

impl PgAuditStore {
    #[must_use]
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AuditStore for PgAuditStore {
    async fn create_audit(&self, input: NewAudit) -> Result<Audit> {
        Ok(Audit::create(self.pool.inner(), input)
            .await
            .map_err(DbError::from)?)
    }

    async fn get_audit(&self, id: AuditId) -> Result<Option<Audit>> {
        Ok(Audit::get(self.pool.inner(), id.into_uuid())
            .await
            .map_err(DbError::from)?)
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Audit>> {
        Ok(Audit::find_by_name(self.pool.inner(), name)
            .await
            .map_err(DbError::from)?)
    }

    async fn set_runtime_schema(&self, id: AuditId, schema: &str) -> Result<()> {
        Audit::set_runtime_schema(self.pool.inner(), id.into_uuid(), schema)
            .await
            .map_err(DbError::from)?;
        Ok(())
    }

    async fn transition_status(
        &self,
        id: AuditId,
        from: &[AuditStatus],
        to: AuditStatus,
    ) -> Result<Option<Audit>> {
        Ok(
            Audit::transition_status(self.pool.inner(), id.into_uuid(), from, to)
                .await
                .map_err(DbError::from)?,
        )
    }

    async fn delete_audit(&self, id: AuditId) -> Result<bool> {
        Ok(Audit::delete(self.pool.inner(), id.into_uuid())
            .await
            .map_err(DbError::from)?)
    }

    async fn add_outlet(&self, audit_id: AuditId, outlet_id: OutletId) -> Result<AuditOutlet> {
        Ok(
            AuditOutlet::create(self.pool.inner(), audit_id.into_uuid(), outlet_id.into_uuid())
                .await
                .map_err(DbError::from)?,
        )
    }

    async fn find_outlet(
        &self,
        audit_id: AuditId,
        outlet_id: OutletId,
    ) -> Result<Option<AuditOutlet>> {
        Ok(
            AuditOutlet::find(self.pool.inner(), audit_id.into_uuid(), outlet_id.into_uuid())
                .await
                .map_err(DbError::from)?,
        )
    }

    async fn list_outlets(&self, audit_id: AuditId) -> Result<Vec<AuditOutlet>> {
        Ok(
            AuditOutlet::list_for_audit(self.pool.inner(), audit_id.into_uuid())
                .await
                .map_err(DbError::from)?,
        )
    }

    async fn set_acceptance(
        &self,
        link_id: AuditOutletId,
        decision: AcceptanceStatus,
        actor: Option<&str>,
    ) -> Result<Option<AuditOutlet>> {
        Ok(
            AuditOutlet::set_acceptance(self.pool.inner(), link_id.into_uuid(), decision, actor)
                .await
                .map_err(DbError::from)?,
        )
    }

    async fn mark_outlet_submitted_if_open(
        &self,
        link_id: AuditOutletId,
        submitted_by: Option<&str>,
    ) -> Result<Option<AuditOutlet>> {
        Ok(AuditOutlet::mark_submitted_if_open(
            self.pool.inner(),
            link_id.into_uuid(),
            submitted_by,
        )
        .await
        .map_err(DbError::from)?)
    }

    async fn count_unsubmitted_outlets(&self, audit_id: AuditId) -> Result<i64> {
        Ok(
            AuditOutlet::count_unsubmitted(self.pool.inner(), audit_id.into_uuid())
                .await
                .map_err(DbError::from)?,
        )
    }

    async fn create_assignment(
        &self,
        audit_id: AuditId,
        link_id: AuditOutletId,
        outlet_id: OutletId,
        user_name: &str,
        assigned_by: Option<&str>,
    ) -> Result<AuditAssignment> {
        Ok(AuditAssignment::create(
            self.pool.inner(),
            audit_id.into_uuid(),
            link_id.into_uuid(),
            outlet_id.into_uuid(),
            user_name,
            assigned_by,
        )
        .await
        .map_err(DbError::from)?)
    }

    async fn get_assignment(
        &self,
        audit_id: AuditId,
        id: AssignmentId,
    ) -> Result<Option<AuditAssignment>> {
        Ok(
            AuditAssignment::get(self.pool.inner(), audit_id.into_uuid(), id.into_uuid())
                .await
                .map_err(DbError::from)?,
        )
    }

    async fn find_assignment_for_scan(
        &self,
        audit_id: AuditId,
        outlet_id: OutletId,
        user_name: &str,
        assignment_id: Option<AssignmentId>,
    ) -> Result<Option<AuditAssignment>> {
        Ok(AuditAssignment::find_for_scan(
            self.pool.inner(),
            audit_id.into_uuid(),
            outlet_id.into_uuid(),
            user_name,
            assignment_id.map(AssignmentId::into_uuid),
        )
        .await
        .map_err(DbError::from)?)
    }

    async fn mark_assignment_active_if_assigned(
        &self,
        id: AssignmentId,
    ) -> Result<Option<AuditAssignment>> {
        Ok(
            AuditAssignment::mark_active_if_assigned(self.pool.inner(), id.into_uuid())
                .await
                .map_err(DbError::from)?,
        )
    }

    async fn mark_assignment_submitted(
        &self,
        id: AssignmentId,
    ) -> Result<Option<AuditAssignment>> {
        Ok(
            AuditAssignment::mark_submitted(self.pool.inner(), id.into_uuid())
                .await
                .map_err(DbError::from)?,
        )
    }

    async fn count_open_assignments(&self, audit_id: AuditId, outlet_id: OutletId) -> Result<i64> {
        Ok(AuditAssignment::count_open_for_outlet(
            self.pool.inner(),
            audit_id.into_uuid(),
            outlet_id.into_uuid(),
        )
        .await
        .map_err(DbError::from)?)
    }

    async fn record_upload(&self, input: NewAuditUpload) -> Result<AuditUpload> {
        Ok(AuditUpload::create(self.pool.inner(), input)
            .await
            .map_err(DbError::from)?)
    }
}

/// Runtime namespace store over a shared Postgres pool.
#[derive(Clone)]
pub struct PgRuntimeStore {
    pool: Arc<DbPool>,
}

impl PgRuntimeStore {
    #[must_use]
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    fn namespace(audit_id: AuditId) -> RuntimeNamespace {
        RuntimeNamespace::for_audit(audit_id)
    }
}

#[async_trait::async_trait]
impl RuntimeStore for PgRuntimeStore {
    async fn ensure(&self, audit_id: AuditId) -> Result<()> {
        Ok(Self::namespace(audit_id).ensure(self.pool.inner()).await?)
    }

    async fn drop_namespace(&self, audit_id: AuditId) -> Result<()> {
        Ok(Self::namespace(audit_id)
            .drop_namespace(self.pool.inner())
            .await?)
    }

    async fn replace_expected(&self, audit_id: AuditId, rows: &[ExpectedStockRow]) -> Result<()> {
        Ok(Self::namespace(audit_id)
            .replace_expected(self.pool.inner(), rows)
            .await?)
    }

    async fn append_scan(&self, audit_id: AuditId, event: &NewScanEvent) -> Result<()> {
        Ok(Self::namespace(audit_id)
            .append_scan(self.pool.inner(), event)
            .await?)
    }

    async fn expected_rows(
        &self,
        audit_id: AuditId,
        outlet_id: Option<Uuid>,
    ) -> Result<Vec<ExpectedStockRow>> {
        Ok(Self::namespace(audit_id)
            .expected_rows(self.pool.inner(), outlet_id)
            .await?)
    }

    async fn scanned_totals(
        &self,
        audit_id: AuditId,
        outlet_id: Option<Uuid>,
    ) -> Result<Vec<ScannedTotal>> {
        Ok(Self::namespace(audit_id)
            .scanned_totals(self.pool.inner(), outlet_id)
            .await?)
    }

    async fn user_totals(
        &self,
        audit_id: AuditId,
        outlet_id: Option<Uuid>,
    ) -> Result<Vec<UserScanTotal>> {
        Ok(Self::namespace(audit_id)
            .user_totals(self.pool.inner(), outlet_id)
            .await?)
    }
}

/// Directory lookups over the shared outlet and product tables.
#[derive(Clone)]
pub struct PgDirectory {
    pool: Arc<DbPool>,
}

impl PgDirectory {
    #[must_use]
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl Directory for PgDirectory {
    async fn resolve_outlet(&self, name: &str) -> Result<Option<ResolvedOutlet>> {
        let outlet = Outlet::resolve(self.pool.inner(), name)
            .await
            .map_err(DbError::from)?;
        Ok(outlet.map(|o| ResolvedOutlet {
            id: OutletId::from_uuid(o.id),
            name: o.outlet_name,
        }))
    }

    async fn latest_active_product(&self, barcode: &str) -> Result<Option<CatalogProduct>> {
        let product = Product::latest_active_by_barcode(self.pool.inner(), barcode)
            .await
            .map_err(DbError::from)?;
        Ok(product.map(|p| CatalogProduct {
            id: ProductId::from_uuid(p.id),
            barcode: p.barcode,
            article_name: p.article_name,
            item_name: p.item_name,
            product_name: p.product_name,
            division: p.division,
            section: p.section,
            department: p.department,
            category_6: p.category_6,
        }))
    }
}
