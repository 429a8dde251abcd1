//! Product/outlet directory consumed by the audit domain.
//!
//! Resolution happens on normalized forms: outlet names match by exact
//! canonical name first, then alias; products resolve to the latest active
//! version of their barcode chain.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use backstock_core::text::{normalize_barcode, normalize_name};
use backstock_core::{OutletId, ProductId};

use crate::error::Result;

/// An outlet as the audit domain sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutlet {
    pub id: OutletId,
    pub name: String,
}

/// Catalog attributes denormalized into expected-stock rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogProduct {
    pub id: ProductId,
    pub barcode: String,
    pub article_name: Option<String>,
    pub item_name: Option<String>,
    pub product_name: Option<String>,
    pub division: Option<String>,
    pub section: Option<String>,
    pub department: Option<String>,
    pub category_6: Option<String>,
}

impl CatalogProduct {
    /// Best display name: article, else item, else product name.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.article_name
            .as_deref()
            .or(self.item_name.as_deref())
            .or(self.product_name.as_deref())
    }
}

/// Directory lookups.
#[async_trait::async_trait]
pub trait Directory: Send + Sync {
    /// Resolve a free-text outlet name (canonical name or alias).
    async fn resolve_outlet(&self, name: &str) -> Result<Option<ResolvedOutlet>>;

    /// Latest active catalog record for a barcode.
    async fn latest_active_product(&self, barcode: &str) -> Result<Option<CatalogProduct>>;
}

/// In-memory directory for testing.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    outlets: Arc<RwLock<HashMap<String, ResolvedOutlet>>>,
    products: Arc<RwLock<HashMap<String, CatalogProduct>>>,
}

impl InMemoryDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an outlet under its canonical name.
    pub async fn add_outlet(&self, id: OutletId, name: &str) -> ResolvedOutlet {
        let outlet = ResolvedOutlet {
            id,
            name: normalize_name(name),
        };
        self.outlets
            .write()
            .await
            .insert(outlet.name.clone(), outlet.clone());
        outlet
    }

    /// Register an alias for an already-added outlet.
    pub async fn add_alias(&self, alias: &str, outlet: &ResolvedOutlet) {
        self.outlets
            .write()
            .await
            .insert(normalize_name(alias), outlet.clone());
    }

    /// Register a product as the active version for its barcode.
    pub async fn add_product(&self, product: CatalogProduct) {
        self.products
            .write()
            .await
            .insert(normalize_barcode(&product.barcode), product);
    }
}

#[async_trait::async_trait]
impl Directory for InMemoryDirectory {
    async fn resolve_outlet(&self, name: &str) -> Result<Option<ResolvedOutlet>> {
        Ok(self.outlets.read().await.get(&normalize_name(name)).cloned())
    }

    async fn latest_active_product(&self, barcode: &str) -> Result<Option<CatalogProduct>> {
        Ok(self
            .products
            .read()
            .await
            .get(&normalize_barcode(barcode))
            .cloned())
    }
}
