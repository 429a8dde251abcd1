//! Backstock Inventory Domain
//!
//! The shared inventory side of the back-office: append-only ledger ingestion
//! (closing stock, sales, purchases, purchase returns), the product catalog
//! version chain, and the perpetual-closing recompute that reconciles all of
//! it into one on-hand quantity per (outlet, barcode).
//!
//! Services depend on storage traits ([`store`]) with Postgres
//! implementations in [`pg`] and in-memory doubles for tests.

pub mod catalog;
pub mod error;
pub mod ingest;
pub mod pg;
pub mod recompute;
pub mod store;

pub use catalog::{CatalogService, CatalogTally, UpsertOutcome};
pub use error::{InventoryError, Result};
pub use ingest::{IngestTally, LedgerIngestService, PurchaseTally};
pub use pg::{PgCatalogStore, PgLedgerStore, PgOutletResolver};
pub use recompute::{RecomputeService, RecomputeStats};
pub use store::{
    CatalogStore, InMemoryCatalogStore, InMemoryLedgerStore, InMemoryOutletResolver, LedgerStore,
    OutletResolver,
};
