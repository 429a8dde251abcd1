//! Backstock Audit Domain
//!
//! Stocktake audits over a set of outlets: lifecycle state machine with
//! per-audit runtime namespaces, expected-stock ingestion, the append-only
//! scan ledger, and book-vs-scanned summaries.
//!
//! # Architecture
//!
//! Services hold trait objects for their storage concerns, so business rules
//! run identically against Postgres and the in-memory doubles used in tests:
//!
//! - [`store::AuditStore`] - audits, outlet links, assignments, upload log
//! - [`runtime_store::RuntimeStore`] - per-audit expected stock and scans
//! - [`directory::Directory`] - outlet and product catalog lookups
//!
//! The Postgres implementations live in [`pg`] and delegate to
//! `backstock-db`.

pub mod directory;
pub mod error;
pub mod pg;
pub mod runtime_store;
pub mod services;
pub mod store;

pub use directory::{CatalogProduct, Directory, InMemoryDirectory, ResolvedOutlet};
pub use error::{AuditError, Result};
pub use pg::{PgAuditStore, PgDirectory, PgRuntimeStore};
pub use runtime_store::{InMemoryRuntimeStore, RuntimeStore};
pub use services::{
    BarcodeSummary, CategorySummary, CreateAudit, IngestOutcome, IngestService, LifecycleService,
    ScanRequest, ScanService, SubmitOutletOutcome, SummaryService,
};
pub use store::{AuditStore, InMemoryAuditStore};
