//! Audit domain services.

pub mod ingest;
pub mod lifecycle;
pub mod scan;
pub mod summary;

pub use ingest::{IngestOutcome, IngestService};
pub use lifecycle::{CreateAudit, LifecycleService};
pub use scan::{ScanRequest, ScanService, SubmitOutletOutcome};
pub use summary::{BarcodeSummary, CategorySummary, SummaryService};
