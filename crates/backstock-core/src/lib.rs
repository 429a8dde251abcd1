//! Backstock Core Library
//!
//! Shared leaf types for the backstock retail back-office.
//!
//! # Modules
//!
//! - [`ids`] - Strongly typed identifiers (AuditId, OutletId, ...)
//! - [`row`] - Normalized tabular rows handed over by the spreadsheet normalizer
//! - [`text`] - Name and barcode normalization helpers
//!
//! # Example
//!
//! ```
//! use backstock_core::{AuditId, OutletId, normalize_barcode};
//!
//! let audit_id = AuditId::new();
//! let outlet_id = OutletId::new();
//!
//! assert_eq!(normalize_barcode(" 890 1234 "), "8901234");
//! ```

pub mod ids;
pub mod row;
pub mod text;

pub use ids::{
    AssignmentId, AuditId, AuditOutletId, OutletId, ParseIdError, ProductId, UploadId,
};
pub use row::{FieldValue, NormalizedRow};
pub use text::{normalize_barcode, normalize_name, normalize_whitespace};
