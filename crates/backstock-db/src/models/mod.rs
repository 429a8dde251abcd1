//! Database models.
//!
//! Each model owns its SQL: `FromRow` structs with executor-generic query
//! functions. Services in the domain crates call these through store traits.

pub mod audit;
pub mod ledger;
pub mod outlet;
pub mod product;

pub use audit::{
    AcceptanceStatus, AssignmentStatus, Audit, AuditAssignment, AuditOutlet, AuditStatus,
    AuditUpload, NewAudit, NewAuditUpload, SubmissionStatus,
};
pub use ledger::{
    ClosingStock, KeyQty, KeyQtyDate, NewClosingStock, NewPerpetualClosing, NewPurchase,
    NewPurchaseRaw, NewPurchaseReturn, NewSale, PerpetualClosing, Purchase, PurchaseRaw,
    PurchaseReturn, Sale,
};
pub use outlet::{NewOutlet, Outlet, OutletAlias};
pub use product::{NewProduct, Product};
