//! Backstock Database Layer
//!
//! Postgres persistence for the retail back-office: connection pool, embedded
//! migrations, model structs with executor-generic query functions, and the
//! per-audit runtime namespace provisioner.
//!
//! # Layout
//!
//! - [`pool`] - `DbPool` connection pool wrapper
//! - [`migrations`] - embedded shared-schema migrations
//! - [`models`] - directory, ledger and audit lifecycle models (each owns its SQL)
//! - [`runtime`] - per-audit isolated schemas for expected stock and scan events
//! - [`error`] - unified `DbError`

pub mod error;
pub mod migrations;
pub mod models;
pub mod pool;
pub mod runtime;

pub use error::DbError;
pub use migrations::run_migrations;
pub use pool::DbPool;
pub use runtime::{schema_name, RuntimeNamespace};
