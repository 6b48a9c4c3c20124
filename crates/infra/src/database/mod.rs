//! SQLite-backed implementations of the canonical store ports.

pub mod budget_repository;
pub mod estimate_repository;
pub mod field_repository;
pub mod invoice_repository;
pub mod job_repository;
pub mod manager;

pub use budget_repository::SqliteBudgetStore;
pub use estimate_repository::SqliteEstimateStore;
pub use field_repository::SqliteFieldStore;
pub use invoice_repository::SqliteInvoiceStore;
pub use job_repository::SqliteJobStore;
pub use manager::{DbConnection, DbManager, DbPool};
