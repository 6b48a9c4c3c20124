//! # Revline Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port/adapter interfaces (traits) for the canonical store and the
//!   upstream record source
//! - The source collector (pagination policy with stall detection)
//! - The sync orchestrator
//! - The reconciliation engine and the field graph
//!
//! ## Architecture Principles
//! - Only depends on `revline-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod fields;
pub mod reconcile;
pub mod store;
pub mod sync;

// Re-export specific items to avoid ambiguity
pub use fields::FieldGraphService;
pub use reconcile::ReconciliationService;
pub use store::ports::{BudgetStore, EstimateStore, FieldStore, InvoiceStore, JobStore};
pub use sync::collector::{FetchOutcome, SourceCollector, SourceCollectorConfig};
pub use sync::ports::RecordSource;
pub use sync::service::{SyncService, SyncServiceConfig};
