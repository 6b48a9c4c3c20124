//! Reconciliation engine: effective revenue, discrepancy audit, sales
//! attribution.

pub mod service;

pub use service::{is_closed_status, is_sale_status, ReconciliationService};
