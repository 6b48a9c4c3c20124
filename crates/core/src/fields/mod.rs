//! User-defined field graph: stored, calculated, and auto-populated fields
//! with single-level dependency propagation.

pub mod service;

pub use service::{EntityFieldValue, FieldGraphService};
