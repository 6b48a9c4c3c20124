//! Upstream source adapters.

pub mod client;

pub use client::{HttpSourceClient, SourceClientConfig};
