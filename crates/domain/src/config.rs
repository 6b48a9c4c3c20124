//! Application configuration structures.
//!
//! Loaded by `revline-infra::config` from environment variables or a config
//! file; defaults here keep a bare workspace runnable against a local
//! database.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_FETCH_CONCURRENCY, DEFAULT_MAX_RECORDS, DEFAULT_PAGE_LIMIT};

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Canonical store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file path.
    pub path: String,
    /// Connection pool size.
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "revline.db".to_string(), pool_size: 4 }
    }
}

/// Upstream source API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL of the upstream API.
    pub base_url: String,
    /// Bearer token for the upstream API.
    pub api_token: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Requested page size for collection fetches.
    pub page_limit: usize,
    /// Hard ceiling on records fetched per collection.
    pub max_records: usize,
    /// Concurrent in-flight job-detail fetches.
    pub fetch_concurrency: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.example.com/v1".to_string(),
            api_token: String::new(),
            timeout_secs: 30,
            page_limit: DEFAULT_PAGE_LIMIT,
            max_records: DEFAULT_MAX_RECORDS,
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
        }
    }
}

/// Periodic sync configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Whether the background scheduler runs.
    pub enabled: bool,
    /// Interval between sync passes in seconds.
    pub interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { enabled: true, interval_secs: 900 }
    }
}
