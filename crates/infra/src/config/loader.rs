//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from file
//! 3. Probes multiple paths for config files
//!
//! ## Environment Variables
//! - `REVLINE_DB_PATH`: Database file path
//! - `REVLINE_DB_POOL_SIZE`: Connection pool size
//! - `REVLINE_SOURCE_BASE_URL`: Upstream API base URL (required)
//! - `REVLINE_SOURCE_TOKEN`: Upstream API bearer token (required)
//! - `REVLINE_SOURCE_TIMEOUT_SECS`: Per-request timeout in seconds
//! - `REVLINE_SOURCE_PAGE_LIMIT`: Requested page size
//! - `REVLINE_SOURCE_MAX_RECORDS`: Per-collection record ceiling
//! - `REVLINE_SOURCE_FETCH_CONCURRENCY`: Concurrent job-detail fetches
//! - `REVLINE_SYNC_INTERVAL`: Sync interval in seconds
//! - `REVLINE_SYNC_ENABLED`: Whether background sync runs (true/false)
//!
//! ## File Locations
//! The loader probes, in order: `./config.toml`, `./revline.toml`,
//! `../config.toml`, `../revline.toml`.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use revline_domain::{Config, Result, RevlineError};
use tracing::{debug, info};

/// Load configuration with automatic fallback strategy.
///
/// # Errors
/// Returns `RevlineError::Config` if neither environment variables nor a
/// config file yield a complete configuration.
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            info!("configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            debug!(error = ?e, "environment incomplete, trying config file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables.
///
/// The source base URL and token are required; everything else falls back to
/// defaults.
///
/// # Errors
/// Returns `RevlineError::Config` when a required variable is missing or a
/// numeric variable is malformed.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();

    config.source.base_url = required_var("REVLINE_SOURCE_BASE_URL")?;
    config.source.api_token = required_var("REVLINE_SOURCE_TOKEN")?;

    if let Some(path) = optional_var("REVLINE_DB_PATH") {
        config.database.path = path;
    }
    if let Some(size) = parsed_var::<u32>("REVLINE_DB_POOL_SIZE")? {
        config.database.pool_size = size;
    }
    if let Some(timeout) = parsed_var::<u64>("REVLINE_SOURCE_TIMEOUT_SECS")? {
        config.source.timeout_secs = timeout;
    }
    if let Some(limit) = parsed_var::<usize>("REVLINE_SOURCE_PAGE_LIMIT")? {
        config.source.page_limit = limit;
    }
    if let Some(ceiling) = parsed_var::<usize>("REVLINE_SOURCE_MAX_RECORDS")? {
        config.source.max_records = ceiling;
    }
    if let Some(concurrency) = parsed_var::<usize>("REVLINE_SOURCE_FETCH_CONCURRENCY")? {
        config.source.fetch_concurrency = concurrency;
    }
    if let Some(interval) = parsed_var::<u64>("REVLINE_SYNC_INTERVAL")? {
        config.sync.interval_secs = interval;
    }
    if let Some(enabled) = parsed_var::<bool>("REVLINE_SYNC_ENABLED")? {
        config.sync.enabled = enabled;
    }

    Ok(config)
}

/// Load configuration from a TOML file, probing default locations when no
/// path is given.
///
/// # Errors
/// Returns `RevlineError::Config` when no file is found or parsing fails.
pub fn load_from_file(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => probe_config_paths()
            .ok_or_else(|| RevlineError::Config("no config file found".into()))?,
    };

    let contents = std::fs::read_to_string(&path).map_err(|e| {
        RevlineError::Config(format!("failed to read {}: {e}", path.display()))
    })?;

    let config: Config = toml::from_str(&contents).map_err(|e| {
        RevlineError::Config(format!("failed to parse {}: {e}", path.display()))
    })?;

    info!(path = %path.display(), "configuration loaded from file");
    Ok(config)
}

fn probe_config_paths() -> Option<PathBuf> {
    const CANDIDATES: &[&str] =
        &["config.toml", "revline.toml", "../config.toml", "../revline.toml"];

    CANDIDATES.iter().map(PathBuf::from).find(|p| p.is_file())
}

fn required_var(name: &str) -> Result<String> {
    optional_var(name)
        .ok_or_else(|| RevlineError::Config(format!("missing environment variable {name}")))
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parsed_var<T: FromStr>(name: &str) -> Result<Option<T>> {
    match optional_var(name) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| RevlineError::Config(format!("malformed value for {name}: {raw}"))),
        None => Ok(None),
    }
}
