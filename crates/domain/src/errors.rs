//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Revline
#[derive(Error, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum RevlineError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Source error: {0}")]
    Source(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Field is calculated and cannot be written directly: {0}")]
    ImmutableField(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Revline operations
pub type Result<T> = std::result::Result<T, RevlineError>;
