//! Scheduler-specific error types.

use std::time::Duration;

use thiserror::Error;

/// Scheduler lifecycle errors.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler already running")]
    AlreadyRunning,

    #[error("scheduler not running")]
    NotRunning,

    #[error("scheduler task did not stop within {duration:?}")]
    Timeout {
        duration: Duration,
        #[source]
        source: tokio::time::error::Elapsed,
    },

    #[error("scheduler task panicked: {0}")]
    Join(String),
}

/// Result type alias for scheduler operations.
pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;
