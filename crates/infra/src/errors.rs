//! Conversions from external infrastructure errors into domain errors.

use r2d2::Error as PoolError;
use reqwest::Error as HttpError;
use revline_domain::RevlineError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub RevlineError);

impl From<InfraError> for RevlineError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<RevlineError> for InfraError {
    fn from(value: RevlineError) -> Self {
        InfraError(value)
    }
}

impl From<SqlError> for InfraError {
    fn from(err: SqlError) -> Self {
        use rusqlite::ffi::ErrorCode;

        let mapped = match &err {
            SqlError::SqliteFailure(code, message) => {
                let message = message.clone().unwrap_or_default();
                match code.code {
                    ErrorCode::DatabaseBusy => RevlineError::Database("database is busy".into()),
                    ErrorCode::DatabaseLocked => {
                        RevlineError::Database("database is locked".into())
                    }
                    ErrorCode::ConstraintViolation => {
                        RevlineError::Database(format!("constraint violation: {message}"))
                    }
                    _ => RevlineError::Database(format!("sqlite error: {message}")),
                }
            }
            SqlError::QueryReturnedNoRows => RevlineError::NotFound("no rows".into()),
            other => RevlineError::Database(other.to_string()),
        };
        InfraError(mapped)
    }
}

impl From<PoolError> for InfraError {
    fn from(err: PoolError) -> Self {
        InfraError(RevlineError::Database(format!("pool error: {err}")))
    }
}

impl From<HttpError> for InfraError {
    fn from(err: HttpError) -> Self {
        let mapped = if err.is_timeout() {
            RevlineError::Network("request timed out".into())
        } else if err.is_connect() {
            RevlineError::Network(format!("connection failed: {err}"))
        } else if err.is_decode() {
            RevlineError::Source(format!("malformed response: {err}"))
        } else {
            RevlineError::Network(err.to_string())
        };
        InfraError(mapped)
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(err: serde_json::Error) -> Self {
        InfraError(RevlineError::Source(format!("json error: {err}")))
    }
}
