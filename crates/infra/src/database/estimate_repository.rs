//! SQLite-backed implementation of the EstimateStore port.

use std::sync::Arc;

use async_trait::async_trait;
use revline_core::store::ports::EstimateStore;
use revline_domain::{Estimate, Result};
use rusqlite::{OptionalExtension, Row};
use tracing::{debug, instrument};

use super::manager::DbPool;
use crate::errors::InfraError;

const ESTIMATE_COLUMNS: &str =
    "external_id, number, total, status, job_external_id, date_updated, raw";

/// SQLite implementation of EstimateStore.
pub struct SqliteEstimateStore {
    pool: Arc<DbPool>,
}

impl SqliteEstimateStore {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

fn map_estimate(row: &Row<'_>) -> rusqlite::Result<Estimate> {
    Ok(Estimate {
        external_id: row.get(0)?,
        number: row.get(1)?,
        total: row.get(2)?,
        status: row.get(3)?,
        job_external_id: row.get(4)?,
        date_updated: row.get(5)?,
        raw: row.get(6)?,
    })
}

#[async_trait]
impl EstimateStore for SqliteEstimateStore {
    #[instrument(skip(self, estimate), fields(external_id = %estimate.external_id))]
    async fn upsert(&self, estimate: &Estimate) -> Result<()> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        conn.execute(
            "INSERT INTO estimates (
                external_id, number, total, status, job_external_id, date_updated, raw
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(external_id) DO UPDATE SET
                number = excluded.number,
                total = excluded.total,
                status = excluded.status,
                job_external_id = excluded.job_external_id,
                date_updated = excluded.date_updated,
                raw = excluded.raw",
            rusqlite::params![
                estimate.external_id,
                estimate.number,
                estimate.total,
                estimate.status,
                estimate.job_external_id,
                estimate.date_updated,
                estimate.raw,
            ],
        )
        .map_err(InfraError::from)?;

        debug!(external_id = %estimate.external_id, "estimate upserted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, external_id: &str) -> Result<Option<Estimate>> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let estimate = conn
            .query_row(
                &format!("SELECT {ESTIMATE_COLUMNS} FROM estimates WHERE external_id = ?1"),
                rusqlite::params![external_id],
                map_estimate,
            )
            .optional()
            .map_err(InfraError::from)?;
        Ok(estimate)
    }

    #[instrument(skip(self))]
    async fn for_job(&self, job_external_id: &str) -> Result<Vec<Estimate>> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {ESTIMATE_COLUMNS} FROM estimates
                 WHERE job_external_id = ?1
                 ORDER BY date_updated DESC"
            ))
            .map_err(InfraError::from)?;
        let rows = stmt
            .query_map(rusqlite::params![job_external_id], map_estimate)
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<Vec<Estimate>>>()
            .map_err(InfraError::from)?;
        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn reset(&self) -> Result<()> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        conn.execute("DELETE FROM estimates", []).map_err(InfraError::from)?;
        Ok(())
    }
}
