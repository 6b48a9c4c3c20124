//! SQLite-backed implementation of the JobStore port.

use std::sync::Arc;

use async_trait::async_trait;
use revline_core::store::ports::JobStore;
use revline_domain::{Job, JobFilter, Result};
use rusqlite::{OptionalExtension, Row, ToSql};
use tracing::{debug, instrument};

use super::manager::DbPool;
use crate::errors::InfraError;

const JOB_COLUMNS: &str = "id, external_id, number, name, job_type, status, sales_rep, total, \
     total_project, total_gross, total_net, permit_fee, financing_fee, \
     date_created, date_updated, raw";

/// SQLite implementation of JobStore.
pub struct SqliteJobStore {
    pool: Arc<DbPool>,
}

impl SqliteJobStore {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

fn map_job(row: &Row<'_>) -> rusqlite::Result<Job> {
    Ok(Job {
        id: row.get(0)?,
        external_id: row.get(1)?,
        number: row.get(2)?,
        name: row.get(3)?,
        job_type: row.get(4)?,
        status: row.get(5)?,
        sales_rep: row.get(6)?,
        total: row.get(7)?,
        total_project: row.get(8)?,
        total_gross: row.get(9)?,
        total_net: row.get(10)?,
        permit_fee: row.get(11)?,
        financing_fee: row.get(12)?,
        date_created: row.get(13)?,
        date_updated: row.get(14)?,
        raw: row.get(15)?,
    })
}

#[async_trait]
impl JobStore for SqliteJobStore {
    #[instrument(skip(self, job), fields(external_id = ?job.external_id))]
    async fn upsert(&self, job: &Job) -> Result<()> {
        let conn = self.pool.get().map_err(InfraError::from)?;

        // The local id is set on first insert only; replays keep it.
        conn.execute(
            "INSERT INTO jobs (
                id, external_id, number, name, job_type, status, sales_rep, total,
                total_project, total_gross, total_net, permit_fee, financing_fee,
                date_created, date_updated, raw
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            ON CONFLICT(external_id) DO UPDATE SET
                number = excluded.number,
                name = excluded.name,
                job_type = excluded.job_type,
                status = excluded.status,
                sales_rep = excluded.sales_rep,
                total = excluded.total,
                total_project = excluded.total_project,
                total_gross = excluded.total_gross,
                total_net = excluded.total_net,
                permit_fee = excluded.permit_fee,
                financing_fee = excluded.financing_fee,
                date_created = excluded.date_created,
                date_updated = excluded.date_updated,
                raw = excluded.raw",
            rusqlite::params![
                job.id,
                job.external_id,
                job.number,
                job.name,
                job.job_type,
                job.status,
                job.sales_rep,
                job.total,
                job.total_project,
                job.total_gross,
                job.total_net,
                job.permit_fee,
                job.financing_fee,
                job.date_created,
                job.date_updated,
                job.raw,
            ],
        )
        .map_err(InfraError::from)?;

        debug!(external_id = ?job.external_id, "job upserted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<Job>> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let job = conn
            .query_row(
                &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE external_id = ?1"),
                rusqlite::params![external_id],
                map_job,
            )
            .optional()
            .map_err(InfraError::from)?;
        Ok(job)
    }

    #[instrument(skip(self))]
    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        let conn = self.pool.get().map_err(InfraError::from)?;

        let mut sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE 1=1");
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(after) = filter.created_after {
            sql.push_str(" AND date_created >= ?");
            params.push(Box::new(after));
        }
        if let Some(before) = filter.created_before {
            sql.push_str(" AND date_created < ?");
            params.push(Box::new(before));
        }
        if let Some(status) = &filter.status_contains {
            sql.push_str(" AND LOWER(IFNULL(status, '')) LIKE ?");
            params.push(Box::new(format!("%{}%", status.to_lowercase())));
        }
        sql.push_str(" ORDER BY date_created DESC");

        let mut stmt = conn.prepare(&sql).map_err(InfraError::from)?;
        let rows = stmt
            .query_map(
                rusqlite::params_from_iter(params.iter().map(|p| p.as_ref())),
                map_job,
            )
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<Vec<Job>>>()
            .map_err(InfraError::from)?;

        debug!(count = rows.len(), "jobs listed");
        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn set_total(&self, external_id: &str, total: f64) -> Result<()> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        conn.execute(
            "UPDATE jobs SET total = ?1 WHERE external_id = ?2",
            rusqlite::params![total, external_id],
        )
        .map_err(InfraError::from)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn reset(&self) -> Result<()> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        conn.execute("DELETE FROM jobs", []).map_err(InfraError::from)?;
        Ok(())
    }
}
