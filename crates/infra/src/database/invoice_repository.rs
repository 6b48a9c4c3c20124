//! SQLite-backed implementation of the InvoiceStore port.

use std::sync::Arc;

use async_trait::async_trait;
use revline_core::store::ports::InvoiceStore;
use revline_domain::{Invoice, InvoiceAggregate, Result};
use rusqlite::{OptionalExtension, Row};
use tracing::{debug, instrument};

use super::manager::DbPool;
use crate::errors::InfraError;

const INVOICE_COLUMNS: &str =
    "external_id, number, total, fees, status, job_external_id, date_created, date_updated, raw";

/// SQLite implementation of InvoiceStore.
pub struct SqliteInvoiceStore {
    pool: Arc<DbPool>,
}

impl SqliteInvoiceStore {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

fn map_invoice(row: &Row<'_>) -> rusqlite::Result<Invoice> {
    Ok(Invoice {
        external_id: row.get(0)?,
        number: row.get(1)?,
        total: row.get(2)?,
        fees: row.get(3)?,
        status: row.get(4)?,
        job_external_id: row.get(5)?,
        date_created: row.get(6)?,
        date_updated: row.get(7)?,
        raw: row.get(8)?,
    })
}

#[async_trait]
impl InvoiceStore for SqliteInvoiceStore {
    #[instrument(skip(self, invoice), fields(external_id = %invoice.external_id))]
    async fn upsert(&self, invoice: &Invoice) -> Result<()> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        conn.execute(
            "INSERT INTO invoices (
                external_id, number, total, fees, status, job_external_id,
                date_created, date_updated, raw
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(external_id) DO UPDATE SET
                number = excluded.number,
                total = excluded.total,
                fees = excluded.fees,
                status = excluded.status,
                job_external_id = excluded.job_external_id,
                date_created = excluded.date_created,
                date_updated = excluded.date_updated,
                raw = excluded.raw",
            rusqlite::params![
                invoice.external_id,
                invoice.number,
                invoice.total,
                invoice.fees,
                invoice.status,
                invoice.job_external_id,
                invoice.date_created,
                invoice.date_updated,
                invoice.raw,
            ],
        )
        .map_err(InfraError::from)?;

        debug!(external_id = %invoice.external_id, "invoice upserted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, external_id: &str) -> Result<Option<Invoice>> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let invoice = conn
            .query_row(
                &format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE external_id = ?1"),
                rusqlite::params![external_id],
                map_invoice,
            )
            .optional()
            .map_err(InfraError::from)?;
        Ok(invoice)
    }

    #[instrument(skip(self))]
    async fn for_job(&self, job_external_id: &str) -> Result<Vec<Invoice>> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {INVOICE_COLUMNS} FROM invoices
                 WHERE job_external_id = ?1
                 ORDER BY date_created DESC"
            ))
            .map_err(InfraError::from)?;
        let rows = stmt
            .query_map(rusqlite::params![job_external_id], map_invoice)
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<Vec<Invoice>>>()
            .map_err(InfraError::from)?;
        Ok(rows)
    }

    /// Active invoices grouped per job, each job summed exactly once.
    #[instrument(skip(self))]
    async fn aggregate_by_job(&self) -> Result<Vec<InvoiceAggregate>> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let mut stmt = conn
            .prepare(
                "SELECT job_external_id, SUM(total), SUM(fees)
                 FROM invoices
                 WHERE job_external_id IS NOT NULL
                   AND LOWER(IFNULL(status, '')) NOT IN ('void', 'draft', 'cancelled')
                 GROUP BY job_external_id",
            )
            .map_err(InfraError::from)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(InvoiceAggregate {
                    job_external_id: row.get(0)?,
                    total: row.get(1)?,
                    fees: row.get(2)?,
                })
            })
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<Vec<InvoiceAggregate>>>()
            .map_err(InfraError::from)?;

        debug!(jobs = rows.len(), "invoice aggregates computed");
        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn reset(&self) -> Result<()> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        conn.execute("DELETE FROM invoices", []).map_err(InfraError::from)?;
        Ok(())
    }
}
