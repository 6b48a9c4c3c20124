//! SQLite-backed implementation of the BudgetStore port.

use std::sync::Arc;

use async_trait::async_trait;
use revline_core::store::ports::BudgetStore;
use revline_domain::{Budget, Result};
use rusqlite::{OptionalExtension, Row};
use tracing::{debug, instrument};

use super::manager::DbPool;
use crate::errors::InfraError;

const BUDGET_COLUMNS: &str =
    "external_id, number, revenue, sales_rep, job_external_id, date_updated, raw";

/// SQLite implementation of BudgetStore.
pub struct SqliteBudgetStore {
    pool: Arc<DbPool>,
}

impl SqliteBudgetStore {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

fn map_budget(row: &Row<'_>) -> rusqlite::Result<Budget> {
    Ok(Budget {
        external_id: row.get(0)?,
        number: row.get(1)?,
        revenue: row.get(2)?,
        sales_rep: row.get(3)?,
        job_external_id: row.get(4)?,
        date_updated: row.get(5)?,
        raw: row.get(6)?,
    })
}

#[async_trait]
impl BudgetStore for SqliteBudgetStore {
    #[instrument(skip(self, budget), fields(external_id = %budget.external_id))]
    async fn upsert(&self, budget: &Budget) -> Result<()> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        conn.execute(
            "INSERT INTO budgets (
                external_id, number, revenue, sales_rep, job_external_id, date_updated, raw
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(external_id) DO UPDATE SET
                number = excluded.number,
                revenue = excluded.revenue,
                sales_rep = excluded.sales_rep,
                job_external_id = excluded.job_external_id,
                date_updated = excluded.date_updated,
                raw = excluded.raw",
            rusqlite::params![
                budget.external_id,
                budget.number,
                budget.revenue,
                budget.sales_rep,
                budget.job_external_id,
                budget.date_updated,
                budget.raw,
            ],
        )
        .map_err(InfraError::from)?;

        debug!(external_id = %budget.external_id, "budget upserted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, external_id: &str) -> Result<Option<Budget>> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let budget = conn
            .query_row(
                &format!("SELECT {BUDGET_COLUMNS} FROM budgets WHERE external_id = ?1"),
                rusqlite::params![external_id],
                map_budget,
            )
            .optional()
            .map_err(InfraError::from)?;
        Ok(budget)
    }

    #[instrument(skip(self))]
    async fn for_job(&self, job_external_id: &str) -> Result<Vec<Budget>> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {BUDGET_COLUMNS} FROM budgets
                 WHERE job_external_id = ?1
                 ORDER BY date_updated DESC"
            ))
            .map_err(InfraError::from)?;
        let rows = stmt
            .query_map(rusqlite::params![job_external_id], map_budget)
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<Vec<Budget>>>()
            .map_err(InfraError::from)?;
        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn all(&self) -> Result<Vec<Budget>> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        let mut stmt = conn
            .prepare(&format!("SELECT {BUDGET_COLUMNS} FROM budgets ORDER BY external_id"))
            .map_err(InfraError::from)?;
        let rows = stmt
            .query_map([], map_budget)
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<Vec<Budget>>>()
            .map_err(InfraError::from)?;
        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn reset(&self) -> Result<()> {
        let conn = self.pool.get().map_err(InfraError::from)?;
        conn.execute("DELETE FROM budgets", []).map_err(InfraError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::database::manager::DbManager;

    fn setup() -> (SqliteBudgetStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let manager = DbManager::new(temp_dir.path().join("test.db"), 2).unwrap();
        manager.run_migrations().unwrap();
        (SqliteBudgetStore::new(manager.pool()), temp_dir)
    }

    fn budget(external_id: &str, revenue: f64, updated: i64) -> Budget {
        Budget {
            external_id: external_id.to_owned(),
            number: None,
            revenue,
            sales_rep: Some("Dana Cole".to_owned()),
            job_external_id: Some("j-1".to_owned()),
            date_updated: updated,
            raw: "{}".to_owned(),
        }
    }

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let (store, _temp) = setup();
        let b = budget("b-1", 1000.0, 10);

        store.upsert(&b).await.unwrap();
        store.upsert(&b).await.unwrap();

        assert_eq!(store.all().await.unwrap().len(), 1);
        assert_eq!(store.get("b-1").await.unwrap().unwrap(), b);
    }

    #[tokio::test]
    async fn for_job_orders_most_recent_first() {
        let (store, _temp) = setup();
        store.upsert(&budget("b-old", 100.0, 10)).await.unwrap();
        store.upsert(&budget("b-new", 200.0, 20)).await.unwrap();

        let budgets = store.for_job("j-1").await.unwrap();
        assert_eq!(budgets.len(), 2);
        assert_eq!(budgets[0].external_id, "b-new");
    }
}
