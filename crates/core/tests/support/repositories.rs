//! In-memory implementations of the store ports.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use revline_core::store::ports::{
    BudgetStore, EstimateStore, FieldStore, InvoiceStore, JobStore,
};
use revline_domain::{
    Budget, EntityKind, Estimate, FieldDefinition, FieldValue, Invoice, InvoiceAggregate, Job,
    JobFilter, Result, RevlineError,
};

fn lock_err() -> RevlineError {
    RevlineError::Internal("test store lock poisoned".into())
}

/// In-memory job store keyed by external id.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<String, Job>>,
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn upsert(&self, job: &Job) -> Result<()> {
        let Some(external_id) = job.external_id.clone() else {
            return Err(RevlineError::InvalidInput("job without external id".into()));
        };
        let mut jobs = self.jobs.lock().map_err(|_| lock_err())?;
        let mut stored = job.clone();
        if let Some(existing) = jobs.get(&external_id) {
            // Local id is immutable once assigned.
            stored.id = existing.id.clone();
        }
        jobs.insert(external_id, stored);
        Ok(())
    }

    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<Job>> {
        Ok(self.jobs.lock().map_err(|_| lock_err())?.get(external_id).cloned())
    }

    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        let jobs = self.jobs.lock().map_err(|_| lock_err())?;
        Ok(jobs
            .values()
            .filter(|j| {
                filter.created_after.map_or(true, |t| j.date_created >= t)
                    && filter.created_before.map_or(true, |t| j.date_created < t)
                    && filter.status_contains.as_deref().map_or(true, |s| {
                        j.status
                            .as_deref()
                            .unwrap_or_default()
                            .to_lowercase()
                            .contains(&s.to_lowercase())
                    })
            })
            .cloned()
            .collect())
    }

    async fn set_total(&self, external_id: &str, total: f64) -> Result<()> {
        let mut jobs = self.jobs.lock().map_err(|_| lock_err())?;
        if let Some(job) = jobs.get_mut(external_id) {
            job.total = total;
        }
        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        self.jobs.lock().map_err(|_| lock_err())?.clear();
        Ok(())
    }
}

/// In-memory budget store.
#[derive(Default)]
pub struct MemoryBudgetStore {
    budgets: Mutex<HashMap<String, Budget>>,
}

#[async_trait]
impl BudgetStore for MemoryBudgetStore {
    async fn upsert(&self, budget: &Budget) -> Result<()> {
        self.budgets
            .lock()
            .map_err(|_| lock_err())?
            .insert(budget.external_id.clone(), budget.clone());
        Ok(())
    }

    async fn get(&self, external_id: &str) -> Result<Option<Budget>> {
        Ok(self.budgets.lock().map_err(|_| lock_err())?.get(external_id).cloned())
    }

    async fn for_job(&self, job_external_id: &str) -> Result<Vec<Budget>> {
        let budgets = self.budgets.lock().map_err(|_| lock_err())?;
        let mut matching: Vec<Budget> = budgets
            .values()
            .filter(|b| b.job_external_id.as_deref() == Some(job_external_id))
            .cloned()
            .collect();
        matching.sort_by_key(|b| std::cmp::Reverse(b.date_updated));
        Ok(matching)
    }

    async fn all(&self) -> Result<Vec<Budget>> {
        let mut all: Vec<Budget> =
            self.budgets.lock().map_err(|_| lock_err())?.values().cloned().collect();
        all.sort_by(|a, b| a.external_id.cmp(&b.external_id));
        Ok(all)
    }

    async fn reset(&self) -> Result<()> {
        self.budgets.lock().map_err(|_| lock_err())?.clear();
        Ok(())
    }
}

/// In-memory estimate store.
#[derive(Default)]
pub struct MemoryEstimateStore {
    estimates: Mutex<HashMap<String, Estimate>>,
}

#[async_trait]
impl EstimateStore for MemoryEstimateStore {
    async fn upsert(&self, estimate: &Estimate) -> Result<()> {
        self.estimates
            .lock()
            .map_err(|_| lock_err())?
            .insert(estimate.external_id.clone(), estimate.clone());
        Ok(())
    }

    async fn get(&self, external_id: &str) -> Result<Option<Estimate>> {
        Ok(self.estimates.lock().map_err(|_| lock_err())?.get(external_id).cloned())
    }

    async fn for_job(&self, job_external_id: &str) -> Result<Vec<Estimate>> {
        Ok(self
            .estimates
            .lock()
            .map_err(|_| lock_err())?
            .values()
            .filter(|e| e.job_external_id.as_deref() == Some(job_external_id))
            .cloned()
            .collect())
    }

    async fn reset(&self) -> Result<()> {
        self.estimates.lock().map_err(|_| lock_err())?.clear();
        Ok(())
    }
}

/// In-memory invoice store.
#[derive(Default)]
pub struct MemoryInvoiceStore {
    invoices: Mutex<HashMap<String, Invoice>>,
}

#[async_trait]
impl InvoiceStore for MemoryInvoiceStore {
    async fn upsert(&self, invoice: &Invoice) -> Result<()> {
        self.invoices
            .lock()
            .map_err(|_| lock_err())?
            .insert(invoice.external_id.clone(), invoice.clone());
        Ok(())
    }

    async fn get(&self, external_id: &str) -> Result<Option<Invoice>> {
        Ok(self.invoices.lock().map_err(|_| lock_err())?.get(external_id).cloned())
    }

    async fn for_job(&self, job_external_id: &str) -> Result<Vec<Invoice>> {
        Ok(self
            .invoices
            .lock()
            .map_err(|_| lock_err())?
            .values()
            .filter(|i| i.job_external_id.as_deref() == Some(job_external_id))
            .cloned()
            .collect())
    }

    async fn aggregate_by_job(&self) -> Result<Vec<InvoiceAggregate>> {
        let invoices = self.invoices.lock().map_err(|_| lock_err())?;
        let mut by_job: HashMap<String, (f64, f64)> = HashMap::new();
        for invoice in invoices.values() {
            if !invoice.is_active() {
                continue;
            }
            let Some(job_id) = invoice.job_external_id.clone() else {
                continue;
            };
            let entry = by_job.entry(job_id).or_insert((0.0, 0.0));
            entry.0 += invoice.total;
            entry.1 += invoice.fees;
        }
        Ok(by_job
            .into_iter()
            .map(|(job_external_id, (total, fees))| InvoiceAggregate {
                job_external_id,
                total,
                fees,
            })
            .collect())
    }

    async fn reset(&self) -> Result<()> {
        self.invoices.lock().map_err(|_| lock_err())?.clear();
        Ok(())
    }
}

type ValueKey = (String, EntityKind, String);

/// In-memory field definition/value store.
#[derive(Default)]
pub struct MemoryFieldStore {
    definitions: Mutex<HashMap<String, FieldDefinition>>,
    values: Mutex<HashMap<ValueKey, FieldValue>>,
}

#[async_trait]
impl FieldStore for MemoryFieldStore {
    async fn upsert_definition(&self, definition: &FieldDefinition) -> Result<()> {
        self.definitions
            .lock()
            .map_err(|_| lock_err())?
            .insert(definition.id.clone(), definition.clone());
        Ok(())
    }

    async fn definition(&self, field_id: &str) -> Result<Option<FieldDefinition>> {
        Ok(self.definitions.lock().map_err(|_| lock_err())?.get(field_id).cloned())
    }

    async fn definitions_for(
        &self,
        entity_type: EntityKind,
        active_only: bool,
    ) -> Result<Vec<FieldDefinition>> {
        let definitions = self.definitions.lock().map_err(|_| lock_err())?;
        let mut matching: Vec<FieldDefinition> = definitions
            .values()
            .filter(|d| d.entity_type == entity_type && (!active_only || d.is_active))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matching)
    }

    async fn upsert_value(&self, value: &FieldValue) -> Result<()> {
        let key =
            (value.field_id.clone(), value.entity_type, value.entity_id.clone());
        let mut values = self.values.lock().map_err(|_| lock_err())?;
        // One row per (field, entity) tuple: keep the original row id.
        let mut stored = value.clone();
        if let Some(existing) = values.get(&key) {
            stored.id = existing.id.clone();
        }
        values.insert(key, stored);
        Ok(())
    }

    async fn value(
        &self,
        field_id: &str,
        entity_type: EntityKind,
        entity_id: &str,
    ) -> Result<Option<FieldValue>> {
        let key = (field_id.to_owned(), entity_type, entity_id.to_owned());
        Ok(self.values.lock().map_err(|_| lock_err())?.get(&key).cloned())
    }

    async fn values_for_entity(
        &self,
        entity_type: EntityKind,
        entity_id: &str,
    ) -> Result<Vec<FieldValue>> {
        Ok(self
            .values
            .lock()
            .map_err(|_| lock_err())?
            .values()
            .filter(|v| v.entity_type == entity_type && v.entity_id == entity_id)
            .cloned()
            .collect())
    }
}
