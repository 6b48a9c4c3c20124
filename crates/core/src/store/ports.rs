//! Port interfaces for the canonical store.
//!
//! All upserts are idempotent: replaying the same input any number of times
//! yields the same stored state. Child entities reference jobs weakly by
//! external id; resolution failures are silent no-ops, not errors.

use async_trait::async_trait;
use revline_domain::{
    Budget, EntityKind, Estimate, FieldDefinition, FieldValue, Invoice, InvoiceAggregate, Job,
    JobFilter, Result,
};

/// Store for canonical jobs.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert or overwrite a job, keyed by external id. The local id is
    /// assigned on first insert and never changes afterwards.
    async fn upsert(&self, job: &Job) -> Result<()>;

    /// Fetch a job by its external id.
    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<Job>>;

    /// Fetch jobs matching a status/time filter.
    async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>>;

    /// Overwrite a job's legacy `total` field.
    async fn set_total(&self, external_id: &str, total: f64) -> Result<()>;

    /// Delete all synced jobs (explicit reset only).
    async fn reset(&self) -> Result<()>;
}

/// Store for canonical budgets.
#[async_trait]
pub trait BudgetStore: Send + Sync {
    async fn upsert(&self, budget: &Budget) -> Result<()>;

    async fn get(&self, external_id: &str) -> Result<Option<Budget>>;

    /// All budgets linked to the given job, most recently updated first.
    async fn for_job(&self, job_external_id: &str) -> Result<Vec<Budget>>;

    /// Every stored budget (the discrepancy audit walks all of them).
    async fn all(&self) -> Result<Vec<Budget>>;

    async fn reset(&self) -> Result<()>;
}

/// Store for canonical estimates.
#[async_trait]
pub trait EstimateStore: Send + Sync {
    async fn upsert(&self, estimate: &Estimate) -> Result<()>;

    async fn get(&self, external_id: &str) -> Result<Option<Estimate>>;

    async fn for_job(&self, job_external_id: &str) -> Result<Vec<Estimate>>;

    async fn reset(&self) -> Result<()>;
}

/// Store for canonical invoices.
#[async_trait]
pub trait InvoiceStore: Send + Sync {
    async fn upsert(&self, invoice: &Invoice) -> Result<()>;

    async fn get(&self, external_id: &str) -> Result<Option<Invoice>>;

    async fn for_job(&self, job_external_id: &str) -> Result<Vec<Invoice>>;

    /// Per-job invoice totals and fees, active invoices only, each job
    /// summed exactly once regardless of how many budgets reference it.
    async fn aggregate_by_job(&self) -> Result<Vec<InvoiceAggregate>>;

    async fn reset(&self) -> Result<()>;
}

/// Store for field definitions and values.
#[async_trait]
pub trait FieldStore: Send + Sync {
    async fn upsert_definition(&self, definition: &FieldDefinition) -> Result<()>;

    async fn definition(&self, field_id: &str) -> Result<Option<FieldDefinition>>;

    /// Definitions for an entity type; `active_only` filters deactivated
    /// definitions out.
    async fn definitions_for(
        &self,
        entity_type: EntityKind,
        active_only: bool,
    ) -> Result<Vec<FieldDefinition>>;

    /// Insert or overwrite the value for a (field, entity) tuple.
    async fn upsert_value(&self, value: &FieldValue) -> Result<()>;

    async fn value(
        &self,
        field_id: &str,
        entity_type: EntityKind,
        entity_id: &str,
    ) -> Result<Option<FieldValue>>;

    /// All stored values for one entity.
    async fn values_for_entity(
        &self,
        entity_type: EntityKind,
        entity_id: &str,
    ) -> Result<Vec<FieldValue>>;
}
