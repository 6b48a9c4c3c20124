//! Sync orchestrator.
//!
//! Drives a full pass over the upstream source: fetch budgets, estimates,
//! and invoices; resolve the set of jobs they reference; fetch detail for
//! exactly those jobs with a bounded worker pool; then backfill missing job
//! totals from the ingested children. A pass that fails partway leaves the
//! store valid and queryable — partial sync is not corruption.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use revline_domain::{
    Budget, EntityKind, Estimate, Invoice, Job, JobFilter, Result, SyncPhase, SyncReport,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::store::ports::{BudgetStore, EstimateStore, InvoiceStore, JobStore};
use crate::sync::collector::{SourceCollector, SourceCollectorConfig};
use crate::sync::ports::RecordSource;

/// Configuration for a sync pass.
#[derive(Debug, Clone)]
pub struct SyncServiceConfig {
    pub collector: SourceCollectorConfig,
    /// Concurrent in-flight job-detail fetches.
    pub fetch_concurrency: usize,
}

impl Default for SyncServiceConfig {
    fn default() -> Self {
        Self {
            collector: SourceCollectorConfig::default(),
            fetch_concurrency: revline_domain::constants::DEFAULT_FETCH_CONCURRENCY,
        }
    }
}

enum DetailOutcome {
    Fetched,
    Skipped,
}

/// Orchestrates the fetch → upsert → link-resolve → backfill pipeline.
pub struct SyncService {
    source: Arc<dyn RecordSource>,
    jobs: Arc<dyn JobStore>,
    budgets: Arc<dyn BudgetStore>,
    estimates: Arc<dyn EstimateStore>,
    invoices: Arc<dyn InvoiceStore>,
    config: SyncServiceConfig,
    phase: Mutex<SyncPhase>,
}

impl SyncService {
    pub fn new(
        source: Arc<dyn RecordSource>,
        jobs: Arc<dyn JobStore>,
        budgets: Arc<dyn BudgetStore>,
        estimates: Arc<dyn EstimateStore>,
        invoices: Arc<dyn InvoiceStore>,
        config: SyncServiceConfig,
    ) -> Self {
        Self {
            source,
            jobs,
            budgets,
            estimates,
            invoices,
            config,
            phase: Mutex::new(SyncPhase::Idle),
        }
    }

    /// Current pipeline phase, for observability.
    pub fn current_phase(&self) -> SyncPhase {
        self.phase.lock().map_or(SyncPhase::Idle, |guard| *guard)
    }

    fn set_phase(&self, phase: SyncPhase) {
        if let Ok(mut guard) = self.phase.lock() {
            *guard = phase;
        }
        debug!(%phase, "sync phase");
    }

    /// Run one full sync pass.
    ///
    /// # Errors
    ///
    /// Returns an error only when the source is unreachable for a collection
    /// fetch or the store rejects a batch write; the store is left at its
    /// last-known-good state.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<SyncReport> {
        let result = self.run_pass().await;
        self.set_phase(SyncPhase::Idle);
        result
    }

    async fn run_pass(&self) -> Result<SyncReport> {
        let started = Instant::now();
        let collector = SourceCollector::new(Arc::clone(&self.source), self.config.collector.clone());
        let mut report = SyncReport::default();

        self.set_phase(SyncPhase::FetchingBudgets);
        let budgets = collector.fetch_all(EntityKind::Budget).await?;
        if budgets.pagination_degraded {
            report.degraded_kinds.push(EntityKind::Budget);
        }
        for record in &budgets.records {
            self.budgets.upsert(&Budget::from_record(record)).await?;
        }
        report.budgets = budgets.records.len();
        info!(count = report.budgets, "budgets ingested");

        self.set_phase(SyncPhase::FetchingEstimates);
        let estimates = collector.fetch_all(EntityKind::Estimate).await?;
        if estimates.pagination_degraded {
            report.degraded_kinds.push(EntityKind::Estimate);
        }
        for record in &estimates.records {
            self.estimates.upsert(&Estimate::from_record(record)).await?;
        }
        report.estimates = estimates.records.len();
        info!(count = report.estimates, "estimates ingested");

        self.set_phase(SyncPhase::FetchingInvoices);
        let invoices = collector.fetch_all(EntityKind::Invoice).await?;
        if invoices.pagination_degraded {
            report.degraded_kinds.push(EntityKind::Invoice);
        }
        for record in &invoices.records {
            self.invoices.upsert(&Invoice::from_record(record)).await?;
        }
        report.invoices = invoices.records.len();
        info!(count = report.invoices, "invoices ingested");

        // Only jobs referenced by a financial child are worth a detail
        // fetch; this bounds cost to jobs that matter financially.
        self.set_phase(SyncPhase::ComputingJobRefs);
        let mut referenced: HashSet<String> = HashSet::new();
        for record in
            budgets.records.iter().chain(estimates.records.iter()).chain(invoices.records.iter())
        {
            if let Some(job_id) = record.related_job_id() {
                referenced.insert(job_id.to_owned());
            }
        }
        info!(count = referenced.len(), "distinct referenced jobs");

        self.set_phase(SyncPhase::FetchingReferencedJobs);
        let (fetched, skipped) = self.fetch_referenced_jobs(referenced).await;
        report.jobs_fetched = fetched;
        report.jobs_skipped = skipped;

        self.set_phase(SyncPhase::ReconcilingTotals);
        report.totals_backfilled = self.backfill_job_totals().await?;

        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            budgets = report.budgets,
            estimates = report.estimates,
            invoices = report.invoices,
            jobs_fetched = report.jobs_fetched,
            jobs_skipped = report.jobs_skipped,
            totals_backfilled = report.totals_backfilled,
            degraded = report.degraded_kinds.len(),
            "sync pass completed"
        );
        Ok(report)
    }

    /// Fetch job detail for the referenced set with a fixed-size worker
    /// pool. An individual failure is recorded as skipped, never aborts the
    /// batch.
    async fn fetch_referenced_jobs(&self, referenced: HashSet<String>) -> (usize, usize) {
        let semaphore = Arc::new(Semaphore::new(self.config.fetch_concurrency.max(1)));
        let mut tasks: JoinSet<DetailOutcome> = JoinSet::new();

        for external_id in referenced {
            let semaphore = Arc::clone(&semaphore);
            let source = Arc::clone(&self.source);
            let jobs = Arc::clone(&self.jobs);

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return DetailOutcome::Skipped;
                };

                match source.fetch_job(&external_id).await {
                    Ok(Some(record)) => {
                        match jobs.upsert(&Job::from_record(&record)).await {
                            Ok(()) => DetailOutcome::Fetched,
                            Err(e) => {
                                warn!(external_id, error = %e, "job upsert failed, skipping");
                                DetailOutcome::Skipped
                            }
                        }
                    }
                    Ok(None) => {
                        warn!(external_id, "job not found upstream, skipping");
                        DetailOutcome::Skipped
                    }
                    Err(e) => {
                        warn!(external_id, error = %e, "job detail fetch failed, skipping");
                        DetailOutcome::Skipped
                    }
                }
            });
        }

        let mut fetched = 0usize;
        let mut skipped = 0usize;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(DetailOutcome::Fetched) => fetched += 1,
                Ok(DetailOutcome::Skipped) => skipped += 1,
                Err(e) => {
                    warn!(error = %e, "job detail task failed, skipping");
                    skipped += 1;
                }
            }
        }

        (fetched, skipped)
    }

    /// Backfill pass: jobs without a strictly positive total take the max of
    /// related budget revenue, estimate total, and invoice total. Runs once,
    /// after all ingestion — never against partially-ingested children.
    async fn backfill_job_totals(&self) -> Result<usize> {
        let all_jobs = self.jobs.list(&JobFilter::default()).await?;
        let mut backfilled = 0usize;

        for job in all_jobs {
            if job.total > 0.0 {
                continue;
            }
            let Some(external_id) = job.external_id.as_deref() else {
                continue;
            };

            let mut best = job.total;
            for budget in self.budgets.for_job(external_id).await? {
                best = best.max(budget.revenue);
            }
            for estimate in self.estimates.for_job(external_id).await? {
                best = best.max(estimate.total);
            }
            for invoice in self.invoices.for_job(external_id).await? {
                best = best.max(invoice.total);
            }

            if best > job.total {
                self.jobs.set_total(external_id, best).await?;
                backfilled += 1;
            }
        }

        Ok(backfilled)
    }
}
