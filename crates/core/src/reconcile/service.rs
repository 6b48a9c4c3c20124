//! Derives per-job effective revenue and surfaces inconsistencies between
//! budget, estimate, and invoice sources.
//!
//! A job may carry several budgets and several invoices. Invoices are
//! aggregated per job exactly once and each budget compares against that
//! single aggregate — a naive per-budget re-read would multiply-count the
//! invoice total. Discrepancies are detected and reported, never silently
//! resolved.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use revline_domain::{
    constants::{
        CLOSED_STATUS_SUBSTRINGS, ESTIMATE_SALE_STATUSES, FINANCING_FEE_KEY, MONEY_EPSILON,
        PERMIT_FEE_KEY, SALE_STATUS_SUBSTRINGS,
    },
    Discrepancy, EntityKind, Job, JobFilter, JobFinancials, RepSales, Result, SalesReport,
};
use tracing::{debug, instrument};

use crate::store::ports::{BudgetStore, EstimateStore, FieldStore, InvoiceStore, JobStore};

/// Whether a status string marks a job as sold. Case-insensitive
/// containment against the fixed sale-status set.
pub fn is_sale_status(status: &str) -> bool {
    let status = status.to_lowercase();
    SALE_STATUS_SUBSTRINGS.iter().any(|s| status.contains(s))
}

/// Whether a status string marks a job as closed. Independent of the sale
/// check.
pub fn is_closed_status(status: &str) -> bool {
    let status = status.to_lowercase();
    CLOSED_STATUS_SUBSTRINGS.iter().any(|s| status.contains(s))
}

fn is_sold_estimate(status: &str) -> bool {
    let status = status.to_lowercase();
    ESTIMATE_SALE_STATUSES.iter().any(|s| status.contains(s))
}

/// Reconciliation engine over the canonical store.
pub struct ReconciliationService {
    jobs: Arc<dyn JobStore>,
    budgets: Arc<dyn BudgetStore>,
    estimates: Arc<dyn EstimateStore>,
    invoices: Arc<dyn InvoiceStore>,
    fields: Arc<dyn FieldStore>,
}

impl ReconciliationService {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        budgets: Arc<dyn BudgetStore>,
        estimates: Arc<dyn EstimateStore>,
        invoices: Arc<dyn InvoiceStore>,
        fields: Arc<dyn FieldStore>,
    ) -> Self {
        Self { jobs, budgets, estimates, invoices, fields }
    }

    /// Full financial summary for one job.
    ///
    /// Effective revenue (`total_project`) is the sum of active invoice
    /// totals minus pass-through fees. Fees are user-entered field values
    /// when present; otherwise the invoice line-item fee sum stands in.
    /// Margins and commissions come from the most recent budget.
    #[instrument(skip(self))]
    pub async fn job_financials(&self, job_external_id: &str) -> Result<JobFinancials> {
        let invoices = self.invoices.for_job(job_external_id).await?;
        let active: Vec<_> = invoices.iter().filter(|i| i.is_active()).collect();
        let total_invoiced: f64 = active.iter().map(|i| i.total).sum();
        let line_item_fees: f64 = active.iter().map(|i| i.fees).sum();

        let user_permit = self.field_number(job_external_id, PERMIT_FEE_KEY).await?;
        let user_financing = self.field_number(job_external_id, FINANCING_FEE_KEY).await?;

        let permit_fee = user_permit.unwrap_or(0.0);
        let financing_fee = user_financing.unwrap_or(0.0);
        // No user-entered fees at all: fall back to the fees derived from
        // invoice line items.
        let pass_through_fees = if user_permit.is_none() && user_financing.is_none() {
            line_item_fees
        } else {
            permit_fee + financing_fee
        };

        let total_project = total_invoiced - pass_through_fees;

        let mut financials = JobFinancials {
            total_invoiced,
            permit_fee,
            financing_fee,
            pass_through_fees,
            total_project,
            ..JobFinancials::default()
        };

        // Margins come from the most recent budget; the payload's field
        // naming varies, so probe the known spellings.
        if let Some(budget) = self.budgets.for_job(job_external_id).await?.into_iter().next() {
            if let Ok(raw) = serde_json::from_str::<serde_json::Value>(&budget.raw) {
                financials.total_gross = first_number(
                    &raw,
                    &["gross_profit", "grossProfit", "total_gross", "revenue"],
                )
                .unwrap_or(0.0);
                financials.total_net = first_number(
                    &raw,
                    &["net_profit", "netProfit", "total_net", "net_revenue"],
                )
                .unwrap_or(0.0);
                financials.commissions = commission_total(&raw);
            }
        }

        Ok(financials)
    }

    /// Budget-vs-invoice discrepancy audit across the whole store.
    ///
    /// Flags every (budget, job) pair whose budget revenue differs from the
    /// job's adjusted invoice revenue by more than the monetary epsilon,
    /// ordered by absolute discrepancy descending.
    #[instrument(skip(self))]
    pub async fn discrepancies(&self) -> Result<Vec<Discrepancy>> {
        let aggregates: HashMap<String, (f64, f64)> = self
            .invoices
            .aggregate_by_job()
            .await?
            .into_iter()
            .map(|a| (a.job_external_id, (a.total, a.fees)))
            .collect();

        let mut flagged = Vec::new();
        for budget in self.budgets.all().await? {
            let Some(job_external_id) = budget.job_external_id.clone() else {
                continue;
            };

            let (invoice_total, invoice_fees) =
                aggregates.get(&job_external_id).copied().unwrap_or((0.0, 0.0));
            let adjusted = invoice_total - invoice_fees;
            let discrepancy = budget.revenue - adjusted;

            if discrepancy.abs() <= MONEY_EPSILON {
                continue;
            }

            let job_name = self
                .jobs
                .get_by_external_id(&job_external_id)
                .await?
                .and_then(|j| j.name);

            flagged.push(Discrepancy {
                budget_external_id: budget.external_id,
                budget_number: budget.number,
                sales_rep: budget.sales_rep,
                budget_revenue: budget.revenue,
                job_external_id,
                job_name,
                invoice_total,
                invoice_fees,
                adjusted_invoice_revenue: adjusted,
                discrepancy,
            });
        }

        flagged.sort_by(|a, b| {
            b.discrepancy
                .abs()
                .partial_cmp(&a.discrepancy.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        debug!(count = flagged.len(), "discrepancy audit finished");
        Ok(flagged)
    }

    /// Yearly sales report: revenue attributed per rep over jobs created in
    /// the given year.
    ///
    /// A job counts as a sale only when its status contains a sale
    /// substring AND its derived revenue is strictly positive. The closed
    /// count is an independent check.
    #[instrument(skip(self))]
    pub async fn sales_by_rep(&self, year: i32) -> Result<SalesReport> {
        let start = Utc
            .with_ymd_and_hms(year, 1, 1, 0, 0, 0)
            .single()
            .map(|d| d.timestamp())
            .unwrap_or(0);
        let end = Utc
            .with_ymd_and_hms(year + 1, 1, 1, 0, 0, 0)
            .single()
            .map(|d| d.timestamp())
            .unwrap_or(i64::MAX);

        let filter =
            JobFilter { created_after: Some(start), created_before: Some(end), ..JobFilter::default() };
        let jobs = self.jobs.list(&filter).await?;

        let mut report = SalesReport { year, ..SalesReport::default() };
        let mut by_rep: HashMap<String, f64> = HashMap::new();

        for job in jobs {
            report.total_leads += 1;
            let status = job.status.clone().unwrap_or_default();

            let revenue = self.report_revenue(&job).await?;

            if is_sale_status(&status) && revenue > 0.0 {
                let rep = job
                    .sales_rep
                    .clone()
                    .filter(|r| !r.is_empty())
                    .unwrap_or_else(|| "Unknown".to_string());
                *by_rep.entry(rep).or_insert(0.0) += revenue;
                report.total_revenue += revenue;
                report.sales_count += 1;
            }

            if is_closed_status(&status) {
                report.total_closed += 1;
            }
        }

        report.by_rep =
            by_rep.into_iter().map(|(name, value)| RepSales { name, value }).collect();
        report
            .by_rep
            .sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(std::cmp::Ordering::Equal));

        Ok(report)
    }

    /// Report-path effective revenue: max of budget revenue, summed active
    /// invoice totals, and the best sold-estimate total. Used where no fee
    /// breakdown exists.
    pub async fn report_revenue(&self, job: &Job) -> Result<f64> {
        let Some(external_id) = job.external_id.as_deref() else {
            return Ok(job.total.max(0.0));
        };

        let budget_revenue = self
            .budgets
            .for_job(external_id)
            .await?
            .into_iter()
            .next()
            .map(|b| b.revenue)
            .unwrap_or(0.0);

        let invoice_total: f64 = self
            .invoices
            .for_job(external_id)
            .await?
            .iter()
            .filter(|i| i.is_active())
            .map(|i| i.total)
            .sum();

        let estimate_total = self
            .estimates
            .for_job(external_id)
            .await?
            .iter()
            .filter(|e| is_sold_estimate(e.status.as_deref().unwrap_or_default()))
            .map(|e| e.total)
            .fold(0.0f64, f64::max);

        Ok(budget_revenue.max(invoice_total).max(estimate_total))
    }

    /// User-entered numeric field value for a job, resolved by upstream
    /// field key.
    async fn field_number(&self, job_external_id: &str, source_key: &str) -> Result<Option<f64>> {
        let definitions = self.fields.definitions_for(EntityKind::Job, true).await?;
        for definition in definitions {
            if definition.source_key.as_deref() != Some(source_key) {
                continue;
            }
            let value =
                self.fields.value(&definition.id, EntityKind::Job, job_external_id).await?;
            if let Some(number) =
                value.and_then(|v| v.value).and_then(|text| text.parse::<f64>().ok())
            {
                return Ok(Some(number));
            }
        }
        Ok(None)
    }
}

fn first_number(raw: &serde_json::Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| value_as_f64(raw.get(*key)))
}

fn value_as_f64(value: Option<&serde_json::Value>) -> Option<f64> {
    match value? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Commission line items hide inside the budget payload's expense list.
fn commission_total(raw: &serde_json::Value) -> f64 {
    let items = raw
        .get("expenses")
        .or_else(|| raw.get("line_items"))
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();

    items
        .iter()
        .filter(|item| {
            item.get("description")
                .and_then(|d| d.as_str())
                .map(|d| d.to_lowercase().contains("commission"))
                .unwrap_or(false)
        })
        .filter_map(|item| {
            value_as_f64(item.get("total")).or_else(|| value_as_f64(item.get("amount")))
        })
        .sum()
}
