//! Domain data types: canonical entities, wire records, and report rows.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::constants::{FEE_KEYWORDS, INACTIVE_INVOICE_STATUSES};
use crate::errors::{Result, RevlineError};

/// The four entity kinds synced from the upstream source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Job,
    Budget,
    Estimate,
    Invoice,
}

impl EntityKind {
    /// Collection path segment on the upstream API (`/jobs`, `/budgets`, ...).
    pub fn collection(&self) -> &'static str {
        match self {
            Self::Job => "jobs",
            Self::Budget => "budgets",
            Self::Estimate => "estimates",
            Self::Invoice => "invoices",
        }
    }

    /// Singular form used for persistence and relation types.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Job => "job",
            Self::Budget => "budget",
            Self::Estimate => "estimate",
            Self::Invoice => "invoice",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "job" => Some(Self::Job),
            "budget" => Some(Self::Budget),
            "estimate" => Some(Self::Estimate),
            "invoice" => Some(Self::Invoice),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.collection())
    }
}

/// Entry in a record's embedded relation list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedRef {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub id: String,
}

/// Invoice line item as delivered by the source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
}

impl LineItem {
    /// Whether this line item is a pass-through fee, by keyword match on the
    /// item name (description as fallback).
    pub fn is_fee(&self) -> bool {
        let label = self.name.as_deref().or(self.description.as_deref()).unwrap_or_default();
        let label = label.to_lowercase();
        FEE_KEYWORDS.iter().any(|kw| label.contains(kw))
    }
}

/// One page of records from the upstream source.
#[derive(Debug, Clone, Default)]
pub struct SourcePage {
    pub records: Vec<SourceRecord>,
    pub has_more: bool,
}

/// A raw record from the upstream source, with typed accessors for the
/// fields the engine cares about and the full payload retained for audit.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub record_type: Option<String>,
    #[serde(default)]
    pub status_name: Option<String>,
    #[serde(default)]
    pub total: Option<f64>,
    #[serde(default)]
    pub revenue: Option<f64>,
    #[serde(default)]
    pub sales_rep_name: Option<String>,
    #[serde(default)]
    pub date_created: i64,
    #[serde(default)]
    pub date_updated: i64,
    #[serde(default)]
    pub related: Vec<RelatedRef>,
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[serde(skip)]
    pub raw: Value,
}

impl SourceRecord {
    /// Parse a raw JSON value into a typed record, keeping the original
    /// payload for audit storage.
    pub fn from_value(value: Value) -> Result<Self> {
        let mut record: Self = serde_json::from_value(value.clone())
            .map_err(|e| RevlineError::Source(format!("malformed source record: {e}")))?;
        record.raw = value;
        Ok(record)
    }

    /// External id of the job this record links to: the first entry of type
    /// `job` in the embedded relation list. Relation lists may carry zero,
    /// one, or several candidates; first-match is the documented policy.
    pub fn related_job_id(&self) -> Option<&str> {
        self.related.iter().find(|r| r.kind == "job").map(|r| r.id.as_str())
    }

    /// Sum of pass-through fee line items on this record.
    pub fn line_item_fees(&self) -> f64 {
        self.items.iter().filter(|i| i.is_fee()).filter_map(|i| i.amount).sum()
    }

    fn raw_text(&self) -> String {
        self.raw.to_string()
    }
}

/// Canonical job entity.
///
/// `id` is assigned locally on first ingestion and never changes;
/// `external_id` is the upstream identifier and is unique when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub external_id: Option<String>,
    pub number: Option<String>,
    pub name: Option<String>,
    pub job_type: Option<String>,
    pub status: Option<String>,
    pub sales_rep: Option<String>,
    pub total: f64,
    pub total_project: Option<f64>,
    pub total_gross: Option<f64>,
    pub total_net: Option<f64>,
    pub permit_fee: Option<f64>,
    pub financing_fee: Option<f64>,
    pub date_created: i64,
    pub date_updated: i64,
    pub raw: String,
}

impl Job {
    /// Build a job from a source record, assigning a fresh local id. The
    /// store keeps the existing local id when the external id is already
    /// known.
    pub fn from_record(record: &SourceRecord) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            external_id: Some(record.id.clone()),
            number: record.number.clone(),
            name: record.name.clone(),
            job_type: record.record_type.clone(),
            status: record.status_name.clone(),
            sales_rep: record.sales_rep_name.clone(),
            total: record.total.unwrap_or(0.0),
            total_project: None,
            total_gross: None,
            total_net: None,
            permit_fee: None,
            financing_fee: None,
            date_created: record.date_created,
            date_updated: record.date_updated,
            raw: record.raw_text(),
        }
    }
}

/// Canonical budget entity, keyed by its upstream id. The job reference is
/// weak: the upstream produces orphaned and duplicated links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub external_id: String,
    pub number: Option<String>,
    pub revenue: f64,
    pub sales_rep: Option<String>,
    pub job_external_id: Option<String>,
    pub date_updated: i64,
    pub raw: String,
}

impl Budget {
    pub fn from_record(record: &SourceRecord) -> Self {
        Self {
            external_id: record.id.clone(),
            number: record.number.clone(),
            revenue: record.revenue.unwrap_or(0.0),
            sales_rep: record.sales_rep_name.clone(),
            job_external_id: record.related_job_id().map(str::to_owned),
            date_updated: record.date_updated,
            raw: record.raw_text(),
        }
    }
}

/// Canonical estimate entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub external_id: String,
    pub number: Option<String>,
    pub total: f64,
    pub status: Option<String>,
    pub job_external_id: Option<String>,
    pub date_updated: i64,
    pub raw: String,
}

impl Estimate {
    pub fn from_record(record: &SourceRecord) -> Self {
        Self {
            external_id: record.id.clone(),
            number: record.number.clone(),
            total: record.total.unwrap_or(0.0),
            status: record.status_name.clone(),
            job_external_id: record.related_job_id().map(str::to_owned),
            date_updated: record.date_updated,
            raw: record.raw_text(),
        }
    }
}

/// Canonical invoice entity. `fees` is derived at ingestion from line items
/// matching the fee-keyword set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub external_id: String,
    pub number: Option<String>,
    pub total: f64,
    pub fees: f64,
    pub status: Option<String>,
    pub job_external_id: Option<String>,
    pub date_created: i64,
    pub date_updated: i64,
    pub raw: String,
}

impl Invoice {
    pub fn from_record(record: &SourceRecord) -> Self {
        Self {
            external_id: record.id.clone(),
            number: record.number.clone(),
            total: record.total.unwrap_or(0.0),
            fees: record.line_item_fees(),
            status: record.status_name.clone(),
            job_external_id: record.related_job_id().map(str::to_owned),
            date_created: record.date_created,
            date_updated: record.date_updated,
            raw: record.raw_text(),
        }
    }

    /// Whether this invoice counts toward revenue (not void/draft/cancelled).
    pub fn is_active(&self) -> bool {
        let status = self.status.as_deref().unwrap_or_default().to_lowercase();
        !INACTIVE_INVOICE_STATUSES.contains(&status.as_str())
    }
}

/// Value type of a user-defined field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Date,
    Text,
    Number,
    Currency,
    Calculated,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Text => "text",
            Self::Number => "number",
            Self::Currency => "currency",
            Self::Calculated => "calculated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "date" => Some(Self::Date),
            "text" => Some(Self::Text),
            "number" => Some(Self::Number),
            "currency" => Some(Self::Currency),
            "calculated" => Some(Self::Calculated),
            _ => None,
        }
    }
}

/// Recognized calculation formula families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormulaFamily {
    /// `total - permit_fee - financing_fee` over an invoice entity.
    InvoiceNetOfFees,
}

impl FormulaFamily {
    /// Recognize a formula string. Unrecognized formulas are not an error;
    /// they simply never produce a value.
    pub fn parse(formula: &str) -> Option<Self> {
        let normalized: String = formula.chars().filter(|c| !c.is_whitespace()).collect();
        match normalized.as_str() {
            "total-permit_fee-financing_fee" => Some(Self::InvoiceNetOfFees),
            _ => None,
        }
    }
}

/// A user-defined field definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub id: String,
    pub entity_type: EntityKind,
    pub name: String,
    /// Upstream field key (e.g. `permit_fee`) used to resolve formula inputs.
    pub source_key: Option<String>,
    pub field_type: FieldType,
    pub auto_populate: bool,
    pub auto_populate_trigger: Option<String>,
    pub is_calculated: bool,
    pub formula: Option<String>,
    /// Ordered field ids this field's formula reads from.
    pub depends_on: Vec<String>,
    pub is_active: bool,
    pub date_created: i64,
    pub date_updated: i64,
}

impl FieldDefinition {
    /// Formula family of this definition, when calculated and recognized.
    pub fn formula_family(&self) -> Option<FormulaFamily> {
        self.formula.as_deref().and_then(FormulaFamily::parse)
    }
}

/// Stored value for a (field, entity) tuple. One row per tuple; overwritten
/// on every write or recalculation, never auto-purged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    pub id: String,
    pub field_id: String,
    pub entity_type: EntityKind,
    pub entity_id: String,
    pub value: Option<String>,
    pub date_updated: i64,
}

impl FieldValue {
    pub fn new(
        field_id: impl Into<String>,
        entity_type: EntityKind,
        entity_id: impl Into<String>,
        value: Option<String>,
        date_updated: i64,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            field_id: field_id.into(),
            entity_type,
            entity_id: entity_id.into(),
            value,
            date_updated,
        }
    }
}

/// Per-job reconciled financial summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobFinancials {
    /// Raw sum of active invoice totals.
    pub total_invoiced: f64,
    pub permit_fee: f64,
    pub financing_fee: f64,
    /// Total deducted from invoiced revenue: user-entered fees when present,
    /// otherwise the invoice line-item fee sum.
    pub pass_through_fees: f64,
    /// Effective revenue: invoiced minus pass-through fees.
    pub total_project: f64,
    pub total_gross: f64,
    pub total_net: f64,
    pub commissions: f64,
}

/// Per-job invoice aggregate, computed once per job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceAggregate {
    pub job_external_id: String,
    pub total: f64,
    pub fees: f64,
}

/// A flagged budget-vs-invoice discrepancy. Detection only: discrepancies
/// are surfaced, never auto-corrected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub budget_external_id: String,
    pub budget_number: Option<String>,
    pub sales_rep: Option<String>,
    pub budget_revenue: f64,
    pub job_external_id: String,
    pub job_name: Option<String>,
    pub invoice_total: f64,
    pub invoice_fees: f64,
    /// `invoice_total - invoice_fees`.
    pub adjusted_invoice_revenue: f64,
    /// `budget_revenue - adjusted_invoice_revenue`.
    pub discrepancy: f64,
}

/// Per-rep sales total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepSales {
    pub name: String,
    pub value: f64,
}

/// Yearly sales report aggregated from the canonical store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SalesReport {
    pub year: i32,
    pub total_revenue: f64,
    pub total_leads: usize,
    pub total_closed: usize,
    pub sales_count: usize,
    pub by_rep: Vec<RepSales>,
}

/// Filter for job queries: created-time range and/or status containment.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status_contains: Option<String>,
    pub created_after: Option<i64>,
    pub created_before: Option<i64>,
}

/// Phases of a sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncPhase {
    Idle,
    FetchingBudgets,
    FetchingEstimates,
    FetchingInvoices,
    ComputingJobRefs,
    FetchingReferencedJobs,
    ReconcilingTotals,
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::FetchingBudgets => "fetching_budgets",
            Self::FetchingEstimates => "fetching_estimates",
            Self::FetchingInvoices => "fetching_invoices",
            Self::ComputingJobRefs => "computing_job_refs",
            Self::FetchingReferencedJobs => "fetching_referenced_jobs",
            Self::ReconcilingTotals => "reconciling_totals",
        };
        f.write_str(name)
    }
}

/// Outcome of a full sync pass. Degraded pagination is surfaced here, never
/// hidden: callers must not assume completeness for the listed kinds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub budgets: usize,
    pub estimates: usize,
    pub invoices: usize,
    pub jobs_fetched: usize,
    pub jobs_skipped: usize,
    pub totals_backfilled: usize,
    pub degraded_kinds: Vec<EntityKind>,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn record_parses_results_payload_shape() {
        let value = json!({
            "id": "b-100",
            "number": "1042",
            "revenue": 1500.5,
            "sales_rep_name": "Dana Cole",
            "date_updated": 1_735_000_000i64,
            "related": [
                {"type": "contact", "id": "c-9"},
                {"type": "job", "id": "j-1"},
                {"type": "job", "id": "j-2"}
            ]
        });

        let record = SourceRecord::from_value(value.clone()).unwrap();
        assert_eq!(record.id, "b-100");
        assert_eq!(record.revenue, Some(1500.5));
        // First job relation wins, by policy.
        assert_eq!(record.related_job_id(), Some("j-1"));
        assert_eq!(record.raw, value);
    }

    #[test]
    fn record_without_relations_links_to_nothing() {
        let record = SourceRecord::from_value(json!({"id": "e-1", "total": 10.0})).unwrap();
        assert_eq!(record.related_job_id(), None);
    }

    #[test]
    fn invoice_fee_line_items_are_summed() {
        let record = SourceRecord::from_value(json!({
            "id": "i-1",
            "total": 1000.0,
            "items": [
                {"name": "Shingles", "amount": 800.0},
                {"name": "Permit Fee", "amount": 120.0},
                {"name": "Financing surcharge", "amount": 30.0},
                {"description": "city permit", "amount": 25.0}
            ]
        }))
        .unwrap();

        let invoice = Invoice::from_record(&record);
        assert!((invoice.fees - 175.0).abs() < f64::EPSILON);
    }

    #[test]
    fn void_and_draft_invoices_are_inactive() {
        for status in ["Void", "draft", "Cancelled"] {
            let record =
                SourceRecord::from_value(json!({"id": "i-2", "status_name": status})).unwrap();
            assert!(!Invoice::from_record(&record).is_active(), "status {status}");
        }
        let record =
            SourceRecord::from_value(json!({"id": "i-3", "status_name": "Paid"})).unwrap();
        assert!(Invoice::from_record(&record).is_active());
    }

    #[test]
    fn formula_family_recognition_is_whitespace_insensitive() {
        assert_eq!(
            FormulaFamily::parse("total - permit_fee - financing_fee"),
            Some(FormulaFamily::InvoiceNetOfFees)
        );
        assert_eq!(
            FormulaFamily::parse("total-permit_fee-financing_fee"),
            Some(FormulaFamily::InvoiceNetOfFees)
        );
        assert_eq!(FormulaFamily::parse("total * margin"), None);
    }
}
