//! Domain constants: status sets, fee keywords, and fetch limits.

/// Job status substrings that mark a job as sold. Matching is
/// case-insensitive containment against the job's status string.
pub const SALE_STATUS_SUBSTRINGS: &[&str] = &[
    "paid & closed",
    "signed - pending dep",
    "pending payments",
    "jobs in progress",
    "job prep",
    "job completed",
    "insurance approved",
    "signed contract",
    "contingency agreement signed",
];

/// Job status substrings that mark a job as closed. Independent of the
/// sale check: a job can be closed without counting as a sale.
pub const CLOSED_STATUS_SUBSTRINGS: &[&str] = &["paid & closed", "job completed"];

/// Estimate statuses that count toward sales (signed/approved states).
pub const ESTIMATE_SALE_STATUSES: &[&str] = &["approved", "signed", "signed contract"];

/// Invoice statuses excluded from revenue aggregation.
pub const INACTIVE_INVOICE_STATUSES: &[&str] = &["void", "draft", "cancelled"];

/// Line-item name keywords identifying pass-through fees on invoices.
pub const FEE_KEYWORDS: &[&str] = &["fee", "permit", "surcharge", "financing"];

/// Monetary comparison epsilon: one currency unit, absorbs float rounding.
pub const MONEY_EPSILON: f64 = 1.0;

/// Default page size for paginated source fetches.
pub const DEFAULT_PAGE_LIMIT: usize = 1000;

/// Hard ceiling on records fetched per collection; stops unbounded loops
/// against a broken source.
pub const DEFAULT_MAX_RECORDS: usize = 50_000;

/// Default number of concurrent in-flight job-detail fetches.
pub const DEFAULT_FETCH_CONCURRENCY: usize = 15;

/// Source field key for the user-entered permit fee.
pub const PERMIT_FEE_KEY: &str = "permit_fee";

/// Source field key for the user-entered financing fee.
pub const FINANCING_FEE_KEY: &str = "financing_fee";
