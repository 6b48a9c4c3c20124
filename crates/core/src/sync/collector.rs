//! Full-collection fetching over an unreliable paginator.
//!
//! Some upstream endpoints silently ignore the offset parameter and return
//! the same page forever. The collector detects the stall by comparing the
//! first record of each page against the first record of the previous page,
//! stops, and flags the result as pagination-degraded instead of looping.

use std::collections::HashSet;
use std::sync::Arc;

use revline_domain::{
    constants::{DEFAULT_MAX_RECORDS, DEFAULT_PAGE_LIMIT},
    EntityKind, Result, SourceRecord,
};
use tracing::{debug, info, warn};

use super::ports::RecordSource;

/// Collector configuration.
#[derive(Debug, Clone)]
pub struct SourceCollectorConfig {
    /// Requested page size.
    pub page_limit: usize,
    /// Hard ceiling on total records fetched per collection.
    pub max_records: usize,
}

impl Default for SourceCollectorConfig {
    fn default() -> Self {
        Self { page_limit: DEFAULT_PAGE_LIMIT, max_records: DEFAULT_MAX_RECORDS }
    }
}

/// Result of a full-collection fetch. When `pagination_degraded` is set the
/// record set is incomplete; callers must surface the flag, not hide it.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub records: Vec<SourceRecord>,
    pub pagination_degraded: bool,
}

/// Fetches complete collections page by page under the stall-detection
/// policy, deduplicating records by external id.
pub struct SourceCollector {
    source: Arc<dyn RecordSource>,
    config: SourceCollectorConfig,
}

impl SourceCollector {
    pub fn new(source: Arc<dyn RecordSource>, config: SourceCollectorConfig) -> Self {
        Self { source, config }
    }

    /// Fetch every record of a kind.
    ///
    /// The offset advances by the returned page's length, not the requested
    /// limit, so short pages keep the cursor correct. Stops on: a page
    /// shorter than the limit, an empty page, a detected stall, or the
    /// record ceiling.
    ///
    /// # Errors
    ///
    /// Propagates the source error for a failed page fetch. A first-page
    /// failure means the source is unreachable; callers abort the pass.
    pub async fn fetch_all(&self, kind: EntityKind) -> Result<FetchOutcome> {
        let limit = self.config.page_limit.max(1);
        let mut offset = 0usize;
        let mut seen: HashSet<String> = HashSet::new();
        let mut records: Vec<SourceRecord> = Vec::new();
        let mut last_first_id: Option<String> = None;
        let mut degraded = false;

        loop {
            debug!(%kind, offset, limit, "fetching page");
            let page = self.source.fetch_page(kind, limit, offset).await?;

            if page.records.is_empty() {
                break;
            }

            // Stall detection: if the first record repeats at a non-zero
            // offset, the source is not paginating.
            let first_id = page.records[0].id.clone();
            if offset > 0 && last_first_id.as_deref() == Some(first_id.as_str()) {
                warn!(
                    %kind,
                    offset,
                    "duplicate page detected; source does not honor offsets, stopping"
                );
                degraded = true;
                break;
            }
            last_first_id = Some(first_id);

            let page_len = page.records.len();
            for record in page.records {
                if seen.insert(record.id.clone()) {
                    records.push(record);
                }
            }

            offset += page_len;

            if page_len < limit {
                break;
            }

            if offset >= self.config.max_records {
                warn!(%kind, fetched = offset, ceiling = self.config.max_records,
                    "record ceiling reached, stopping");
                degraded = true;
                break;
            }
        }

        info!(%kind, count = records.len(), degraded, "collection fetch finished");
        Ok(FetchOutcome { records, pagination_degraded: degraded })
    }
}
