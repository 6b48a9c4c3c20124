//! Port interfaces for the upstream record source.

use async_trait::async_trait;
use revline_domain::{EntityKind, Result, SourcePage, SourceRecord};

/// Paginated access to the upstream system.
///
/// Implementations must not try to compensate for broken pagination; the
/// collector owns that policy. `has_more` reflects what the source claims,
/// which may be wrong.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetch one page of records of the given kind at the given offset.
    async fn fetch_page(
        &self,
        kind: EntityKind,
        limit: usize,
        offset: usize,
    ) -> Result<SourcePage>;

    /// Fetch full detail for a single job. `None` when the source does not
    /// know the id (upstream 404), which the caller records as skipped.
    async fn fetch_job(&self, external_id: &str) -> Result<Option<SourceRecord>>;
}
