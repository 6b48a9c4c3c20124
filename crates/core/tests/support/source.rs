//! Scripted in-memory record source.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use revline_core::sync::ports::RecordSource;
use revline_domain::{EntityKind, Result, RevlineError, SourcePage, SourceRecord};
use serde_json::Value;

/// Record source backed by fixed JSON collections, with optional per-job
/// failures and a record of every detail fetch it served.
#[derive(Default)]
pub struct ScriptedSource {
    collections: HashMap<EntityKind, Vec<Value>>,
    job_details: HashMap<String, Value>,
    failing_jobs: HashSet<String>,
    fetched_jobs: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(mut self, kind: EntityKind, records: Vec<Value>) -> Self {
        self.collections.insert(kind, records);
        self
    }

    pub fn with_job_detail(mut self, external_id: &str, detail: Value) -> Self {
        self.job_details.insert(external_id.to_owned(), detail);
        self
    }

    pub fn with_failing_job(mut self, external_id: &str) -> Self {
        self.failing_jobs.insert(external_id.to_owned());
        self
    }

    /// External ids served through `fetch_job`, in request order.
    pub fn fetched_jobs(&self) -> Vec<String> {
        self.fetched_jobs.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl RecordSource for ScriptedSource {
    async fn fetch_page(
        &self,
        kind: EntityKind,
        limit: usize,
        offset: usize,
    ) -> Result<SourcePage> {
        let collection = self.collections.get(&kind).cloned().unwrap_or_default();
        let records: Vec<SourceRecord> = collection
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(SourceRecord::from_value)
            .collect::<Result<_>>()?;
        let has_more =
            offset + records.len() < self.collections.get(&kind).map_or(0, Vec::len);
        Ok(SourcePage { records, has_more })
    }

    async fn fetch_job(&self, external_id: &str) -> Result<Option<SourceRecord>> {
        if let Ok(mut fetched) = self.fetched_jobs.lock() {
            fetched.push(external_id.to_owned());
        }
        if self.failing_jobs.contains(external_id) {
            return Err(RevlineError::Network(format!("fetch failed for {external_id}")));
        }
        match self.job_details.get(external_id) {
            Some(detail) => Ok(Some(SourceRecord::from_value(detail.clone())?)),
            None => Ok(None),
        }
    }
}
