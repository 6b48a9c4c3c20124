//! HTTP client for the upstream CRM API.
//!
//! An explicitly constructed, injected dependency: no process-global client
//! instance, no implicit token lifecycle. Page payloads arrive either as a
//! bare JSON array or wrapped in a `results` envelope, depending on the
//! endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use revline_core::sync::ports::RecordSource;
use revline_domain::{EntityKind, Result, RevlineError, SourceConfig, SourcePage, SourceRecord};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::errors::InfraError;

/// Configuration for the source client.
#[derive(Debug, Clone)]
pub struct SourceClientConfig {
    /// Base URL for the upstream API.
    pub base_url: String,
    /// Bearer token.
    pub api_token: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for SourceClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.example.com/v1".to_string(),
            api_token: String::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl From<&SourceConfig> for SourceClientConfig {
    fn from(config: &SourceConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            api_token: config.api_token.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

/// Upstream API client implementing the [`RecordSource`] port.
pub struct HttpSourceClient {
    client: reqwest::Client,
    config: SourceClientConfig,
}

impl HttpSourceClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns error if the underlying HTTP client cannot be built.
    pub fn new(config: SourceClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RevlineError::Config(format!("failed to build http client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Create a client from the application source configuration.
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        Self::new(SourceClientConfig::from(config))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.config.api_token)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(InfraError::from)?;
        Ok(response)
    }
}

/// Page payloads come as `{ "results": [...] }` on some endpoints and as a
/// bare array on others.
fn extract_records(payload: Value) -> Vec<Value> {
    match payload {
        Value::Array(records) => records,
        Value::Object(mut object) => match object.remove("results") {
            Some(Value::Array(records)) => records,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

#[async_trait]
impl RecordSource for HttpSourceClient {
    #[instrument(skip(self))]
    async fn fetch_page(
        &self,
        kind: EntityKind,
        limit: usize,
        offset: usize,
    ) -> Result<SourcePage> {
        let url = self.url(&format!("{}?limit={limit}&skip={offset}", kind.collection()));
        debug!(%url, "fetching source page");

        let response = self.get(&url).await?;
        let status = response.status();
        if !status.is_success() {
            warn!(%kind, %status, "page fetch failed");
            return Err(RevlineError::Source(format!(
                "{} page fetch returned {status}",
                kind.collection()
            )));
        }

        let payload: Value = response.json().await.map_err(InfraError::from)?;
        let records = extract_records(payload)
            .into_iter()
            .map(SourceRecord::from_value)
            .collect::<Result<Vec<_>>>()?;

        let has_more = records.len() >= limit;
        Ok(SourcePage { records, has_more })
    }

    #[instrument(skip(self))]
    async fn fetch_job(&self, external_id: &str) -> Result<Option<SourceRecord>> {
        let url = self.url(&format!("jobs/{external_id}"));
        debug!(%url, "fetching job detail");

        let response = self.get(&url).await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(RevlineError::Source(format!(
                "job {external_id} fetch returned {status}"
            )));
        }

        let payload: Value = response.json().await.map_err(InfraError::from)?;
        Ok(Some(SourceRecord::from_value(payload)?))
    }
}
