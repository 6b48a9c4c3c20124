//! Periodic sync driver with explicit lifecycle management.
//!
//! Runs full sync passes on a fixed interval. A failed pass is logged and
//! the loop continues; the scheduler never takes the process down. Join
//! handles are tracked, cancellation is explicit, and stop waits for the
//! background task with a timeout.

use std::sync::Arc;
use std::time::Duration;

use revline_core::SyncService;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::error::{SchedulerError, SchedulerResult};

/// Configuration for the sync scheduler.
#[derive(Debug, Clone)]
pub struct SyncSchedulerConfig {
    /// Interval between sync passes.
    pub interval: Duration,
    /// Join timeout when stopping.
    pub join_timeout: Duration,
}

impl Default for SyncSchedulerConfig {
    fn default() -> Self {
        Self { interval: Duration::from_secs(900), join_timeout: Duration::from_secs(5) }
    }
}

/// Sync scheduler with start/stop lifecycle.
pub struct SyncScheduler {
    service: Arc<SyncService>,
    config: SyncSchedulerConfig,
    cancellation_token: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl SyncScheduler {
    /// Create a new scheduler around a sync service.
    pub fn new(service: Arc<SyncService>, config: SyncSchedulerConfig) -> Self {
        Self {
            service,
            config,
            cancellation_token: CancellationToken::new(),
            task_handle: None,
        }
    }

    /// Start the scheduler, spawning the background loop.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::AlreadyRunning`] if the loop is active.
    #[instrument(skip(self))]
    pub fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        info!(interval_secs = self.config.interval.as_secs(), "starting sync scheduler");

        // Fresh token so the scheduler can restart after a stop.
        self.cancellation_token = CancellationToken::new();

        let service = Arc::clone(&self.service);
        let interval = self.config.interval;
        let cancel = self.cancellation_token.clone();

        let handle = tokio::spawn(async move {
            Self::sync_loop(service, interval, cancel).await;
        });

        self.task_handle = Some(handle);
        info!("sync scheduler started");
        Ok(())
    }

    /// Stop the scheduler and wait for the background loop to finish.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NotRunning`] if no loop is active, or a
    /// timeout/join error when the task does not stop cleanly.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        info!("stopping sync scheduler");
        self.cancellation_token.cancel();

        if let Some(handle) = self.task_handle.take() {
            let join_timeout = self.config.join_timeout;
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|source| SchedulerError::Timeout { duration: join_timeout, source })?
                .map_err(|e| SchedulerError::Join(e.to_string()))?;
        }

        info!("sync scheduler stopped");
        Ok(())
    }

    /// Whether the background loop is active.
    pub fn is_running(&self) -> bool {
        self.task_handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    async fn sync_loop(
        service: Arc<SyncService>,
        interval: Duration,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("sync loop cancelled");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    match service.run().await {
                        Ok(report) => {
                            info!(
                                budgets = report.budgets,
                                estimates = report.estimates,
                                invoices = report.invoices,
                                jobs_fetched = report.jobs_fetched,
                                jobs_skipped = report.jobs_skipped,
                                degraded = report.degraded_kinds.len(),
                                "scheduled sync pass finished"
                            );
                        }
                        Err(e) => {
                            // Store stays at last-known-good; next tick retries.
                            error!(error = %e, "scheduled sync pass failed");
                        }
                    }
                }
            }
        }
    }
}

/// Ensure the loop is cancelled when the scheduler is dropped.
impl Drop for SyncScheduler {
    fn drop(&mut self) {
        if !self.cancellation_token.is_cancelled() && self.is_running() {
            warn!("sync scheduler dropped while running; cancelling");
            self.cancellation_token.cancel();
        }
    }
}
