//! Startup recovery and shutdown coordination.

use crate::error::Result;
use crate::types::Event;

use super::CogFetcher;

/// Failure reason recorded on records a previous process left mid-pipeline
pub(crate) const INTERRUPTED_REASON: &str = "interrupted by restart";

impl CogFetcher {
    /// Fail records left in a non-terminal state by a previous process
    ///
    /// Jobs live only in memory, so after a restart nothing will ever advance
    /// those records. Moving them to `error` lets callers register them again.
    pub(crate) async fn recover_interrupted(&self) -> Result<()> {
        if self.db.was_unclean_shutdown().await? {
            tracing::warn!("Previous session did not shut down cleanly");
        }

        let interrupted = self.db.fail_interrupted(INTERRUPTED_REASON).await?;
        for url in &interrupted {
            tracing::warn!(url = %url, "Marked interrupted job as failed");
        }
        if !interrupted.is_empty() {
            tracing::info!(count = interrupted.len(), "Recovered interrupted jobs");
        }

        Ok(())
    }

    /// Gracefully shut down the fetcher
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Stops admitting new jobs (registration fails with `ShuttingDown`)
    /// 2. Waits for in-flight jobs up to the configured shutdown timeout
    /// 3. Marks a clean shutdown in the database
    /// 4. Emits the `Shutdown` event
    ///
    /// Jobs still running when the timeout expires are abandoned; the next
    /// startup fails their records.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.jobs.close();
        tracing::info!("Stopped accepting new files");

        let shutdown_timeout = self.config.jobs.shutdown_timeout;
        match tokio::time::timeout(shutdown_timeout, self.jobs.wait_idle()).await {
            Ok(()) => {
                tracing::info!("All in-flight jobs completed");
            }
            Err(_) => {
                tracing::warn!(
                    remaining = self.jobs.in_flight_count(),
                    "Timeout waiting for jobs to complete, proceeding with shutdown"
                );
            }
        }

        if let Err(e) = self.db.set_clean_shutdown().await {
            tracing::error!(error = %e, "Failed to mark clean shutdown in database");
        } else {
            tracing::info!("Marked clean shutdown in database");
        }

        self.emit_event(Event::Shutdown);

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Whether new registrations are currently admitted
    pub fn is_accepting(&self) -> bool {
        self.jobs.is_accepting()
    }

    /// Number of admitted jobs still holding their registration slot
    pub fn active_jobs(&self) -> usize {
        self.jobs.in_flight_count()
    }

    /// Whether a job for `url` still holds its registration slot
    pub fn has_active_job(&self, url: &str) -> bool {
        self.jobs.is_in_flight(url.trim())
    }
}
