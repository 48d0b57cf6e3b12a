//! Startup and shutdown coordination.

use crate::error::Result;
use crate::types::Event;
use std::sync::atomic::Ordering;
use std::time::Duration;

use super::ConversionService;

/// How long shutdown waits for running jobs before giving up on them
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

impl ConversionService {
    /// Gracefully shut down the service
    ///
    /// 1. Stops accepting new jobs
    /// 2. Waits for running jobs to finish (up to 30 seconds)
    /// 3. Deletes every artifact still waiting for download
    ///
    /// Jobs still running after the timeout keep their own cleanup guards and
    /// remove their files when they end.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.accepting_new.store(false, Ordering::SeqCst);
        tracing::info!("Stopped accepting new jobs");

        let permits = u32::try_from(self.config.codec.max_concurrent_jobs).unwrap_or(u32::MAX);
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.job_slots.acquire_many(permits)).await {
            Ok(Ok(_all_slots)) => {
                tracing::info!("All running jobs completed");
            }
            Ok(Err(_)) => {
                tracing::debug!("Job slots already closed");
            }
            Err(_) => {
                tracing::warn!("Timeout waiting for running jobs, proceeding with shutdown");
            }
        }
        // wakes any submitter still queued for a slot with ShuttingDown
        self.job_slots.close();

        let expired = self.gate.expire_all().await;
        tracing::info!(expired, "Removed undelivered artifacts");

        self.event_tx.send(Event::Shutdown).ok();

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Whether the service still accepts new jobs
    pub fn is_accepting(&self) -> bool {
        self.accepting_new.load(Ordering::SeqCst)
    }
}
