//! Periodic eviction of finished jobs.
//!
//! Spawns a background task that deletes Succeeded and Failed jobs whose
//! `finished_at` is older than the configured retention period. Pending and
//! Running jobs are never touched.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use picalc_db::{age_cutoff, JobStore};
use tokio_util::sync::CancellationToken;

/// Run the job retention loop until `cancel` is triggered.
///
/// The first sweep happens immediately, then every `interval`.
pub async fn run(
    store: Arc<dyn JobStore>,
    retention: Duration,
    interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        retention_secs = retention.as_secs(),
        interval_secs = interval.as_secs(),
        "Job retention task started"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Job retention task stopping");
                break;
            }
            _ = ticker.tick() => {
                let cutoff = age_cutoff(Utc::now(), retention);
                match store.purge_finished_before(cutoff).await {
                    Ok(deleted) if deleted > 0 => {
                        tracing::info!(deleted, "Job retention: purged finished jobs");
                    }
                    Ok(_) => tracing::debug!("Job retention: nothing to purge"),
                    Err(e) => tracing::error!(error = %e, "Job retention: sweep failed"),
                }
            }
        }
    }
}
