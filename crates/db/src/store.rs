//! The [`JobStore`] contract shared by every store implementation.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use picalc_core::error::CoreError;
use picalc_core::job::{JobRecord, JobRequest};
use picalc_core::types::{JobId, Timestamp};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Job {0} not found")]
    NotFound(JobId),

    /// The write would break the job lifecycle (e.g. progress on a
    /// finished job).
    #[error(transparent)]
    Transition(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt job row: {0}")]
    Corrupt(String),
}

/// Shared repository of job records.
///
/// Every method is atomic per job handle. Writers (the executor) and
/// readers (the API layer) never coordinate through anything else.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Admit a new Pending job with fraction 0.
    async fn create(&self, request: JobRequest) -> Result<JobRecord, StoreError>;

    /// Read the current record, or `None` for an unknown handle.
    async fn get(&self, id: JobId) -> Result<Option<JobRecord>, StoreError>;

    /// Atomically claim the oldest Pending job for `worker_id`.
    ///
    /// A Running job whose last write is older than `stale_after` is also
    /// claimable, so a job orphaned by a dead worker is eventually re-run.
    async fn claim_next(
        &self,
        worker_id: &str,
        stale_after: Duration,
    ) -> Result<Option<JobRecord>, StoreError>;

    /// Record a checkpoint on a Running job. The stored fraction never
    /// decreases.
    async fn publish_progress(&self, id: JobId, fraction: f64) -> Result<(), StoreError>;

    /// Running → Succeeded with the full result.
    async fn complete(&self, id: JobId, result: &str) -> Result<(), StoreError>;

    /// Running → Failed with an error message.
    async fn fail(&self, id: JobId, error: &str) -> Result<(), StoreError>;

    /// Delete finished jobs whose `finished_at` is before `cutoff`.
    /// Returns the number of evicted records.
    async fn purge_finished_before(&self, cutoff: Timestamp) -> Result<u64, StoreError>;

    /// Check that the backing store is reachable.
    async fn health_check(&self) -> Result<(), StoreError>;
}

/// `now - age`, saturating at the earliest representable time.
///
/// Used both for stale-claim detection and for retention sweeps.
pub fn age_cutoff(now: Timestamp, age: Duration) -> Timestamp {
    chrono::Duration::from_std(age)
        .ok()
        .and_then(|age| now.checked_sub_signed(age))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
