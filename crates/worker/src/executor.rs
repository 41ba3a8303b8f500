//! Runs one claimed job to a terminal state.
//!
//! The digit engine is a tight synchronous loop, so it runs on the blocking
//! thread pool and owns its working buffer there. Checkpoints travel back
//! over a bounded channel; the async side writes each one to the store.

use std::sync::Arc;

use picalc_core::job::JobRecord;
use picalc_core::spigot::{self, Checkpoint};
use picalc_core::types::JobId;
use picalc_db::{JobStore, StoreError};
use tokio::sync::mpsc;

/// Checkpoints buffered between the engine thread and the store writer.
const CHECKPOINT_BUFFER: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("Job store error: {0}")]
    Store(#[from] StoreError),
}

/// Terminal outcome of an executed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    Failed(String),
}

/// Executes claimed jobs on behalf of one worker.
#[derive(Clone)]
pub struct Executor {
    store: Arc<dyn JobStore>,
    worker_id: String,
}

impl Executor {
    pub fn new(store: Arc<dyn JobStore>, worker_id: impl Into<String>) -> Self {
        Self {
            store,
            worker_id: worker_id.into(),
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Compute the digits for `job` and record the outcome.
    ///
    /// `job` must already be claimed (Running). Engine errors and panics
    /// mark the job Failed; only store failures are returned as errors.
    pub async fn execute(&self, job: JobRecord) -> Result<JobOutcome, ExecutorError> {
        let job_id = job.id;
        let digit_count = job.request.digit_count;
        tracing::info!(job_id = %job_id, digit_count, worker_id = %self.worker_id, "Job started");

        let (tx, rx) = mpsc::channel::<Checkpoint>(CHECKPOINT_BUFFER);
        let engine = tokio::task::spawn_blocking(move || {
            spigot::compute_with_checkpoints(digit_count, |checkpoint| {
                // A closed channel means the writer gave up; keep computing
                // so the outcome is still reported below.
                let _ = tx.blocking_send(checkpoint);
            })
        });

        let completed = self.forward_checkpoints(job_id, rx).await?;

        let outcome = match engine.await {
            Ok(Ok(_)) if completed => JobOutcome::Succeeded,
            Ok(Ok(result)) => {
                // The final checkpoint never reached the store.
                self.store.complete(job_id, &result).await?;
                JobOutcome::Succeeded
            }
            Ok(Err(err)) => self.record_failure(job_id, err.to_string()).await?,
            Err(join_err) => {
                let reason = if join_err.is_panic() {
                    "Digit computation panicked".to_string()
                } else {
                    format!("Digit computation aborted: {join_err}")
                };
                self.record_failure(job_id, reason).await?
            }
        };

        if outcome == JobOutcome::Succeeded {
            tracing::info!(job_id = %job_id, digit_count, "Job succeeded");
        }
        Ok(outcome)
    }

    /// Write checkpoints to the store until the engine finishes.
    ///
    /// Returns whether the final checkpoint (with the result) was stored.
    /// Failed progress writes are logged and skipped; the next checkpoint
    /// supersedes them.
    async fn forward_checkpoints(
        &self,
        job_id: JobId,
        mut rx: mpsc::Receiver<Checkpoint>,
    ) -> Result<bool, ExecutorError> {
        let mut completed = false;
        while let Some(checkpoint) = rx.recv().await {
            match checkpoint.result {
                Some(result) => {
                    self.store.complete(job_id, &result).await?;
                    completed = true;
                }
                None => {
                    tracing::debug!(job_id = %job_id, fraction = checkpoint.fraction, "Checkpoint");
                    if let Err(e) = self.store.publish_progress(job_id, checkpoint.fraction).await {
                        tracing::warn!(job_id = %job_id, error = %e, "Failed to publish progress");
                    }
                }
            }
        }
        Ok(completed)
    }

    async fn record_failure(&self, job_id: JobId, reason: String) -> Result<JobOutcome, ExecutorError> {
        tracing::error!(job_id = %job_id, error = %reason, "Job failed");
        self.store.fail(job_id, &reason).await?;
        Ok(JobOutcome::Failed(reason))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;
    use picalc_core::job::{JobRequest, JobState};
    use picalc_db::MemoryJobStore;

    use super::*;

    async fn claimed(store: &MemoryJobStore, digit_count: u32) -> JobRecord {
        store.create(JobRequest { digit_count }).await.unwrap();
        store
            .claim_next("test-worker", Duration::from_secs(600))
            .await
            .unwrap()
            .expect("pending job")
    }

    #[tokio::test]
    async fn successful_job_stores_result() {
        let store = Arc::new(MemoryJobStore::new());
        let job = claimed(&store, 10).await;
        let executor = Executor::new(store.clone(), "test-worker");

        let outcome = executor.execute(job.clone()).await.unwrap();
        assert_eq!(outcome, JobOutcome::Succeeded);

        let stored = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(stored.state(), JobState::Succeeded);
        assert_eq!(stored.snapshot.fraction, 1.0);
        assert_eq!(stored.snapshot.result.as_deref(), Some("3.1415926535"));
    }

    #[tokio::test]
    async fn engine_error_marks_job_failed() {
        let store = Arc::new(MemoryJobStore::new());
        let job = claimed(&store, u32::MAX).await;
        let executor = Executor::new(store.clone(), "test-worker");

        let outcome = executor.execute(job.clone()).await.unwrap();
        assert_matches!(outcome, JobOutcome::Failed(reason) if reason.contains("exceed"));

        let stored = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(stored.state(), JobState::Failed);
        assert!(stored.snapshot.result.is_none());
        assert!(stored.snapshot.error.is_some());
    }

    #[tokio::test]
    async fn unclaimed_job_surfaces_store_conflict() {
        let store = Arc::new(MemoryJobStore::new());
        let job = store.create(JobRequest { digit_count: 3 }).await.unwrap();
        let executor = Executor::new(store.clone(), "test-worker");

        assert_matches!(executor.execute(job.clone()).await, Err(ExecutorError::Store(_)));

        let stored = store.get(job.id).await.unwrap().unwrap();
        assert_eq!(stored.state(), JobState::Pending);
        assert!(stored.snapshot.result.is_none());
    }
}
