//! In-process [`JobStore`] backed by a synchronized `HashMap`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use picalc_core::error::CoreError;
use picalc_core::job::{JobRecord, JobRequest, JobState};
use picalc_core::types::{JobId, Timestamp};
use tokio::sync::RwLock;

use crate::store::{age_cutoff, JobStore, StoreError};

/// Job records held in memory.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared between the API layer and embedded workers. Records are lost on
/// restart.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<Jobs>,
}

#[derive(Default)]
struct Jobs {
    entries: HashMap<JobId, Entry>,
    next_seq: u64,
}

/// A record plus its admission order; timestamps alone can tie.
struct Entry {
    seq: u64,
    record: JobRecord,
}

impl Jobs {
    /// Oldest job matching `predicate`, by admission order.
    fn oldest<P>(&mut self, predicate: P) -> Option<&mut JobRecord>
    where
        P: Fn(&JobRecord) -> bool,
    {
        self.entries
            .values_mut()
            .filter(|entry| predicate(&entry.record))
            .min_by_key(|entry| entry.seq)
            .map(|entry| &mut entry.record)
    }
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held, in any state.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.entries.is_empty()
    }

    /// Apply a lifecycle transition to one record under the write lock.
    async fn update<F>(&self, id: JobId, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut JobRecord) -> Result<(), CoreError>,
    {
        let mut jobs = self.jobs.write().await;
        let entry = jobs.entries.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        apply(&mut entry.record)?;
        Ok(())
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, request: JobRequest) -> Result<JobRecord, StoreError> {
        let record = JobRecord::new(request, Utc::now());
        let mut jobs = self.jobs.write().await;
        let seq = jobs.next_seq;
        jobs.next_seq += 1;
        jobs.entries.insert(
            record.id,
            Entry {
                seq,
                record: record.clone(),
            },
        );
        Ok(record)
    }

    async fn get(&self, id: JobId) -> Result<Option<JobRecord>, StoreError> {
        Ok(self
            .jobs
            .read()
            .await
            .entries
            .get(&id)
            .map(|entry| entry.record.clone()))
    }

    async fn claim_next(
        &self,
        worker_id: &str,
        stale_after: Duration,
    ) -> Result<Option<JobRecord>, StoreError> {
        let now = Utc::now();
        let cutoff = age_cutoff(now, stale_after);
        let mut jobs = self.jobs.write().await;

        if let Some(job) = jobs.oldest(|job| job.state() == JobState::Pending) {
            job.claim(worker_id, now)?;
            return Ok(Some(job.clone()));
        }

        let stale = |job: &JobRecord| job.state() == JobState::Running && job.updated_at < cutoff;
        if let Some(job) = jobs.oldest(stale) {
            tracing::warn!(
                job_id = %job.id,
                previous_worker = ?job.worker_id,
                worker_id,
                "Re-claiming stale running job",
            );
            job.reclaim(worker_id, now)?;
            return Ok(Some(job.clone()));
        }

        Ok(None)
    }

    async fn publish_progress(&self, id: JobId, fraction: f64) -> Result<(), StoreError> {
        self.update(id, |job| job.record_progress(fraction, Utc::now()))
            .await
    }

    async fn complete(&self, id: JobId, result: &str) -> Result<(), StoreError> {
        self.update(id, |job| job.succeed(result.to_string(), Utc::now()))
            .await
    }

    async fn fail(&self, id: JobId, error: &str) -> Result<(), StoreError> {
        self.update(id, |job| job.fail(error.to_string(), Utc::now()))
            .await
    }

    async fn purge_finished_before(&self, cutoff: Timestamp) -> Result<u64, StoreError> {
        let mut jobs = self.jobs.write().await;
        let before = jobs.entries.len();
        jobs.entries
            .retain(|_, entry| !matches!(entry.record.finished_at, Some(at) if at < cutoff));
        Ok((before - jobs.entries.len()) as u64)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
