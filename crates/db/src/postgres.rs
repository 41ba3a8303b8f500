//! PostgreSQL [`JobStore`] for deployments where the API and the workers
//! run as separate processes.
//!
//! Lifecycle guards are expressed in the `WHERE` clause of each `UPDATE`,
//! so every transition is a single atomic statement. When a guard rejects
//! a write, the row is re-read to report `NotFound` or the same conflict
//! the in-memory store would raise.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use picalc_core::error::CoreError;
use picalc_core::job::{JobRecord, JobRequest, JobState, ProgressSnapshot, StateId};
use picalc_core::spigot::CHECKPOINT_CAP;
use picalc_core::types::{JobId, Timestamp};
use sqlx::{FromRow, PgPool};

use crate::store::{JobStore, StoreError};

/// Column list for `pi_jobs` queries.
const COLUMNS: &str = "\
    id, digit_count, state_id, fraction, result, error_message, worker_id, \
    created_at, started_at, finished_at, updated_at";

/// Terminal states: succeeded, failed.
const TERMINAL_STATES: [StateId; 2] = [JobState::Succeeded as StateId, JobState::Failed as StateId];

/// A row from the `pi_jobs` table.
#[derive(Debug, Clone, FromRow)]
struct JobRow {
    id: JobId,
    digit_count: i32,
    state_id: StateId,
    fraction: f64,
    result: Option<String>,
    error_message: Option<String>,
    worker_id: Option<String>,
    created_at: Timestamp,
    started_at: Option<Timestamp>,
    finished_at: Option<Timestamp>,
    updated_at: Timestamp,
}

impl TryFrom<JobRow> for JobRecord {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let state = JobState::from_id(row.state_id)
            .ok_or_else(|| StoreError::Corrupt(format!("job {} has state_id {}", row.id, row.state_id)))?;
        let digit_count = u32::try_from(row.digit_count)
            .map_err(|_| StoreError::Corrupt(format!("job {} has digit_count {}", row.id, row.digit_count)))?;

        Ok(JobRecord {
            id: row.id,
            request: JobRequest { digit_count },
            snapshot: ProgressSnapshot {
                state,
                fraction: row.fraction,
                result: row.result,
                error: row.error_message,
            },
            worker_id: row.worker_id,
            created_at: row.created_at,
            started_at: row.started_at,
            finished_at: row.finished_at,
            updated_at: row.updated_at,
        })
    }
}

/// Job store backed by the `pi_jobs` table.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn find(&self, id: JobId) -> Result<Option<JobRecord>, StoreError> {
        let query = format!("SELECT {COLUMNS} FROM pi_jobs WHERE id = $1");
        sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(JobRecord::try_from)
            .transpose()
    }

    /// Explain why a guarded `UPDATE` touched no row.
    ///
    /// Replays the transition on the current record so the caller gets the
    /// exact lifecycle conflict. If the replay succeeds the row changed
    /// under us, which is reported as a conflict as well.
    async fn rejected<F>(&self, id: JobId, replay: F) -> StoreError
    where
        F: FnOnce(&mut JobRecord) -> Result<(), CoreError>,
    {
        match self.find(id).await {
            Ok(None) => StoreError::NotFound(id),
            Ok(Some(mut record)) => match replay(&mut record) {
                Err(err) => StoreError::Transition(err),
                Ok(()) => StoreError::Transition(CoreError::Conflict(format!(
                    "Job {id} changed concurrently"
                ))),
            },
            Err(err) => err,
        }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, request: JobRequest) -> Result<JobRecord, StoreError> {
        let record = JobRecord::new(request, Utc::now());
        let query = format!(
            "INSERT INTO pi_jobs (id, digit_count, state_id, fraction, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $5) \
             RETURNING {COLUMNS}"
        );
        let digit_count = i32::try_from(request.digit_count).map_err(|_| {
            CoreError::Validation(format!("{} digits do not fit the store", request.digit_count))
        })?;
        sqlx::query_as::<_, JobRow>(&query)
            .bind(record.id)
            .bind(digit_count)
            .bind(JobState::Pending.id())
            .bind(record.snapshot.fraction)
            .bind(record.created_at)
            .fetch_one(&self.pool)
            .await?
            .try_into()
    }

    async fn get(&self, id: JobId) -> Result<Option<JobRecord>, StoreError> {
        self.find(id).await
    }

    /// Uses `SELECT FOR UPDATE SKIP LOCKED` so concurrent workers never
    /// claim the same row.
    ///
    /// Staleness is measured against the database clock, the same clock
    /// that writes `updated_at`.
    async fn claim_next(
        &self,
        worker_id: &str,
        stale_after: Duration,
    ) -> Result<Option<JobRecord>, StoreError> {
        let query = format!(
            "UPDATE pi_jobs \
             SET worker_id = $1, state_id = $2, \
                 started_at = COALESCE(started_at, NOW()), updated_at = NOW() \
             WHERE id = ( \
                 SELECT id FROM pi_jobs \
                 WHERE state_id = $3 \
                    OR (state_id = $2 AND updated_at < NOW() - make_interval(secs => $4)) \
                 ORDER BY state_id ASC, created_at ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        let claimed = sqlx::query_as::<_, JobRow>(&query)
            .bind(worker_id)
            .bind(JobState::Running.id())
            .bind(JobState::Pending.id())
            .bind(stale_after.as_secs_f64())
            .fetch_optional(&self.pool)
            .await?
            .map(JobRecord::try_from)
            .transpose()?;

        // A fresh claim stamps started_at and updated_at with the same NOW().
        if let Some(job) = &claimed {
            if job.started_at.is_some_and(|at| at < job.updated_at) {
                tracing::warn!(job_id = %job.id, worker_id, "Re-claimed stale running job");
            }
        }
        Ok(claimed)
    }

    async fn publish_progress(&self, id: JobId, fraction: f64) -> Result<(), StoreError> {
        let capped = fraction.clamp(0.0, CHECKPOINT_CAP);
        let result = sqlx::query(
            "UPDATE pi_jobs \
             SET fraction = GREATEST(fraction, $2), updated_at = NOW() \
             WHERE id = $1 AND state_id = $3",
        )
        .bind(id)
        .bind(capped)
        .bind(JobState::Running.id())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self
                .rejected(id, |job| job.record_progress(fraction, Utc::now()))
                .await);
        }
        Ok(())
    }

    async fn complete(&self, id: JobId, result: &str) -> Result<(), StoreError> {
        let outcome = sqlx::query(
            "UPDATE pi_jobs \
             SET state_id = $2, fraction = 1, result = $3, \
                 finished_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND state_id = $4",
        )
        .bind(id)
        .bind(JobState::Succeeded.id())
        .bind(result)
        .bind(JobState::Running.id())
        .execute(&self.pool)
        .await?;

        if outcome.rows_affected() == 0 {
            return Err(self
                .rejected(id, |job| job.succeed(result.to_string(), Utc::now()))
                .await);
        }
        Ok(())
    }

    async fn fail(&self, id: JobId, error: &str) -> Result<(), StoreError> {
        let outcome = sqlx::query(
            "UPDATE pi_jobs \
             SET state_id = $2, error_message = $3, \
                 finished_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND state_id = $4",
        )
        .bind(id)
        .bind(JobState::Failed.id())
        .bind(error)
        .bind(JobState::Running.id())
        .execute(&self.pool)
        .await?;

        if outcome.rows_affected() == 0 {
            return Err(self
                .rejected(id, |job| job.fail(error.to_string(), Utc::now()))
                .await);
        }
        Ok(())
    }

    async fn purge_finished_before(&self, cutoff: Timestamp) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "DELETE FROM pi_jobs \
             WHERE state_id IN ($2, $3) AND finished_at < $1",
        )
        .bind(cutoff)
        .bind(TERMINAL_STATES[0])
        .bind(TERMINAL_STATES[1])
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        crate::health_check(&self.pool).await?;
        Ok(())
    }
}
