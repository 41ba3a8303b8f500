//! Job records and the lifecycle state machine.
//!
//! ```text
//! Pending ──claim──▶ Running ──complete──▶ Succeeded
//!                     │  ▲
//!                     │  └─ progress
//!                     └──────fail──────▶ Failed
//! ```
//!
//! Terminal states have no outgoing edges. Every store implementation goes
//! through [`JobRecord`]'s transition methods (or mirrors them in SQL), so
//! the rules live in one place.

use crate::error::CoreError;
use crate::spigot::CHECKPOINT_CAP;
use crate::types::{JobId, Timestamp};

/// State ID type matching the SMALLINT `state_id` column.
pub type StateId = i16;

/// Lifecycle state of a job.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    Pending = 1,
    Running = 2,
    Succeeded = 3,
    Failed = 4,
}

impl JobState {
    /// Return the database state ID.
    pub fn id(self) -> StateId {
        self as StateId
    }

    pub fn from_id(id: StateId) -> Option<Self> {
        match id {
            1 => Some(Self::Pending),
            2 => Some(Self::Running),
            3 => Some(Self::Succeeded),
            4 => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Whether the lifecycle has an edge from `self` to `next`.
    ///
    /// Checkpoints keep a job Running but are not a state change, so there
    /// is no Running → Running edge.
    pub fn can_transition_to(self, next: JobState) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Succeeded)
                | (Self::Running, Self::Failed)
        )
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of a pi computation. `digit_count` is always positive once
/// a request has passed admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobRequest {
    pub digit_count: u32,
}

/// The externally visible progress of a job.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub state: JobState,
    /// Completed fraction in `0.0..=1.0`; never decreases.
    pub fraction: f64,
    /// Present only when `state` is `Succeeded`.
    pub result: Option<String>,
    /// Present only when `state` is `Failed`.
    pub error: Option<String>,
}

impl ProgressSnapshot {
    pub fn pending() -> Self {
        Self {
            state: JobState::Pending,
            fraction: 0.0,
            result: None,
            error: None,
        }
    }
}

/// A job as held by the job store.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub id: JobId,
    pub request: JobRequest,
    pub snapshot: ProgressSnapshot,
    /// Worker currently (or last) executing the job.
    pub worker_id: Option<String>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub finished_at: Option<Timestamp>,
    /// Last write of any kind; doubles as the executor heartbeat.
    pub updated_at: Timestamp,
}

impl JobRecord {
    /// Create a freshly admitted job: Pending, fraction 0.
    pub fn new(request: JobRequest, now: Timestamp) -> Self {
        Self {
            id: JobId::now_v7(),
            request,
            snapshot: ProgressSnapshot::pending(),
            worker_id: None,
            created_at: now,
            started_at: None,
            finished_at: None,
            updated_at: now,
        }
    }

    pub fn state(&self) -> JobState {
        self.snapshot.state
    }

    /// Pending → Running, assigning the job to `worker_id`.
    pub fn claim(&mut self, worker_id: &str, now: Timestamp) -> Result<(), CoreError> {
        self.transition(JobState::Running)?;
        self.worker_id = Some(worker_id.to_string());
        self.started_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Hand a Running job whose executor went silent to another worker.
    ///
    /// The recorded fraction is kept, so observers never see it drop.
    pub fn reclaim(&mut self, worker_id: &str, now: Timestamp) -> Result<(), CoreError> {
        if self.state() != JobState::Running {
            return Err(self.conflict(JobState::Running));
        }
        self.worker_id = Some(worker_id.to_string());
        self.updated_at = now;
        Ok(())
    }

    /// Record a checkpoint. Lower fractions than the stored one are ignored
    /// and values are capped below 1.0 until the job succeeds. Only a
    /// claimed (Running) job accepts checkpoints.
    pub fn record_progress(&mut self, fraction: f64, now: Timestamp) -> Result<(), CoreError> {
        if self.state() != JobState::Running {
            return Err(self.conflict(JobState::Running));
        }
        let fraction = fraction.clamp(0.0, CHECKPOINT_CAP);
        if fraction > self.snapshot.fraction {
            self.snapshot.fraction = fraction;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Running → Succeeded with the complete digit string.
    pub fn succeed(&mut self, result: String, now: Timestamp) -> Result<(), CoreError> {
        self.transition(JobState::Succeeded)?;
        self.snapshot.fraction = 1.0;
        self.snapshot.result = Some(result);
        self.finished_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Running → Failed. The last recorded fraction is kept.
    pub fn fail(&mut self, error: String, now: Timestamp) -> Result<(), CoreError> {
        self.transition(JobState::Failed)?;
        self.snapshot.error = Some(error);
        self.finished_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    fn transition(&mut self, next: JobState) -> Result<(), CoreError> {
        if !self.state().can_transition_to(next) {
            return Err(self.conflict(next));
        }
        self.snapshot.state = next;
        Ok(())
    }

    fn conflict(&self, next: JobState) -> CoreError {
        CoreError::Conflict(format!(
            "Job {} cannot move from {} to {next}",
            self.id,
            self.state()
        ))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;

    use super::*;

    fn running_job(digits: u32) -> JobRecord {
        let mut job = JobRecord::new(JobRequest { digit_count: digits }, Utc::now());
        job.claim("worker-1", Utc::now()).unwrap();
        job
    }

    #[test]
    fn new_job_is_pending_with_zero_fraction() {
        let job = JobRecord::new(JobRequest { digit_count: 10 }, Utc::now());
        assert_eq!(job.state(), JobState::Pending);
        assert_eq!(job.snapshot.fraction, 0.0);
        assert!(job.snapshot.result.is_none());
        assert!(job.worker_id.is_none());
    }

    #[test]
    fn handles_are_unique() {
        let a = JobRecord::new(JobRequest { digit_count: 1 }, Utc::now());
        let b = JobRecord::new(JobRequest { digit_count: 1 }, Utc::now());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn claim_moves_pending_to_running() {
        let job = running_job(10);
        assert_eq!(job.state(), JobState::Running);
        assert_eq!(job.worker_id.as_deref(), Some("worker-1"));
        assert!(job.started_at.is_some());
    }

    #[test]
    fn claim_twice_is_a_conflict() {
        let mut job = running_job(10);
        let started_at = job.started_at;
        assert_matches!(job.claim("worker-2", Utc::now()), Err(CoreError::Conflict(_)));
        assert_eq!(job.worker_id.as_deref(), Some("worker-1"));
        assert_eq!(job.started_at, started_at);
    }

    #[test]
    fn progress_never_decreases() {
        let mut job = running_job(100);
        job.record_progress(0.4, Utc::now()).unwrap();
        job.record_progress(0.2, Utc::now()).unwrap();
        assert_eq!(job.snapshot.fraction, 0.4);
    }

    #[test]
    fn progress_is_capped_below_one() {
        let mut job = running_job(100);
        job.record_progress(1.0, Utc::now()).unwrap();
        assert_eq!(job.snapshot.fraction, CHECKPOINT_CAP);
        assert!(job.snapshot.result.is_none());
    }

    #[test]
    fn progress_on_pending_job_is_rejected() {
        let mut job = JobRecord::new(JobRequest { digit_count: 10 }, Utc::now());
        assert_matches!(job.record_progress(0.5, Utc::now()), Err(CoreError::Conflict(_)));
        assert_eq!(job.state(), JobState::Pending);
        assert_eq!(job.snapshot.fraction, 0.0);
        assert!(job.worker_id.is_none());
        assert!(job.started_at.is_none());
    }

    #[test]
    fn succeed_sets_result_and_full_fraction() {
        let mut job = running_job(5);
        job.succeed("3.14159".into(), Utc::now()).unwrap();
        assert_eq!(job.state(), JobState::Succeeded);
        assert_eq!(job.snapshot.fraction, 1.0);
        assert_eq!(job.snapshot.result.as_deref(), Some("3.14159"));
        assert!(job.finished_at.is_some());
    }

    #[test]
    fn fail_keeps_last_fraction_and_sets_error() {
        let mut job = running_job(100);
        job.record_progress(0.3, Utc::now()).unwrap();
        job.fail("out of memory".into(), Utc::now()).unwrap();
        assert_eq!(job.state(), JobState::Failed);
        assert_eq!(job.snapshot.fraction, 0.3);
        assert_eq!(job.snapshot.error.as_deref(), Some("out of memory"));
        assert!(job.snapshot.result.is_none());
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        let mut done = running_job(5);
        done.succeed("3.14159".into(), Utc::now()).unwrap();
        assert!(done.fail("late".into(), Utc::now()).is_err());
        assert!(done.record_progress(0.5, Utc::now()).is_err());
        assert!(done.reclaim("worker-2", Utc::now()).is_err());

        let mut failed = running_job(5);
        failed.fail("boom".into(), Utc::now()).unwrap();
        assert!(failed.succeed("3.14159".into(), Utc::now()).is_err());
        assert_eq!(failed.state(), JobState::Failed);
    }

    #[test]
    fn pending_cannot_jump_to_terminal() {
        assert!(!JobState::Pending.can_transition_to(JobState::Succeeded));
        assert!(!JobState::Pending.can_transition_to(JobState::Failed));
        assert!(!JobState::Succeeded.can_transition_to(JobState::Running));
        assert!(!JobState::Running.can_transition_to(JobState::Running));
    }

    #[test]
    fn state_ids_round_trip() {
        for state in [
            JobState::Pending,
            JobState::Running,
            JobState::Succeeded,
            JobState::Failed,
        ] {
            assert_eq!(JobState::from_id(state.id()), Some(state));
        }
        assert_eq!(JobState::from_id(0), None);
    }
}
