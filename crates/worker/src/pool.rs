//! Pool of worker loops pulling jobs from the store.
//!
//! Each loop holds at most one job at a time, so a job's working buffer is
//! only ever touched by one execution context. Loops never talk to the API
//! layer; the store is the only thing they share with it.

use std::sync::Arc;

use picalc_db::JobStore;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;
use crate::executor::{Executor, JobOutcome};

/// A fixed-size set of worker loops sharing one job store.
pub struct WorkerPool {
    store: Arc<dyn JobStore>,
    config: WorkerConfig,
}

impl WorkerPool {
    pub fn new(store: Arc<dyn JobStore>, config: WorkerConfig) -> Self {
        Self { store, config }
    }

    /// Spawn `concurrency` worker loops onto the current runtime.
    ///
    /// The loops stop after `cancel` fires, finishing the job in hand
    /// first (there is no way to interrupt a computation).
    pub fn spawn(&self, cancel: CancellationToken) -> JoinSet<()> {
        let mut loops = JoinSet::new();
        for index in 0..self.config.concurrency {
            let executor = Executor::new(
                Arc::clone(&self.store),
                format!("{}-{index}", self.config.name),
            );
            loops.spawn(worker_loop(executor, self.config.clone(), cancel.clone()));
        }

        tracing::info!(
            concurrency = self.config.concurrency,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            stale_after_secs = self.config.stale_after.as_secs(),
            "Worker pool started",
        );
        loops
    }

    /// Run the pool until `cancel` fires and every loop has stopped.
    pub async fn run(self, cancel: CancellationToken) {
        let mut loops = self.spawn(cancel);
        while let Some(joined) = loops.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Worker loop terminated abnormally");
            }
        }
        tracing::info!("Worker pool stopped");
    }
}

/// Claim and execute jobs until cancelled.
///
/// Sleeps for `poll_interval` only when the store has nothing to claim.
async fn worker_loop(executor: Executor, config: WorkerConfig, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::debug!(worker_id = %executor.worker_id(), "Worker loop started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(worker_id = %executor.worker_id(), "Worker loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                drain(&executor, &config, &cancel).await;
            }
        }
    }
}

/// Execute claimable jobs back to back until none is left.
async fn drain(executor: &Executor, config: &WorkerConfig, cancel: &CancellationToken) {
    let store = executor.store();
    while !cancel.is_cancelled() {
        let job = match store.claim_next(executor.worker_id(), config.stale_after).await {
            Ok(Some(job)) => job,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(worker_id = %executor.worker_id(), error = %e, "Claim failed");
                break;
            }
        };

        let job_id = job.id;
        match executor.execute(job).await {
            Ok(JobOutcome::Succeeded) => {}
            Ok(JobOutcome::Failed(reason)) => {
                tracing::debug!(job_id = %job_id, reason = %reason, "Worker moving on after failed job");
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Job outcome could not be recorded");
            }
        }
    }
}
