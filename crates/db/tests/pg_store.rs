//! `PgJobStore` against a real database.
//!
//! Ignored by default; run with `DATABASE_URL` set and `--ignored`.

use std::time::Duration;

use assert_matches::assert_matches;
use picalc_core::job::{JobRequest, JobState};
use picalc_core::types::JobId;
use picalc_db::{JobStore, PgJobStore, StoreError};
use sqlx::PgPool;

const STALE: Duration = Duration::from_secs(600);

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_full_lifecycle(pool: PgPool) {
    picalc_db::health_check(&pool).await.unwrap();
    let store = PgJobStore::new(pool);

    let job = store.create(JobRequest { digit_count: 5 }).await.unwrap();
    assert_eq!(job.state(), JobState::Pending);

    let claimed = store.claim_next("w1", STALE).await.unwrap().unwrap();
    assert_eq!(claimed.id, job.id);
    assert_eq!(claimed.state(), JobState::Running);
    assert!(store.claim_next("w2", STALE).await.unwrap().is_none());

    store.publish_progress(job.id, 0.6).await.unwrap();
    store.publish_progress(job.id, 0.2).await.unwrap();
    let running = store.get(job.id).await.unwrap().unwrap();
    assert_eq!(running.snapshot.fraction, 0.6);

    store.complete(job.id, "3.14159").await.unwrap();
    let done = store.get(job.id).await.unwrap().unwrap();
    assert_eq!(done.state(), JobState::Succeeded);
    assert_eq!(done.snapshot.fraction, 1.0);
    assert_eq!(done.snapshot.result.as_deref(), Some("3.14159"));
    assert!(done.finished_at.is_some());

    assert_matches!(
        store.fail(job.id, "late").await,
        Err(StoreError::Transition(_))
    );
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_unknown_handle(pool: PgPool) {
    let store = PgJobStore::new(pool);
    let id = JobId::now_v7();
    assert!(store.get(id).await.unwrap().is_none());
    assert_matches!(
        store.publish_progress(id, 0.5).await,
        Err(StoreError::NotFound(missing)) if missing == id
    );
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_stale_reclaim_and_purge(pool: PgPool) {
    let store = PgJobStore::new(pool);
    let job = store.create(JobRequest { digit_count: 50 }).await.unwrap();
    store.claim_next("w1", STALE).await.unwrap().unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    let reclaimed = store
        .claim_next("w2", Duration::from_millis(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reclaimed.id, job.id);
    assert_eq!(reclaimed.worker_id.as_deref(), Some("w2"));

    store.fail(job.id, "boom").await.unwrap();
    let purged = store
        .purge_finished_before(chrono::Utc::now() + chrono::Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(purged, 1);
    assert!(store.get(job.id).await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_stale_cutoff_uses_database_clock(pool: PgPool) {
    let store = PgJobStore::new(pool.clone());
    let quiet = store.create(JobRequest { digit_count: 5 }).await.unwrap();
    let busy = store.create(JobRequest { digit_count: 5 }).await.unwrap();
    store.claim_next("w1", STALE).await.unwrap().unwrap();
    store.claim_next("w1", STALE).await.unwrap().unwrap();

    // Age one heartbeat on the server side only.
    sqlx::query("UPDATE pi_jobs SET updated_at = NOW() - INTERVAL '1 hour' WHERE id = $1")
        .bind(quiet.id)
        .execute(&pool)
        .await
        .unwrap();

    let reclaimed = store.claim_next("w2", STALE).await.unwrap().unwrap();
    assert_eq!(reclaimed.id, quiet.id);
    assert_eq!(reclaimed.worker_id.as_deref(), Some("w2"));
    assert!(store.claim_next("w2", STALE).await.unwrap().is_none());

    let untouched = store.get(busy.id).await.unwrap().unwrap();
    assert_eq!(untouched.worker_id.as_deref(), Some("w1"));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_progress_before_claim_is_rejected(pool: PgPool) {
    let store = PgJobStore::new(pool);
    let job = store.create(JobRequest { digit_count: 5 }).await.unwrap();

    assert_matches!(
        store.publish_progress(job.id, 0.5).await,
        Err(StoreError::Transition(_))
    );
    let stored = store.get(job.id).await.unwrap().unwrap();
    assert_eq!(stored.state(), JobState::Pending);
    assert!(stored.started_at.is_none());
}
