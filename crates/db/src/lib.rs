//! Job store implementations for the pi digit service.
//!
//! [`JobStore`] is the only channel between the API layer and the task
//! executor. Two implementations are provided:
//!
//! - [`MemoryJobStore`] -- a synchronized in-process map, used by tests and
//!   by single-process deployments with embedded workers.
//! - [`PgJobStore`] -- PostgreSQL via sqlx, shared by separate API and
//!   worker processes.

pub mod memory;
pub mod postgres;
pub mod store;

pub use memory::MemoryJobStore;
pub use postgres::PgJobStore;
pub use store::{age_cutoff, JobStore, StoreError};

use sqlx::postgres::PgPoolOptions;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Verify the database answers a trivial query.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply all pending migrations from `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
