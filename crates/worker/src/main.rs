//! `picalc-worker` -- standalone digit computation worker.
//!
//! Claims jobs admitted by the API server from the shared PostgreSQL store
//! and runs them to completion.
//!
//! # Environment variables
//!
//! | Variable                  | Required | Default        |
//! |---------------------------|----------|----------------|
//! | `DATABASE_URL`            | yes      | --             |
//! | `WORKER_CONCURRENCY`      | no       | `4`            |
//! | `WORKER_POLL_INTERVAL_MS` | no       | `250`          |
//! | `WORKER_STALE_AFTER_SECS` | no       | `600`          |
//! | `WORKER_NAME`             | no       | `worker-{pid}` |

use std::sync::Arc;

use picalc_db::PgJobStore;
use picalc_worker::{WorkerConfig, WorkerPool};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "picalc_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| {
        tracing::error!("DATABASE_URL environment variable is required");
        std::process::exit(1);
    });

    let config = WorkerConfig::from_env("WORKER_CONCURRENCY");
    tracing::info!(name = %config.name, concurrency = config.concurrency, "Starting picalc-worker");

    let pool = picalc_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    picalc_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    let store = Arc::new(PgJobStore::new(pool));
    let cancel = CancellationToken::new();

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
        tracing::info!("Received SIGINT (Ctrl-C), finishing jobs in hand");
        shutdown.cancel();
    });

    WorkerPool::new(store, config).run(cancel).await;
    tracing::info!("Worker shutdown complete");
}
