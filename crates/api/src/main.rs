use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use picalc_db::{JobStore, MemoryJobStore, PgJobStore};
use picalc_worker::WorkerPool;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use picalc_api::background;
use picalc_api::config::ServerConfig;
use picalc_api::router::build_app_router;
use picalc_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "picalc_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        max_digits = config.max_digits,
        embedded_workers = config.embedded_workers.concurrency,
        "Loaded server configuration",
    );

    // --- Job store ---
    let store: Arc<dyn JobStore> = match &config.database_url {
        Some(database_url) => {
            let pool = picalc_db::create_pool(database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            picalc_db::health_check(&pool)
                .await
                .expect("Database health check failed");

            picalc_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            Arc::new(PgJobStore::new(pool))
        }
        None => {
            if config.embedded_workers.concurrency == 0 {
                // Nothing outside this process can see an in-memory store.
                tracing::error!("EMBEDDED_WORKERS=0 requires DATABASE_URL");
                std::process::exit(1);
            }
            tracing::info!("DATABASE_URL not set, using in-memory job store");
            Arc::new(MemoryJobStore::new())
        }
    };

    // --- Background tasks ---
    let cancel = CancellationToken::new();

    let worker_handle = (config.embedded_workers.concurrency > 0).then(|| {
        let pool = WorkerPool::new(Arc::clone(&store), config.embedded_workers.clone());
        tokio::spawn(pool.run(cancel.clone()))
    });

    let retention_handle = tokio::spawn(background::retention::run(
        Arc::clone(&store),
        config.retention,
        config.retention_sweep_interval,
        cancel.clone(),
    ));

    // --- App state & router ---
    let state = AppState {
        store,
        config: Arc::new(config.clone()),
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    cancel.cancel();

    let _ = tokio::time::timeout(Duration::from_secs(5), retention_handle).await;
    tracing::info!("Retention task stopped");

    // Workers finish the job in hand; an in-memory store loses it anyway,
    // a PostgreSQL one lets another process reclaim it once stale.
    if let Some(handle) = worker_handle {
        if tokio::time::timeout(Duration::from_secs(30), handle).await.is_err() {
            tracing::warn!("Embedded workers still busy, abandoning jobs in hand");
        } else {
            tracing::info!("Embedded workers stopped");
        }
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown"),
        () = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
