use std::time::Duration;

use picalc_core::admission::DEFAULT_MAX_DIGITS;
use picalc_worker::WorkerConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `5000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Largest accepted digit count (default: `100000`).
    pub max_digits: u32,
    /// PostgreSQL job store; `None` selects the in-memory store.
    pub database_url: Option<String>,
    /// Worker pool run inside the server process. A concurrency of 0
    /// disables it (jobs are then left to `picalc-worker` processes).
    pub embedded_workers: WorkerConfig,
    /// Finished jobs older than this are evicted (default: 24 h).
    pub retention: Duration,
    /// Interval between retention sweeps (default: 1 h).
    pub retention_sweep_interval: Duration,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                    |
    /// |----------------------------|----------------------------|
    /// | `HOST`                     | `0.0.0.0`                  |
    /// | `PORT`                     | `5000`                     |
    /// | `CORS_ORIGINS`             | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`     | `30`                       |
    /// | `MAX_DIGITS`               | `100000`                   |
    /// | `DATABASE_URL`             | unset (in-memory store)    |
    /// | `EMBEDDED_WORKERS`         | `4`                        |
    /// | `JOB_RETENTION_HOURS`      | `24`                       |
    /// | `JOB_RETENTION_SWEEP_SECS` | `3600`                     |
    ///
    /// The embedded pool also reads the `WORKER_*` variables documented on
    /// [`WorkerConfig::from_env`].
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "5000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let max_digits: u32 = std::env::var("MAX_DIGITS")
            .unwrap_or_else(|_| DEFAULT_MAX_DIGITS.to_string())
            .parse()
            .expect("MAX_DIGITS must be a valid u32");

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let retention_hours: u64 = std::env::var("JOB_RETENTION_HOURS")
            .unwrap_or_else(|_| "24".into())
            .parse()
            .expect("JOB_RETENTION_HOURS must be a valid u64");

        let retention_sweep_secs: u64 = std::env::var("JOB_RETENTION_SWEEP_SECS")
            .unwrap_or_else(|_| "3600".into())
            .parse()
            .expect("JOB_RETENTION_SWEEP_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            max_digits,
            database_url,
            embedded_workers: WorkerConfig::from_env("EMBEDDED_WORKERS"),
            retention: Duration::from_secs(retention_hours * 3600),
            retention_sweep_interval: Duration::from_secs(retention_sweep_secs.max(1)),
        }
    }
}
