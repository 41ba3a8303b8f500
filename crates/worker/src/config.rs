use std::time::Duration;

/// Default number of concurrent worker loops.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default interval between claim attempts of an idle worker loop.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

/// Default age after which a silent Running job may be re-claimed.
pub const DEFAULT_STALE_AFTER_SECS: u64 = 600;

/// Worker pool configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of jobs executed in parallel (one per worker loop).
    pub concurrency: usize,
    /// How often an idle loop asks the store for work.
    pub poll_interval: Duration,
    /// Running jobs silent for longer than this are re-claimed.
    pub stale_after: Duration,
    /// Prefix for worker ids; loop `i` reports as `{name}-{i}`.
    pub name: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            stale_after: Duration::from_secs(DEFAULT_STALE_AFTER_SECS),
            name: format!("worker-{}", std::process::id()),
        }
    }
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// `concurrency_var` names the variable holding the loop count, since
    /// the standalone worker and the API's embedded pool use different
    /// ones.
    ///
    /// | Env Var                   | Default          |
    /// |---------------------------|------------------|
    /// | `concurrency_var`         | `4`              |
    /// | `WORKER_POLL_INTERVAL_MS` | `250`            |
    /// | `WORKER_STALE_AFTER_SECS` | `600`            |
    /// | `WORKER_NAME`             | `worker-{pid}`   |
    pub fn from_env(concurrency_var: &str) -> Self {
        let defaults = Self::default();

        let concurrency: usize = std::env::var(concurrency_var)
            .map(|v| {
                v.parse()
                    .unwrap_or_else(|_| panic!("{concurrency_var} must be a valid usize"))
            })
            .unwrap_or(defaults.concurrency);

        let poll_interval_ms: u64 = std::env::var("WORKER_POLL_INTERVAL_MS")
            .unwrap_or_else(|_| DEFAULT_POLL_INTERVAL_MS.to_string())
            .parse()
            .expect("WORKER_POLL_INTERVAL_MS must be a valid u64");

        let stale_after_secs: u64 = std::env::var("WORKER_STALE_AFTER_SECS")
            .unwrap_or_else(|_| DEFAULT_STALE_AFTER_SECS.to_string())
            .parse()
            .expect("WORKER_STALE_AFTER_SECS must be a valid u64");

        let name = std::env::var("WORKER_NAME").unwrap_or(defaults.name);

        Self {
            concurrency,
            poll_interval: Duration::from_millis(poll_interval_ms.max(1)),
            stale_after: Duration::from_secs(stale_after_secs),
            name,
        }
    }
}
