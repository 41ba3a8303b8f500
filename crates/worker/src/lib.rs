//! `picalc-worker` library crate.
//!
//! The task executor: claims jobs from a [`picalc_db::JobStore`], runs the
//! digit engine off the async runtime and writes checkpoints back. Used by
//! the standalone worker binary and by the API server's embedded pool.

pub mod config;
pub mod executor;
pub mod pool;

pub use config::WorkerConfig;
pub use executor::{Executor, ExecutorError, JobOutcome};
pub use pool::WorkerPool;
