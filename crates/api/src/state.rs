use std::sync::Arc;

use picalc_db::JobStore;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// The job store; the only link between handlers and workers.
    pub store: Arc<dyn JobStore>,
    /// Server configuration (admission ceiling, timeouts).
    pub config: Arc<ServerConfig>,
}
