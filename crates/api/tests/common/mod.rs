#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use picalc_db::{JobStore, MemoryJobStore};
use picalc_worker::{WorkerConfig, WorkerPool};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use picalc_api::config::ServerConfig;
use picalc_api::router::build_app_router;
use picalc_api::state::AppState;

/// Digit ceiling used by the test server.
pub const TEST_MAX_DIGITS: u32 = 5_000;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        max_digits: TEST_MAX_DIGITS,
        database_url: None,
        embedded_workers: fast_workers(2),
        retention: Duration::from_secs(24 * 3600),
        retention_sweep_interval: Duration::from_secs(3600),
    }
}

pub fn fast_workers(concurrency: usize) -> WorkerConfig {
    WorkerConfig {
        concurrency,
        poll_interval: Duration::from_millis(5),
        stale_after: Duration::from_secs(600),
        name: "test".into(),
    }
}

/// A running test server: the router, its store, and the worker pool
/// behind it (if any).
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryJobStore>,
    cancel: CancellationToken,
    workers: Option<JoinSet<()>>,
}

impl TestApp {
    /// Router over an in-memory store with no workers, so submitted jobs
    /// stay Pending.
    pub fn without_workers() -> Self {
        let store = Arc::new(MemoryJobStore::new());
        Self {
            router: router_for(store.clone()),
            store,
            cancel: CancellationToken::new(),
            workers: None,
        }
    }

    /// Router plus an embedded worker pool sharing the same store.
    pub fn with_workers(concurrency: usize) -> Self {
        let mut app = Self::without_workers();
        let store: Arc<dyn JobStore> = app.store.clone();
        let pool = WorkerPool::new(store, fast_workers(concurrency));
        app.workers = Some(pool.spawn(app.cancel.clone()));
        app
    }

    pub async fn get(&self, uri: &str) -> Response {
        get(self.router.clone(), uri).await
    }

    /// Poll `/check_progress` until the job leaves `PROGRESS`, returning
    /// every body observed along the way.
    pub async fn poll_until_done(&self, task_id: &str) -> Vec<serde_json::Value> {
        let uri = format!("/check_progress?task_id={task_id}");
        tokio::time::timeout(Duration::from_secs(60), async {
            let mut seen = Vec::new();
            loop {
                let response = self.get(&uri).await;
                assert_eq!(response.status(), StatusCode::OK);
                let json = body_json(response).await;
                let done = json["state"] != "PROGRESS";
                seen.push(json);
                if done {
                    return seen;
                }
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("job did not finish in time")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn router_for(store: Arc<MemoryJobStore>) -> Router {
    let config = test_config();
    let state = AppState {
        store,
        config: Arc::new(config.clone()),
    };
    build_app_router(state, &config)
}

/// Send a GET request through the full middleware stack.
pub async fn get(app: Router, uri: &str) -> Response {
    app.oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
