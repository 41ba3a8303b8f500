pub mod health;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the public route tree.
///
/// ```text
/// /                    describe
/// /calculate_pi        submit (?n=)
/// /check_progress      poll (?task_id=)
/// ```
///
/// Paths sit at the root, without a version prefix.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::describe::describe))
        .route("/calculate_pi", get(handlers::pi::calculate_pi))
        .route("/check_progress", get(handlers::pi::check_progress))
}
