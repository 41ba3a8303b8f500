use axum::extract::State;
use axum::Json;
use picalc_core::admission::SUBMIT_EXAMPLE;
use serde_json::{json, Value};

use crate::handlers::pi::POLL_EXAMPLE;
use crate::state::AppState;

/// GET / -- self-describing document listing the operations.
pub async fn describe(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "service": "picalc",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Computes decimal digits of pi as asynchronous jobs",
        "endpoints": {
            "/calculate_pi": {
                "method": "GET",
                "description": "Start a computation of pi to n decimal places",
                "parameters": {
                    "n": format!("Number of decimal places (1 to {})", state.config.max_digits),
                },
                "example": SUBMIT_EXAMPLE,
            },
            "/check_progress": {
                "method": "GET",
                "description": "Check the progress of a computation",
                "parameters": {
                    "task_id": "Id returned by /calculate_pi",
                },
                "example": POLL_EXAMPLE,
            },
            "/health": {
                "method": "GET",
                "description": "Service and job store health",
            },
        },
    }))
}
