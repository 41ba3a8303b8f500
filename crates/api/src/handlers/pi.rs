//! Handlers for submitting pi computations and polling their progress.
//!
//! Submission only admits a job into the store; the worker pool picks it up
//! from there. Polling is a single store read.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use picalc_core::admission;
use picalc_core::error::CoreError;
use picalc_core::job::{JobState, ProgressSnapshot};
use picalc_core::types::JobId;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Example poll shown alongside a missing `task_id`.
pub const POLL_EXAMPLE: &str = "/check_progress?task_id=YOUR_TASK_ID";

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// Query string of `GET /calculate_pi`. Kept as raw text so admission can
/// report exactly what was wrong with it.
#[derive(Debug, Deserialize)]
pub struct SubmitParams {
    pub n: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub task_id: JobId,
    pub status: &'static str,
    pub message: String,
}

/// GET /calculate_pi?n=<digits>
///
/// Admit a new computation. Returns 202 as soon as the job is stored,
/// before any digit is computed.
pub async fn calculate_pi(
    State(state): State<AppState>,
    Query(params): Query<SubmitParams>,
) -> AppResult<impl IntoResponse> {
    let request = admission::parse_digit_count(params.n.as_deref(), state.config.max_digits)?;
    let job = state.store.create(request).await?;

    tracing::info!(job_id = %job.id, digit_count = request.digit_count, "Job submitted");

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            task_id: job.id,
            status: "Task started",
            message: format!("Calculating Pi to {} decimal places", request.digit_count),
        }),
    ))
}

// ---------------------------------------------------------------------------
// Poll
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct PollParams {
    pub task_id: Option<String>,
}

/// Wire form of a [`ProgressSnapshot`].
#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    /// `PROGRESS`, `FINISHED` or `FAILED`.
    pub state: &'static str,
    /// Completed fraction, rounded to two decimals.
    pub progress: f64,
    pub result: Option<String>,
    pub error: Option<String>,
}

impl From<ProgressSnapshot> for ProgressResponse {
    fn from(snapshot: ProgressSnapshot) -> Self {
        match snapshot.state {
            JobState::Succeeded => Self {
                state: "FINISHED",
                progress: 1.0,
                result: snapshot.result,
                error: None,
            },
            JobState::Failed => Self {
                state: "FAILED",
                progress: round2(snapshot.fraction),
                result: None,
                error: snapshot.error,
            },
            JobState::Pending | JobState::Running => Self {
                state: "PROGRESS",
                progress: round2(snapshot.fraction),
                result: None,
                error: None,
            },
        }
    }
}

fn round2(fraction: f64) -> f64 {
    (fraction * 100.0).round() / 100.0
}

/// GET /check_progress?task_id=<uuid>
///
/// A handle that is not a UUID cannot name a job, so it is reported the
/// same way as an unknown one.
pub async fn check_progress(
    State(state): State<AppState>,
    Query(params): Query<PollParams>,
) -> AppResult<Json<ProgressResponse>> {
    let raw = params
        .task_id
        .as_deref()
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .ok_or_else(|| AppError::Validation {
            message: "Missing required parameter 'task_id'".to_string(),
            example: POLL_EXAMPLE,
        })?;

    let id: JobId = raw
        .parse()
        .map_err(|_| AppError::NotFound(format!("Task '{raw}' not found")))?;

    let job = state
        .store
        .get(id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Task", id }))?;

    Ok(Json(job.snapshot.into()))
}
