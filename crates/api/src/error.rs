use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use picalc_core::admission::{AdmissionError, SUBMIT_EXAMPLE};
use picalc_core::error::CoreError;
use picalc_db::StoreError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and [`StoreError`] for job store
/// failures, and adds HTTP-specific variants. Implements [`IntoResponse`]
/// to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `picalc_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A job store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A rejected request parameter, reported with a usage example.
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        example: &'static str,
    },

    /// A handle that cannot name any job (e.g. not a UUID).
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<AdmissionError> for AppError {
    fn from(err: AdmissionError) -> Self {
        AppError::Validation {
            message: err.to_string(),
            example: SUBMIT_EXAMPLE,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => classify_core_error(core),

            // --- Store errors ---
            AppError::Store(err) => match err {
                StoreError::NotFound(id) => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("Task {id} not found"),
                ),
                StoreError::Transition(core) => classify_core_error(core),
                StoreError::Database(_) | StoreError::Corrupt(_) => internal(err),
            },

            // --- HTTP-specific errors ---
            AppError::Validation { message, .. } => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message.clone())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
        };

        let mut body = json!({
            "error": message,
            "code": code,
        });
        if let AppError::Validation { example, .. } = &self {
            body["example"] = json!(example);
        }

        (status, axum::Json(body)).into_response()
    }
}

fn classify_core_error(core: &CoreError) -> (StatusCode, &'static str, String) {
    match core {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
    }
}

/// Log the real cause and return a sanitized 500.
fn internal(err: &dyn std::fmt::Display) -> (StatusCode, &'static str, String) {
    tracing::error!(error = %err, "Internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

