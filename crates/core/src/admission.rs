//! Admission rules for new pi computations.
//!
//! A request is either turned into a [`JobRequest`] here or rejected before
//! any job record exists.

use std::num::IntErrorKind;

use crate::error::CoreError;
use crate::job::JobRequest;

/// Default ceiling on `digit_count`. Memory is O(n), time is O(n²).
pub const DEFAULT_MAX_DIGITS: u32 = 100_000;

/// Example submission shown alongside validation errors.
pub const SUBMIT_EXAMPLE: &str = "/calculate_pi?n=123";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    #[error("Missing required parameter 'n'")]
    Missing,

    #[error("Parameter 'n' must be an integer, got '{0}'")]
    NotAnInteger(String),

    #[error("Parameter 'n' must be positive, got {0}")]
    NotPositive(String),

    #[error("Parameter 'n' must not exceed {ceiling}, got {requested}")]
    AboveCeiling { requested: String, ceiling: u32 },
}

impl From<AdmissionError> for CoreError {
    fn from(err: AdmissionError) -> Self {
        CoreError::Validation(err.to_string())
    }
}

/// Parse and validate the raw `n` parameter.
///
/// Rules:
/// - Must be present and non-blank.
/// - Must be a base-10 integer (an optional sign is accepted).
/// - Must be positive.
/// - Must not exceed `ceiling`.
pub fn parse_digit_count(raw: Option<&str>, ceiling: u32) -> Result<JobRequest, AdmissionError> {
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Err(AdmissionError::Missing);
    }

    let value: i64 = match raw.parse() {
        Ok(value) => value,
        Err(err) => {
            return Err(match err.kind() {
                IntErrorKind::PosOverflow => AdmissionError::AboveCeiling {
                    requested: raw.to_string(),
                    ceiling,
                },
                IntErrorKind::NegOverflow => AdmissionError::NotPositive(raw.to_string()),
                _ => AdmissionError::NotAnInteger(raw.to_string()),
            });
        }
    };

    if value <= 0 {
        return Err(AdmissionError::NotPositive(value.to_string()));
    }
    if value > i64::from(ceiling) {
        return Err(AdmissionError::AboveCeiling {
            requested: value.to_string(),
            ceiling,
        });
    }

    Ok(JobRequest {
        digit_count: value as u32,
    })
}
