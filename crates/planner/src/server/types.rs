use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::PlannerError;

/// JSON error body returned by every endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorType {
    pub error: String,
    pub status: u16,
    pub details: Option<String>,
}

impl From<(StatusCode, &str, Option<String>)> for ApiErrorType {
    fn from((status, error, details): (StatusCode, &str, Option<String>)) -> Self {
        Self {
            error: error.to_string(),
            status: status.as_u16(),
            details,
        }
    }
}

impl From<PlannerError> for ApiErrorType {
    fn from(err: PlannerError) -> Self {
        let (status, message) = match &err {
            PlannerError::Validation { .. } => (StatusCode::BAD_REQUEST, "Invalid request"),
            PlannerError::NotFound { .. } => (StatusCode::NOT_FOUND, "Record not found"),
            PlannerError::Remote { .. } => (StatusCode::BAD_GATEWAY, "Entity store request failed"),
            PlannerError::Consistency(_) => (
                StatusCode::CONFLICT,
                "Schedule assignment left unpaired",
            ),
            PlannerError::DoubleBooked(_) => (StatusCode::CONFLICT, "Double booking rejected"),
            PlannerError::DeadlineExceeded { .. } => {
                (StatusCode::GATEWAY_TIMEOUT, "Deadline exceeded")
            }
        };

        ApiErrorType::from((status, message, Some(err.to_string())))
    }
}

impl IntoResponse for ApiErrorType {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}
