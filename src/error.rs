use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("no drivers available")]
    NoCandidateFound,

    #[error("candidate no longer available")]
    CandidateNoLongerAvailable,

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NoCandidateFound => StatusCode::SERVICE_UNAVAILABLE,
            AppError::CandidateNoLongerAvailable
            | AppError::InvalidTransition(_)
            | AppError::InvalidState(_) => StatusCode::CONFLICT,
            AppError::InvalidConfiguration(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

/// Outcome of a single delivery attempt. Kept apart from [`AppError`] so a
/// failed notification can never surface as a trip-affecting error.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DeliveryError {
    #[error("transient delivery failure: {0}")]
    Transient(String),

    #[error("delivery rejected: {0}")]
    Rejected(String),
}
