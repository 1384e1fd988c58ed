//! Error types for the Textlift server

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::job::{JobError, INVALID_IMAGE_URL_MESSAGE};
use crate::ocr::OcrError;
use crate::session::SessionError;
use crate::source::SourceError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Job(#[from] JobError),

    #[error("{}", INVALID_IMAGE_URL_MESSAGE)]
    ImageLoad,

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound(id) => AppError::NotFound(format!("Session not found: {}", id)),
            SessionError::TooMany(_) => AppError::Unavailable(e.to_string()),
        }
    }
}

impl From<SourceError> for AppError {
    fn from(e: SourceError) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

impl From<OcrError> for AppError {
    fn from(e: OcrError) -> Self {
        match e {
            OcrError::UnsupportedLanguage(_) => AppError::BadRequest(e.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(e: MultipartError) -> Self {
        AppError::BadRequest(format!("Invalid multipart body: {}", e))
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::Job(JobError::NoImage) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "no_image",
                JobError::NoImage.to_string(),
            ),
            AppError::Job(JobError::Busy) => {
                (StatusCode::CONFLICT, "busy", JobError::Busy.to_string())
            }
            AppError::ImageLoad => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "invalid_image",
                INVALID_IMAGE_URL_MESSAGE.to_string(),
            ),
            AppError::Unavailable(msg) => {
                tracing::warn!("Service unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, "unavailable", msg.clone())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
            details: if cfg!(debug_assertions) {
                Some(self.to_string())
            } else {
                None
            },
        });

        (status, body).into_response()
    }
}
