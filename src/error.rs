use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error as ThisError;
use tracing::error;

use crate::storage::StoreError;

#[derive(Debug, ThisError)]
pub enum SiteError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    BadRequest(String),

    #[error("Invalid request body: {0}")]
    JsonBody(#[from] JsonRejection),

    #[error("Invalid upload: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid password")]
    InvalidPassword,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Too many login attempts, please try again later")]
    TooManyRequests,
}

impl SiteError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            SiteError::BadRequest(_) | SiteError::JsonBody(_) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST")
            }
            SiteError::Multipart(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE")
            }
            SiteError::Multipart(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            SiteError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            SiteError::InvalidPassword => (StatusCode::UNAUTHORIZED, "INVALID_PASSWORD"),
            SiteError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            SiteError::TooManyRequests => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMIT"),
            SiteError::Store(e) => match e {
                StoreError::InvalidArgument(_) => (StatusCode::BAD_REQUEST, "INVALID_ARGUMENT"),
                StoreError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                StoreError::StorageUnavailable(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_UNAVAILABLE")
                }
                StoreError::UploadUnavailable(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "UPLOAD_UNAVAILABLE")
                }
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            },
        }
    }
}

impl IntoResponse for SiteError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = self.status_and_code();
        let message = if status.is_server_error() {
            error!(error = %self, code, "request failed");
            match &self {
                SiteError::Store(
                    StoreError::StorageUnavailable(_) | StoreError::UploadUnavailable(_),
                ) => self.to_string(),
                _ => "An internal server error occurred.".to_string(),
            }
        } else {
            self.to_string()
        };

        (
            status,
            Json(ApiErrorResponse {
                success: false,
                error: message,
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

/// Standardized API error response body
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
}
