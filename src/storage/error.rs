use reqwest::StatusCode;
use thiserror::Error;

/// Errors produced by storage backends and the storage facade.
///
/// Only `InvalidArgument`, `StorageUnavailable`, `UploadUnavailable` and
/// `Hashing` ever leave the facade; the rest are backend attempt failures
/// that trigger fall-through to the next backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("upload unavailable: {0}")]
    UploadUnavailable(String),

    #[error("{backend} backend error: {message}")]
    Backend {
        backend: &'static str,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("password hashing failed: {0}")]
    Hashing(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub fn backend(backend: &'static str, message: impl Into<String>) -> Self {
        Self::Backend {
            backend,
            message: message.into(),
        }
    }

    /// Transport failures and upstream 5xx/429 are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| {
                        s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS
                    })
            }
            _ => false,
        }
    }
}
