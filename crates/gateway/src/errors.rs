use axum::{
    Json,
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Request failures surfaced to clients as `{"detail": "..."}`.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("File must be an image")]
    NotAnImage,

    #[error("Invalid image")]
    InvalidImage,

    #[error("Missing `file` field in multipart form")]
    MissingFile,

    #[error("{0}")]
    BadRequest(String),

    #[error("Upload exceeds the maximum allowed size")]
    PayloadTooLarge,

    #[error("Model not loaded")]
    ModelNotLoaded,

    /// Details are logged server-side, never sent to the client.
    #[error("Inference failed")]
    Inference(String),
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotAnImage
            | ApiError::InvalidImage
            | ApiError::MissingFile
            | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::ModelNotLoaded => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::BadRequest(err.body_text())
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Inference(ref cause) = self {
            tracing::error!(error = %cause, "Inference failed");
        }

        let body = ErrorBody {
            detail: self.to_string(),
        };

        (self.status(), Json(body)).into_response()
    }
}
