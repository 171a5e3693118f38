//! Error types for the diagnostic service

use axum::{
    extract::rejection::{BytesRejection, JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::classifier::ClassifierError;

/// Message returned while the image model is still loading.
pub const NOT_READY_MESSAGE: &str = "Model not loaded yet";

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Image classifier has not finished loading.
    #[error("{}", NOT_READY_MESSAGE)]
    NotReady,

    /// The uploaded image could not be decoded.
    #[error("could not decode image: {0}")]
    DecodeFailure(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// Request body exceeds the configured limit.
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            AppError::DecodeFailure(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Classifier(_) | AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to a client. Server-side failures stay in the logs.
    fn public_message(&self) -> String {
        match self {
            AppError::Classifier(_) | AppError::Config(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

/// JSON error body: `{"error": "..."}`
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            error!("Request failed: {}", self);
        }
        let body = ErrorBody {
            error: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}

/// Body extraction failures keep axum's wording but use the JSON error body
fn from_rejection(status: StatusCode, text: String) -> AppError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(text)
    } else {
        AppError::BadRequest(text)
    }
}

impl From<JsonRejection> for AppError {
    fn from(err: JsonRejection) -> Self {
        from_rejection(err.status(), err.body_text())
    }
}

impl From<BytesRejection> for AppError {
    fn from(err: BytesRejection) -> Self {
        from_rejection(err.status(), err.body_text())
    }
}

/// Result type alias used across the crate
pub type Result<T> = std::result::Result<T, AppError>;
