// src/errors.rs
use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TranslateError {
    #[error("Invalid image encoding: {0}")]
    InvalidEncoding(String),

    #[error("{0}")]
    RemoteCall(String),

    #[error("{0}")]
    Credential(String),

    #[error("{0}")]
    Batch(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Batch cancelled")]
    Cancelled,
}

impl TranslateError {
    fn category(&self) -> &'static str {
        match self {
            TranslateError::InvalidEncoding(_) => "Invalid image encoding",
            TranslateError::RemoteCall(_) => "AI service error",
            TranslateError::Credential(_) => "Credential error",
            TranslateError::Batch(_) => "Batch error",
            TranslateError::ImageProcessing(_) => "Image processing error",
            TranslateError::Validation(_) => "Validation error",
            TranslateError::NotFound(_) => "Not found",
            TranslateError::Cancelled => "Cancelled",
        }
    }
}

impl ResponseError for TranslateError {
    fn status_code(&self) -> StatusCode {
        match self {
            TranslateError::InvalidEncoding(_)
            | TranslateError::ImageProcessing(_)
            | TranslateError::Validation(_) => StatusCode::BAD_REQUEST,
            TranslateError::RemoteCall(_) => StatusCode::SERVICE_UNAVAILABLE,
            TranslateError::Credential(_) => StatusCode::UNAUTHORIZED,
            TranslateError::NotFound(_) => StatusCode::NOT_FOUND,
            TranslateError::Cancelled => StatusCode::CONFLICT,
            TranslateError::Batch(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.category(),
            "message": self.to_string()
        }))
    }
}
