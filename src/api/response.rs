use std::any::Any;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use super::validation::ValidationError;

/// Everything a check endpoint can answer with instead of results.
#[derive(Debug)]
pub enum ApiError {
    Validation(ValidationError),
    BodyTooLarge,
    BodyRead(String),
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Validation(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(err) => validation_error(&err),
            ApiError::BodyTooLarge => error(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large"),
            ApiError::BodyRead(reason) => {
                log::warn!("Failed to read request body: {reason}");
                error(StatusCode::BAD_REQUEST, "Failed to read request body")
            }
        }
    }
}

pub fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

pub fn validation_error(err: &ValidationError) -> Response {
    let mut body = json!({ "error": err.to_string() });
    if let Some(example) = err.example() {
        body["example"] = example;
    }
    if let Some(detail) = err.detail() {
        body["message"] = json!(detail);
    }
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

pub fn internal_error(message: &str) -> Response {
    let body = json!({ "error": "Internal server error", "message": message });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

pub async fn not_found() -> Response {
    error(StatusCode::NOT_FOUND, "Not found")
}

/// Answers a request whose handler panicked, for `CatchPanicLayer`.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "request handler panicked".to_string()
    };

    log::error!("Request handler panicked: {message}");
    internal_error(&message)
}
