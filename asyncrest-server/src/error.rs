use axum::http::{header, HeaderValue, StatusCode};
use axum::{response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

use asyncrest_auth::AuthError;
use asyncrest_task_queue::TaskQueueError;

type SerdeJsonError = serde_json::Error;

/// Top-level API error shared by resource dispatch and route handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("method not allowed")]
    MethodNotAllowed { allowed: Vec<String> },
    #[error("authentication error: {0}")]
    Authentication(#[from] AuthError),
    #[error("too many requests")]
    Throttled,
    #[error("task queue error: {0}")]
    TaskQueue(#[from] TaskQueueError),
    #[error("operation {0} is not implemented")]
    NotImplemented(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    SerdeJson(#[from] SerdeJsonError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ApiError::Throttled => StatusCode::TOO_MANY_REQUESTS,
            ApiError::TaskQueue(TaskQueueError::QueueFull | TaskQueueError::Unavailable) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::TaskQueue(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::SerdeJson(_) => StatusCode::BAD_REQUEST,
            ApiError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn not_implemented(operation: impl Into<String>) -> Self {
        Self::NotImplemented(operation.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let allow = match &self {
            ApiError::MethodNotAllowed { allowed } => Some(
                allowed
                    .iter()
                    .map(|m| m.to_ascii_uppercase())
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            _ => None,
        };

        let mut resp = (status, Json(json!({ "error": self.to_string() }))).into_response();
        if let Some(allow) = allow.and_then(|a| HeaderValue::from_str(&a).ok()) {
            resp.headers_mut().insert(header::ALLOW, allow);
        }
        resp
    }
}
