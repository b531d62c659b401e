use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::error::NeuralicError;
use crate::memory::MemoryError;

/// Error returned by handlers, rendered as `{"error":{"type","message"}}`
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error_type: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, error_type: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            error_type,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_argument", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(StatusCode::REQUEST_TIMEOUT, "timeout", message)
    }
}

impl From<MemoryError> for ApiError {
    fn from(e: MemoryError) -> Self {
        let message = e.to_string();
        match e {
            MemoryError::InvalidArgument(_) => Self::bad_request(message),
            MemoryError::EmbeddingUnavailable(_) => {
                Self::new(StatusCode::BAD_GATEWAY, "embedding_unavailable", message)
            }
            MemoryError::PersistenceUnavailable(_) => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "persistence_unavailable",
                message,
            ),
        }
    }
}

impl From<NeuralicError> for ApiError {
    fn from(e: NeuralicError) -> Self {
        match e {
            NeuralicError::Memory(e) => e.into(),
            NeuralicError::Chat(e) => {
                Self::new(StatusCode::BAD_GATEWAY, "chat_unavailable", e.to_string())
            }
            other => {
                tracing::error!("Request failed: {other}");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                )
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": {
                "type": self.error_type,
                "message": self.message,
            }
        });
        (self.status, Json(body)).into_response()
    }
}
