use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

/// Error taxonomy for the RAG pipeline and its HTTP surface.
///
/// The retrieval-specific variants are deliberately distinct so callers
/// can react to them individually: `CollectionNotFound` means "ingest
/// first", `CompletionTransport` is retryable while `CompletionEndpoint`
/// usually is not.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("empty input: {0}")]
    EmptyInput(String),
    #[error("embedder unavailable: {0}")]
    EmbedderUnavailable(String),
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("collection not found: {0}")]
    CollectionNotFound(String),
    #[error("completion endpoint error ({status}): {body}")]
    CompletionEndpoint { status: u16, body: String },
    #[error("completion transport error: {0}")]
    CompletionTransport(String),
    #[error("stream truncated before completion")]
    StreamTruncated,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            ApiError::EmptyInput(_) | ApiError::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            ApiError::CollectionNotFound(_) | ApiError::NotFound(_) => {
                (StatusCode::NOT_FOUND, self.to_string())
            }
            ApiError::EmbedderUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            ApiError::CompletionEndpoint { .. } | ApiError::StreamTruncated => {
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
            ApiError::CompletionTransport(_) => (StatusCode::GATEWAY_TIMEOUT, self.to_string()),
            ApiError::DimensionMismatch { .. } | ApiError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}
