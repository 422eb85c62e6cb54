use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use payments::PaymentError;
use topic_engine::{LogError, TopicError};

/// Request failure as reported to HTTP clients.
///
/// Validation errors are returned as-is; everything else is logged and
/// collapsed into a plain 500.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Topic(#[from] TopicError),

    #[error(transparent)]
    Log(#[from] LogError),

    #[error("payment: {0}")]
    Payment(#[from] PaymentError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Topic(TopicError::PayloadTooLarge { size, .. }) => {
                tracing::debug!(size, "rejected oversized submission");
                (StatusCode::PAYLOAD_TOO_LARGE, "that's a little too big").into_response()
            }
            other => {
                tracing::error!(error = %other, "request failed");
                let status = StatusCode::INTERNAL_SERVER_ERROR;
                (status, status.canonical_reason().unwrap_or_default()).into_response()
            }
        }
    }
}
