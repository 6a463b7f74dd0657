//! Service error responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use gcrcleaner_engine::EngineError;
use gcrcleaner_registry::RegistryError;

/// JSON error payload: `{"error": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable failure description.
    pub error: String,
}

/// Service-level error, split by fault category.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The caller sent something unusable; answered with 400.
    #[error("{message}")]
    BadRequest {
        /// What was wrong with the request.
        message: String,
    },
    /// Anything unexpected; answered with 500.
    #[error("{message}")]
    Internal {
        /// What failed.
        message: String,
    },
}

impl ApiError {
    /// Convenience constructor for request faults.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match &err {
            EngineError::Filter { .. } | EngineError::Request { .. } => Self::BadRequest {
                message: err.to_string(),
            },
            EngineError::Registry { source } if matches!(source, RegistryError::Name { .. }) => {
                Self::BadRequest {
                    message: err.to_string(),
                }
            }
            _ => Self::Internal {
                message: err.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::warn!(status = %status, error = %self, "request failed");
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
