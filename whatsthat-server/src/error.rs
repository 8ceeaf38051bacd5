//! Error types for whatsthat-server
//!
//! Every handler error renders as
//! `{"success": false, "error": "<message>", "code": "<CODE>"}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::services::IntakeError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("{0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("{0}")]
    Internal(String),

    /// whatsthat-common error
    #[error(transparent)]
    Common(#[from] whatsthat_common::Error),
}

impl ApiError {
    pub fn venue_not_found() -> Self {
        ApiError::NotFound("Venue not found".to_string())
    }

    pub fn table_not_found() -> Self {
        ApiError::NotFound("Table not found".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Common(whatsthat_common::Error::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Common(whatsthat_common::Error::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            ApiError::Common(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Internal(_) => "INTERNAL_ERROR",
            ApiError::Common(whatsthat_common::Error::NotFound(_)) => "NOT_FOUND",
            ApiError::Common(whatsthat_common::Error::InvalidInput(_)) => "BAD_REQUEST",
            ApiError::Common(_) => "STORE_ERROR",
        }
    }
}

impl From<IntakeError> for ApiError {
    fn from(err: IntakeError) -> Self {
        match err {
            IntakeError::Store(e) => ApiError::Common(e),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let body = Json(json!({
            "success": false,
            "error": self.to_string(),
            "code": self.code(),
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
