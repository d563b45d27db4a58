//! Error types for the request cache
//!
//! Provides unified error handling using thiserror.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Config Error ==
/// Raised while loading or validating configuration, never at call time
/// (the one exception being a malformed manual invalidation pattern).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A rule or setting names a category absent from the TTL table
    #[error("Unknown category '{category}' referenced by {context}")]
    UnknownCategory { category: String, context: String },

    /// A key pattern failed to compile
    #[error("Invalid key pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A setting is out of range
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// A structured setting could not be parsed
    #[error("Failed to parse {what}: {reason}")]
    Parse { what: String, reason: String },

    /// The config file could not be read
    #[error("Failed to read config file: {0}")]
    Io(String),
}

// == Fetch Error ==
/// Failure reported by the network collaborator for a single attempt.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// Transport could not complete
    #[error("Network failure: {0}")]
    Network(String),

    /// The attempt exceeded its time budget
    #[error("Attempt timed out after {0:?}")]
    Timeout(Duration),

    /// Caller is unauthenticated or unauthorized
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Upstream answered with a non-success status
    #[error("Upstream returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Response body was not valid JSON
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl FetchError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Network(_) | FetchError::Timeout(_) => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::Unauthorized(_) | FetchError::Decode(_) => false,
        }
    }

    /// Whether this failure must invalidate the caller's session.
    pub fn is_authorization(&self) -> bool {
        matches!(
            self,
            FetchError::Unauthorized(_) | FetchError::Status { status: 401 | 403, .. }
        )
    }
}

// == Coordinator Error ==
/// Error surfaced to callers of the request coordinator.
///
/// Cloneable so a single outcome can be delivered to every coalesced caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoordinatorError {
    /// Not retried; the session handler has already been notified
    #[error("Authorization failure: {0}")]
    Authorization(String),

    /// Every attempt failed with a transient error
    #[error("Request failed after {attempts} attempts: {last}")]
    ExhaustedRetries {
        attempts: u32,
        #[source]
        last: FetchError,
    },

    /// Non-retryable upstream failure, passed through unchanged
    #[error(transparent)]
    Fetch(FetchError),

    /// Invalid configuration or pattern
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// Malformed sidecar request body
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The in-flight request vanished without an outcome
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CoordinatorError {
    fn into_response(self) -> Response {
        let status = match &self {
            CoordinatorError::Authorization(_) => StatusCode::UNAUTHORIZED,
            CoordinatorError::ExhaustedRetries { .. } => StatusCode::BAD_GATEWAY,
            CoordinatorError::Fetch(_) => StatusCode::BAD_GATEWAY,
            CoordinatorError::Configuration(_) => StatusCode::BAD_REQUEST,
            CoordinatorError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CoordinatorError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for coordinator operations.
pub type Result<T> = std::result::Result<T, CoordinatorError>;
